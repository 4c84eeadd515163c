use axum::extract::FromRef;
use tracing::{info, instrument, warn};

use crate::{
    auth::{dto::AuthResponse, jwt::JwtKeys, password::check_password},
    error::{AppError, AppResult},
    state::AppState,
    users::repo_types::LoginLookup,
};

/// Look the account up by email and/or phone, check the password and issue a
/// signed token. An unknown identity and a wrong password both yield
/// `AuthenticationDenied`.
#[instrument(skip(state, lookup, password), fields(email = ?lookup.email, phone = ?lookup.phone))]
pub async fn authenticate(
    state: &AppState,
    lookup: LoginLookup,
    password: String,
) -> AppResult<AuthResponse> {
    let Some(user) = state.store.find_by_login(&lookup).await? else {
        warn!("login for unknown identity");
        return Err(AppError::AuthenticationDenied);
    };

    let ok = check_password(password, user.credential())
        .await
        .map_err(AppError::internal)?;
    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::AuthenticationDenied);
    }

    let token = JwtKeys::from_ref(state)
        .sign(user.id)
        .map_err(AppError::internal)?;

    info!(user_id = user.id, "user logged in");
    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}
