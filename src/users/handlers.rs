use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::AppResult,
    state::AppState,
    users::{
        dto::{CreateUser, DeleteResponse, ListUsersRequest, UpdateUser},
        repo_types::{PublicUser, User},
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/search", post(list_users))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(mut payload): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<PublicUser>)> {
    payload.validate()?;
    let user = services::create(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn list_users(
    State(state): State<AppState>,
    Json(mut payload): Json<ListUsersRequest>,
) -> AppResult<Json<Vec<PublicUser>>> {
    payload.validate()?;
    let users = services::find_all(&state, &payload).await?;
    Ok(Json(users))
}

/// Full record; `password` and `salt` are dropped when serialized.
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    let user = services::find_one(&state, id).await?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(mut payload): Json<UpdateUser>,
) -> AppResult<Json<PublicUser>> {
    payload.validate()?;
    let user = services::update(&state, id, payload).await?;
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<DeleteResponse>> {
    let deleted = services::remove(&state, id).await?;
    Ok(Json(DeleteResponse { deleted }))
}
