use tracing::{info, instrument, warn};

use crate::{
    auth::password::derive_credential,
    error::{AppError, AppResult},
    state::AppState,
    users::{
        dto::{CreateUser, ListUsersRequest, UpdateUser},
        query::compose,
        repo_types::{NewUser, PublicUser, StoreError, User, UserPatch},
    },
};

/// Convert a failed write into the caller-facing error. Shared by create and
/// update so both classify unique violations the same way.
pub(crate) fn write_failure(op: &'static str, e: StoreError) -> AppError {
    let err = AppError::from(e);
    match &err {
        AppError::Internal(cause) => tracing::error!(op, error = %cause, "user write failed"),
        other => warn!(op, error = %other, "user write rejected"),
    }
    err
}

#[instrument(skip(state, input), fields(email = ?input.email, phone = ?input.phone))]
pub async fn create(state: &AppState, input: CreateUser) -> AppResult<PublicUser> {
    let CreateUser {
        email,
        phone,
        password,
        name,
        birth_date,
        height,
        weight,
    } = input;

    let credential = derive_credential(password).await.map_err(AppError::internal)?;

    let user = state
        .store
        .insert(NewUser {
            email,
            phone,
            name,
            credential,
            birth_date,
            height,
            weight,
        })
        .await
        .map_err(|e| write_failure("create", e))?;

    info!(user_id = user.id, "user created");
    Ok(user.into())
}

#[instrument(skip(state, req))]
pub async fn find_all(state: &AppState, req: &ListUsersRequest) -> AppResult<Vec<PublicUser>> {
    let query = compose(req, &state.config.listing);
    let users = state.store.find_many(&query).await?;
    info!(
        count = users.len(),
        limit = query.limit,
        offset = query.offset,
        "users listed"
    );
    Ok(users)
}

/// Primary-key lookup. The returned record still holds the password hash and
/// salt; only its JSON form omits them.
#[instrument(skip(state))]
pub async fn find_one(state: &AppState, id: i32) -> AppResult<User> {
    state
        .store
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound(id))
}

/// Public projection of a single user, for the token holder's own profile.
#[instrument(skip(state))]
pub async fn find_public(state: &AppState, id: i32) -> AppResult<PublicUser> {
    state
        .store
        .find_public_by_id(id)
        .await?
        .ok_or(AppError::NotFound(id))
}

#[instrument(skip(state, input))]
pub async fn update(state: &AppState, id: i32, input: UpdateUser) -> AppResult<PublicUser> {
    let existing = state.store.find_by_id(id).await?;
    if existing.is_none() {
        warn!(user_id = id, "update of unknown user");
        return Err(AppError::NotFound(id));
    }

    let UpdateUser {
        password,
        email,
        phone,
        name,
        birth_date,
        height,
        weight,
    } = input;

    let credential = match password {
        Some(pw) => Some(derive_credential(pw).await.map_err(AppError::internal)?),
        None => None,
    };
    let rotated = credential.is_some();

    let patch = UserPatch {
        email,
        phone,
        name,
        credential,
        birth_date,
        height,
        weight,
    };

    let changed = state
        .store
        .update(id, &patch)
        .await
        .map_err(|e| write_failure("update", e))?;
    if changed == 0 {
        return Err(AppError::NotFound(id));
    }

    let user = state
        .store
        .find_public_by_id(id)
        .await?
        .ok_or(AppError::NotFound(id))?;

    info!(user_id = id, password_rotated = rotated, "user updated");
    Ok(user)
}

#[instrument(skip(state))]
pub async fn remove(state: &AppState, id: i32) -> AppResult<u64> {
    let deleted = state.store.delete(id).await?;
    info!(user_id = id, deleted, "user delete");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_input(v: serde_json::Value) -> CreateUser {
        serde_json::from_value(v).unwrap()
    }

    async fn register(state: &AppState, v: serde_json::Value) -> AppResult<PublicUser> {
        create(state, create_input(v)).await
    }

    #[tokio::test]
    async fn create_returns_public_projection() {
        let state = AppState::fake();
        let user = create(
            &state,
            create_input(json!({"email": "a@x.com", "password": "123456", "name": "Alex"})),
        )
        .await
        .unwrap();
        assert_eq!(user.email.as_deref(), Some("a@x.com"));
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("salt").is_none());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_and_keeps_first_user() {
        let state = AppState::fake();
        let first = create(
            &state,
            create_input(json!({"email": "a@x.com", "password": "123456", "name": "First"})),
        )
        .await
        .unwrap();

        let err = create(
            &state,
            create_input(json!({"email": "a@x.com", "password": "654321", "name": "Second"})),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::EmailConflict));

        let stored = find_one(&state, first.id).await.unwrap();
        assert_eq!(stored.name.as_deref(), Some("First"));
    }

    #[tokio::test]
    async fn duplicate_phone_conflicts() {
        let state = AppState::fake();
        register(&state, json!({"phone": "+79048321919", "password": "123456"}))
            .await
            .unwrap();
        let err = register(&state, json!({"phone": "+79048321919", "password": "123456"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PhoneConflict));
    }

    #[tokio::test]
    async fn both_fields_taken_reports_email() {
        let state = AppState::fake();
        create(
            &state,
            create_input(json!({
                "email": "a@x.com",
                "phone": "+79048321919",
                "password": "123456"
            })),
        )
        .await
        .unwrap();
        let err = create(
            &state,
            create_input(json!({
                "email": "a@x.com",
                "phone": "+79048321919",
                "password": "123456"
            })),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::EmailConflict));
    }

    #[tokio::test]
    async fn password_update_rotates_credential_only() {
        let state = AppState::fake();
        let created = create(
            &state,
            create_input(json!({
                "email": "a@x.com",
                "password": "123456",
                "name": "Alex",
                "height": 180
            })),
        )
        .await
        .unwrap();
        let before = find_one(&state, created.id).await.unwrap();

        let update_input: UpdateUser =
            serde_json::from_value(json!({"password": "newpw1"})).unwrap();
        let updated = update(&state, created.id, update_input).await.unwrap();

        let after = find_one(&state, created.id).await.unwrap();
        assert_ne!(before.password, after.password);
        assert_ne!(before.salt, after.salt);
        assert_eq!(updated.name.as_deref(), Some("Alex"));
        assert_eq!(updated.height, Some(180));
        assert_eq!(updated.email.as_deref(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn update_without_password_keeps_credential() {
        let state = AppState::fake();
        let created = register(&state, json!({"email": "a@x.com", "password": "123456"}))
            .await
            .unwrap();
        let before = find_one(&state, created.id).await.unwrap();

        let input: UpdateUser = serde_json::from_value(json!({"weight": 70})).unwrap();
        let updated = update(&state, created.id, input).await.unwrap();
        assert_eq!(updated.weight, Some(70));

        let after = find_one(&state, created.id).await.unwrap();
        assert_eq!(before.password, after.password);
        assert_eq!(before.salt, after.salt);
    }

    #[tokio::test]
    async fn update_into_taken_email_conflicts() {
        let state = AppState::fake();
        register(&state, json!({"email": "a@x.com", "password": "123456"}))
            .await
            .unwrap();
        let second = register(&state, json!({"email": "b@x.com", "password": "123456"}))
            .await
            .unwrap();
        let input: UpdateUser = serde_json::from_value(json!({"email": "a@x.com"})).unwrap();
        let err = update(&state, second.id, input).await.unwrap_err();
        assert!(matches!(err, AppError::EmailConflict));
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let state = AppState::fake();
        let err = update(&state, 404, UpdateUser::default()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(404)));
    }

    #[tokio::test]
    async fn find_one_missing_is_not_found() {
        let state = AppState::fake();
        assert!(matches!(find_one(&state, 1).await, Err(AppError::NotFound(1))));
    }

    #[tokio::test]
    async fn find_public_omits_secrets() {
        let state = AppState::fake();
        let created = register(&state, json!({"email": "a@x.com", "password": "123456"}))
            .await
            .unwrap();
        let found = find_public(&state, created.id).await.unwrap();
        let json = serde_json::to_value(&found).unwrap();
        assert_eq!(json["email"], "a@x.com");
        assert!(json.get("password").is_none());
        assert!(matches!(find_public(&state, 999).await, Err(AppError::NotFound(999))));
    }

    #[tokio::test]
    async fn remove_counts_and_tolerates_missing() {
        let state = AppState::fake();
        let created = register(&state, json!({"email": "a@x.com", "password": "123456"}))
            .await
            .unwrap();
        assert_eq!(remove(&state, created.id).await.unwrap(), 1);
        assert_eq!(remove(&state, created.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mixed_case_email_is_found_by_search() {
        let state = AppState::fake();
        let mut input = create_input(json!({"email": "Alex@Mail.com", "password": "123456"}));
        input.validate().unwrap();
        let created = create(&state, input).await.unwrap();

        for needle in ["Mail", "Alex@Mail.com"] {
            let mut req: ListUsersRequest =
                serde_json::from_value(json!({ "email": needle })).unwrap();
            req.validate().unwrap();
            let users = find_all(&state, &req).await.unwrap();
            assert_eq!(users.len(), 1, "search for {needle}");
            assert_eq!(users[0].id, created.id);
        }
    }

    #[tokio::test]
    async fn find_all_filters_through_the_store() {
        let state = AppState::fake();
        for (email, height) in [("a@x.com", 150), ("b@x.com", 170), ("c@y.com", 190)] {
            create(
                &state,
                create_input(json!({"email": email, "password": "123456", "height": height})),
            )
            .await
            .unwrap();
        }
        let req: ListUsersRequest = serde_json::from_value(json!({
            "email": "@x.com",
            "height": {"gte": 160},
        }))
        .unwrap();
        let users = find_all(&state, &req).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email.as_deref(), Some("b@x.com"));
    }
}
