use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::conflict::{classify_conflict, ConflictKind};
use crate::users::repo_types::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Email already in use")]
    EmailConflict,

    #[error("Phone already in use")]
    PhoneConflict,

    #[error("Already in use")]
    GenericConflict,

    #[error("User {0} not found")]
    NotFound(i32),

    #[error("Forbidden")]
    AuthenticationDenied,

    #[error("Something is wrong")]
    Internal(#[source] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn internal<E>(e: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        AppError::Internal(e.into())
    }
}

impl From<ConflictKind> for AppError {
    fn from(kind: ConflictKind) -> Self {
        match kind {
            ConflictKind::EmailConflict => AppError::EmailConflict,
            ConflictKind::PhoneConflict => AppError::PhoneConflict,
            ConflictKind::GenericConflict => AppError::GenericConflict,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation(fields) => classify_conflict(fields.as_slice()).into(),
            StoreError::Database(e) => AppError::Internal(e.into()),
            StoreError::Other(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::EmailConflict | AppError::PhoneConflict | AppError::GenericConflict => {
                (StatusCode::BAD_REQUEST, "conflict")
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::AuthenticationDenied => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "type": error_type,
                    "message": self.to_string()
                }
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn conflict_carries_field_message() {
        let resp = AppError::EmailConflict.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["message"], "Email already in use");
        assert_eq!(body["error"]["type"], "conflict");
    }

    #[tokio::test]
    async fn internal_error_hides_cause() {
        let resp =
            AppError::internal(anyhow::anyhow!("connection refused on 10.0.0.3")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["message"], "Something is wrong");
        assert!(!body.to_string().contains("10.0.0.3"));
    }

    #[test]
    fn unique_violation_on_both_fields_is_email_conflict() {
        let err: AppError =
            StoreError::UniqueViolation(vec!["phone".into(), "email".into()]).into();
        assert!(matches!(err, AppError::EmailConflict));
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            AppError::NotFound(3).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::AuthenticationDenied.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Validation("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
