use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::users::dto::{is_valid_email, is_valid_phone};
use crate::users::repo_types::{LoginLookup, PublicUser};

/// Request body for login: email or phone, plus password.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.email = self.email.take().map(|e| e.trim().to_lowercase());
        self.phone = self.phone.take().map(|p| p.trim().to_string());
        match (&self.email, &self.phone) {
            (None, None) => return Err(AppError::Validation("email or phone is required".into())),
            (Some(e), _) if !is_valid_email(e) => {
                return Err(AppError::Validation("invalid email".into()))
            }
            (_, Some(p)) if !is_valid_phone(p) => {
                return Err(AppError::Validation("invalid phone".into()))
            }
            _ => {}
        }
        if self.password.is_empty() {
            return Err(AppError::Validation("password is required".into()));
        }
        Ok(())
    }

    pub fn lookup(&self) -> LoginLookup {
        LoginLookup {
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }
}

/// Response returned after a successful login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
}
