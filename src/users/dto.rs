use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::error::AppError;
use crate::users::filter::{present, FilterValue, RangeBounds};
use crate::users::query::Sort;

const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_phone(phone: &str) -> bool {
    lazy_static! {
        static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9]{7,15}$").unwrap();
    }
    PHONE_RE.is_match(phone)
}

fn invalid(msg: &str) -> AppError {
    AppError::Validation(msg.to_string())
}

pub(crate) fn check_password_len(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid("password must be at least 6 characters"));
    }
    Ok(())
}

fn check_contact(email: Option<&str>, phone: Option<&str>) -> Result<(), AppError> {
    if let Some(email) = email {
        if !is_valid_email(email) {
            return Err(invalid("invalid email"));
        }
    }
    if let Some(phone) = phone {
        if !is_valid_phone(phone) {
            return Err(invalid("invalid phone"));
        }
    }
    Ok(())
}

fn normalize_email(email: String) -> String {
    email.trim().to_lowercase()
}

/// Stored emails are lowercase, so an email filter is lowered to match.
fn normalize_email_filter(value: FilterValue<String>) -> FilterValue<String> {
    match value {
        FilterValue::Scalar(v) => FilterValue::Scalar(v.map(normalize_email)),
        FilterValue::List(items) => {
            FilterValue::List(items.into_iter().map(|i| i.map(normalize_email)).collect())
        }
        FilterValue::Range(RangeBounds { gte, lte }) => FilterValue::Range(RangeBounds {
            gte: gte.map(normalize_email),
            lte: lte.map(normalize_email),
        }),
    }
}

fn check_positive(field: &str, value: Option<i32>) -> Result<(), AppError> {
    match value {
        Some(v) if v <= 0 => Err(AppError::Validation(format!("{field} must be positive"))),
        _ => Ok(()),
    }
}

/// Request body for registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: String,
    pub name: Option<String>,
    pub birth_date: Option<Date>,
    pub height: Option<i32>,
    pub weight: Option<i32>,
}

impl CreateUser {
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.email = self.email.take().map(normalize_email);
        self.phone = self.phone.take().map(|p| p.trim().to_string());
        if self.email.is_none() && self.phone.is_none() {
            return Err(invalid("email or phone is required"));
        }
        check_contact(self.email.as_deref(), self.phone.as_deref())?;
        check_password_len(&self.password)?;
        check_positive("height", self.height)?;
        check_positive("weight", self.weight)
    }
}

/// Request body for a partial profile update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub password: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub birth_date: Option<Date>,
    pub height: Option<i32>,
    pub weight: Option<i32>,
}

impl UpdateUser {
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.email = self.email.take().map(normalize_email);
        self.phone = self.phone.take().map(|p| p.trim().to_string());
        check_contact(self.email.as_deref(), self.phone.as_deref())?;
        if let Some(pw) = &self.password {
            check_password_len(pw)?;
        }
        check_positive("height", self.height)?;
        check_positive("weight", self.weight)
    }
}

/// Body of `POST /users/search`.
///
/// `name`, `email` and `phone` are substring searches when given a non-empty
/// string. Every filter field also accepts a list (`[a, b, null]`), and
/// `birthDate`, `height`, `weight` accept `{"gte": .., "lte": ..}` ranges.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersRequest {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort: Option<Sort>,
    #[serde(default, deserialize_with = "present")]
    pub name: Option<FilterValue<String>>,
    #[serde(default, deserialize_with = "present")]
    pub email: Option<FilterValue<String>>,
    #[serde(default, deserialize_with = "present")]
    pub phone: Option<FilterValue<String>>,
    #[serde(default, deserialize_with = "present")]
    pub birth_date: Option<FilterValue<Date>>,
    #[serde(default, deserialize_with = "present")]
    pub height: Option<FilterValue<i32>>,
    #[serde(default, deserialize_with = "present")]
    pub weight: Option<FilterValue<i32>>,
}

impl ListUsersRequest {
    pub fn validate(&mut self) -> Result<(), AppError> {
        self.email = self.email.take().map(normalize_email_filter);
        if matches!(self.page, Some(p) if p < 1) {
            return Err(invalid("page must be positive"));
        }
        if matches!(self.page_size, Some(s) if s < 1) {
            return Err(invalid("pageSize must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: u64,
}
