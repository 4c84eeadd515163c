use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::{Date, OffsetDateTime};

use crate::auth::password::Credential;
use crate::users::filter::FieldValue;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
    #[serde(skip_serializing)]
    pub password: String, // argon2 PHC string, not exposed in JSON
    #[serde(skip_serializing)]
    pub salt: String,
    pub birth_date: Option<Date>,
    pub height: Option<i32>,
    pub weight: Option<i32>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Attributes safe to hand back to a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i32,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<Date>,
    pub weight: Option<i32>,
    pub height: Option<i32>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Column list of the public projection, in `PublicUser` field order.
pub const PUBLIC_COLUMNS: &str =
    "id, name, phone, email, birth_date, weight, height, created_at, updated_at";

pub const ALL_COLUMNS: &str =
    "id, email, phone, name, password, salt, birth_date, height, weight, created_at, updated_at";

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            phone: u.phone,
            email: u.email,
            birth_date: u.birth_date,
            weight: u.weight,
            height: u.height,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

impl User {
    pub fn credential(&self) -> Credential {
        Credential {
            hash: self.password.clone(),
            salt: self.salt.clone(),
        }
    }

    pub fn value_of(&self, column: Column) -> Option<FieldValue> {
        match column {
            Column::Id => Some(FieldValue::Int(self.id)),
            Column::Email => self.email.clone().map(FieldValue::Text),
            Column::Phone => self.phone.clone().map(FieldValue::Text),
            Column::Name => self.name.clone().map(FieldValue::Text),
            Column::BirthDate => self.birth_date.map(FieldValue::Date),
            Column::Height => self.height.map(FieldValue::Int),
            Column::Weight => self.weight.map(FieldValue::Int),
        }
    }
}

/// Columns a listing may filter or sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Id,
    Email,
    Phone,
    Name,
    BirthDate,
    Height,
    Weight,
}

impl Column {
    pub fn as_sql(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Email => "email",
            Column::Phone => "phone",
            Column::Name => "name",
            Column::BirthDate => "birth_date",
            Column::Height => "height",
            Column::Weight => "weight",
        }
    }
}

/// Row to insert; credential already derived.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub credential: Credential,
    pub birth_date: Option<Date>,
    pub height: Option<i32>,
    pub weight: Option<i32>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub credential: Option<Credential>,
    pub birth_date: Option<Date>,
    pub height: Option<i32>,
    pub weight: Option<i32>,
}

impl UserPatch {
    pub fn apply(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = Some(email.clone());
        }
        if let Some(phone) = &self.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(name) = &self.name {
            user.name = Some(name.clone());
        }
        if let Some(cred) = &self.credential {
            user.password = cred.hash.clone();
            user.salt = cred.salt.clone();
        }
        if let Some(d) = self.birth_date {
            user.birth_date = Some(d);
        }
        if let Some(h) = self.height {
            user.height = Some(h);
        }
        if let Some(w) = self.weight {
            user.weight = Some(w);
        }
        user.updated_at = OffsetDateTime::now_utc();
    }
}

/// Identity used to find the account at login. Every supplied field must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginLookup {
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl LoginLookup {
    pub fn matches(&self, user: &User) -> bool {
        let email_ok = self
            .email
            .as_ref()
            .map_or(true, |e| user.email.as_ref() == Some(e));
        let phone_ok = self
            .phone
            .as_ref()
            .map_or(true, |p| user.phone.as_ref() == Some(p));
        (self.email.is_some() || self.phone.is_some()) && email_ok && phone_ok
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated on {}", .0.join(", "))]
    UniqueViolation(Vec<String>),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
