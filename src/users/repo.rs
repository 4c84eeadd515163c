use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::auth::conflict::field_from_constraint;
use crate::users::query::{build_select, UserQuery};
use crate::users::repo_types::{
    LoginLookup, NewUser, PublicUser, StoreError, StoreResult, User, UserPatch, ALL_COLUMNS,
    PUBLIC_COLUMNS,
};

/// Persistence seam for user rows. Uniqueness of email and phone is enforced
/// by the store and reported as [`StoreError::UniqueViolation`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> StoreResult<User>;

    /// Run a listing; rows come back in the public projection only.
    async fn find_many(&self, query: &UserQuery) -> StoreResult<Vec<PublicUser>>;

    async fn find_by_id(&self, id: i32) -> StoreResult<Option<User>>;

    async fn find_public_by_id(&self, id: i32) -> StoreResult<Option<PublicUser>>;

    async fn find_by_login(&self, lookup: &LoginLookup) -> StoreResult<Option<User>>;

    /// Returns the number of rows changed.
    async fn update(&self, id: i32, patch: &UserPatch) -> StoreResult<u64>;

    /// Returns the number of rows removed.
    async fn delete(&self, id: i32) -> StoreResult<u64>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Split unique violations out of other database failures.
fn map_db_err(e: sqlx::Error) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            let fields = db_err
                .constraint()
                .and_then(field_from_constraint)
                .map(|f| vec![f.to_string()])
                .unwrap_or_default();
            return StoreError::UniqueViolation(fields);
        }
    }
    StoreError::Database(e)
}

/// `SELECT` of the full row matching every identity field given at login.
pub(crate) fn login_lookup_query(lookup: &LoginLookup) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {ALL_COLUMNS} FROM users WHERE "));
    let mut conds = qb.separated(" AND ");
    if let Some(email) = &lookup.email {
        conds.push("email = ").push_bind_unseparated(email.clone());
    }
    if let Some(phone) = &lookup.phone {
        conds.push("phone = ").push_bind_unseparated(phone.clone());
    }
    qb.push(" LIMIT 1");
    qb
}

/// `UPDATE` setting only the columns present in `patch`.
pub(crate) fn update_query(id: i32, patch: &UserPatch) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE users SET updated_at = NOW()");
    if let Some(email) = &patch.email {
        qb.push(", email = ").push_bind(email.clone());
    }
    if let Some(phone) = &patch.phone {
        qb.push(", phone = ").push_bind(phone.clone());
    }
    if let Some(name) = &patch.name {
        qb.push(", name = ").push_bind(name.clone());
    }
    if let Some(cred) = &patch.credential {
        qb.push(", password = ").push_bind(cred.hash.clone());
        qb.push(", salt = ").push_bind(cred.salt.clone());
    }
    if let Some(d) = patch.birth_date {
        qb.push(", birth_date = ").push_bind(d);
    }
    if let Some(h) = patch.height {
        qb.push(", height = ").push_bind(h);
    }
    if let Some(w) = patch.weight {
        qb.push(", weight = ").push_bind(w);
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (email, phone, name, password, salt, birth_date, height, weight)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ALL_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(user.email)
            .bind(user.phone)
            .bind(user.name)
            .bind(user.credential.hash)
            .bind(user.credential.salt)
            .bind(user.birth_date)
            .bind(user.height)
            .bind(user.weight)
            .fetch_one(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(row)
    }

    async fn find_many(&self, query: &UserQuery) -> StoreResult<Vec<PublicUser>> {
        let mut qb = build_select(query);
        debug!(sql = qb.sql(), "list users");
        let rows = qb
            .build_query_as::<PublicUser>()
            .fetch_all(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: i32) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {ALL_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(row)
    }

    async fn find_public_by_id(&self, id: i32) -> StoreResult<Option<PublicUser>> {
        let sql = format!("SELECT {PUBLIC_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, PublicUser>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(row)
    }

    async fn find_by_login(&self, lookup: &LoginLookup) -> StoreResult<Option<User>> {
        if lookup.email.is_none() && lookup.phone.is_none() {
            return Ok(None);
        }
        let mut qb = login_lookup_query(lookup);
        let row = qb
            .build_query_as::<User>()
            .fetch_optional(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(row)
    }

    async fn update(&self, id: i32, patch: &UserPatch) -> StoreResult<u64> {
        let mut qb = update_query(id, patch);
        let res = qb.build().execute(&self.db).await.map_err(map_db_err)?;
        Ok(res.rows_affected())
    }

    async fn delete(&self, id: i32) -> StoreResult<u64> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(res.rows_affected())
    }
}
