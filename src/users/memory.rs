use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::users::query::{SortDirection, UserQuery};
use crate::users::repo::UserStore;
use crate::users::repo_types::{
    Column, LoginLookup, NewUser, PublicUser, StoreError, StoreResult, User, UserPatch,
};

/// Process-local store for development (`USER_STORE=memory`) and tests.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    last_id: i32,
    users: BTreeMap<i32, User>,
}

impl Inner {
    /// Unique columns of `(email, phone)` already held by a row other than `except`.
    fn taken(
        &self,
        email: Option<&String>,
        phone: Option<&String>,
        except: Option<i32>,
    ) -> Vec<String> {
        let others = || self.users.values().filter(move |u| Some(u.id) != except);
        let mut fields = Vec::new();
        if let Some(email) = email {
            if others().any(|u| u.email.as_ref() == Some(email)) {
                fields.push("email".to_string());
            }
        }
        if let Some(phone) = phone {
            if others().any(|u| u.phone.as_ref() == Some(phone)) {
                fields.push("phone".to_string());
            }
        }
        fields
    }
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// NULLs sort after every value, as Postgres does for ascending order.
fn compare_column(a: &User, b: &User, column: Column) -> Ordering {
    match (a.value_of(column), b.value_of(column)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;

        let violated = inner.taken(user.email.as_ref(), user.phone.as_ref(), None);
        if !violated.is_empty() {
            return Err(StoreError::UniqueViolation(violated));
        }

        inner.last_id += 1;
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: inner.last_id,
            email: user.email,
            phone: user.phone,
            name: user.name,
            password: user.credential.hash,
            salt: user.credential.salt,
            birth_date: user.birth_date,
            height: user.height,
            weight: user.weight,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_many(&self, query: &UserQuery) -> StoreResult<Vec<PublicUser>> {
        let inner = self.inner.read().await;

        let mut rows: Vec<&User> = inner
            .users
            .values()
            .filter(|u| {
                query
                    .predicates
                    .iter()
                    .all(|(column, p)| p.matches(u.value_of(*column).as_ref()))
            })
            .collect();

        let column = Column::from(query.sort.field);
        rows.sort_by(|a, b| {
            let ord = compare_column(a, b, column);
            let ord = match query.sort.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            ord.then(a.id.cmp(&b.id))
        });

        Ok(rows
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .map(PublicUser::from)
            .collect())
    }

    async fn find_by_id(&self, id: i32) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_public_by_id(&self, id: i32) -> StoreResult<Option<PublicUser>> {
        Ok(self.find_by_id(id).await?.map(PublicUser::from))
    }

    async fn find_by_login(&self, lookup: &LoginLookup) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| lookup.matches(u)).cloned())
    }

    async fn update(&self, id: i32, patch: &UserPatch) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&id) {
            return Ok(0);
        }

        let violated = inner.taken(patch.email.as_ref(), patch.phone.as_ref(), Some(id));
        if !violated.is_empty() {
            return Err(StoreError::UniqueViolation(violated));
        }

        if let Some(user) = inner.users.get_mut(&id) {
            patch.apply(user);
        }
        Ok(1)
    }

    async fn delete(&self, id: i32) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        Ok(inner.users.remove(&id).map_or(0, |_| 1))
    }
}
