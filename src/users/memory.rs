use std::cmp::Ordering;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::users::repo::{StoreError, UserRepository};
use crate::users::repo_types::{ListParams, SortField, SortOrder, User, UserFilter, UserPatch};

/// Stand-in for the `users` table in tests. Emulates the unique email index,
/// ILIKE filters and ORDER BY / LIMIT / OFFSET of the Postgres repository.
#[derive(Default)]
pub struct InMemoryUserRepository {
    rows: RwLock<Vec<User>>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

fn row_matches(user: &User, filter: &UserFilter) -> bool {
    let search_ok = filter.search.as_deref().map_or(true, |term| {
        contains_ci(&user.full_name, term)
            || contains_ci(&user.email, term)
            || user.bio.as_deref().is_some_and(|bio| contains_ci(bio, term))
    });
    let location_ok = filter.location.as_deref().map_or(true, |term| {
        user.location
            .as_deref()
            .is_some_and(|loc| contains_ci(loc, term))
    });
    search_ok && location_ok
}

fn compare(a: &User, b: &User, field: SortField) -> Ordering {
    let primary = match field {
        SortField::FullName => a.full_name.cmp(&b.full_name),
        SortField::Email => a.email.cmp(&b.email),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    };
    primary.then_with(|| a.id.to_string().cmp(&b.id.to_string()))
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: &User) -> Result<User, StoreError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|u| u.email == user.email || u.id == user.id) {
            return Err(StoreError::UniqueViolation {
                constraint: Some("users_email_key".into()),
            });
        }
        rows.push(user.clone());
        Ok(user.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.rows.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn list(&self, params: &ListParams) -> Result<Vec<User>, StoreError> {
        let rows = self.rows.read().await;
        let mut hits: Vec<User> = rows
            .iter()
            .filter(|u| row_matches(u, &params.filter))
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            let ord = compare(a, b, params.sort_by);
            match params.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        let skip = usize::try_from(params.offset()).unwrap_or(usize::MAX);
        Ok(hits
            .into_iter()
            .skip(skip)
            .take(params.limit as usize)
            .collect())
    }

    async fn count(&self, filter: &UserFilter) -> Result<u64, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|u| row_matches(u, filter)).count() as u64)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &UserPatch,
        updated_at: OffsetDateTime,
    ) -> Result<User, StoreError> {
        let mut rows = self.rows.write().await;
        // zero matched rows means no constraint is ever checked
        let idx = rows
            .iter()
            .position(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(email) = patch.email.as_set() {
            if rows.iter().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::UniqueViolation {
                    constraint: Some("users_email_key".into()),
                });
            }
        }
        let user = &mut rows[idx];
        patch.clone().apply(user, updated_at);
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|u| u.id != id);
        if rows.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn exists(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.rows.read().await.iter().any(|u| u.id == id))
    }
}

/// Repository whose every call misbehaves the same way.
pub enum BrokenUserRepository {
    /// Fails as if the pool could not hand out a connection.
    Failing,
    /// Never completes.
    Stalled,
}

impl BrokenUserRepository {
    async fn misbehave<T>(&self) -> Result<T, StoreError> {
        match self {
            Self::Failing => Err(StoreError::Backend(sqlx::Error::PoolTimedOut)),
            Self::Stalled => std::future::pending().await,
        }
    }
}

#[async_trait]
impl UserRepository for BrokenUserRepository {
    async fn insert(&self, _user: &User) -> Result<User, StoreError> {
        self.misbehave().await
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>, StoreError> {
        self.misbehave().await
    }

    async fn list(&self, _params: &ListParams) -> Result<Vec<User>, StoreError> {
        self.misbehave().await
    }

    async fn count(&self, _filter: &UserFilter) -> Result<u64, StoreError> {
        self.misbehave().await
    }

    async fn update(
        &self,
        _id: Uuid,
        _patch: &UserPatch,
        _updated_at: OffsetDateTime,
    ) -> Result<User, StoreError> {
        self.misbehave().await
    }

    async fn delete(&self, _id: Uuid) -> Result<(), StoreError> {
        self.misbehave().await
    }

    async fn exists(&self, _id: Uuid) -> Result<bool, StoreError> {
        self.misbehave().await
    }
}
