use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::users::dto::Pagination;
use crate::users::error::DomainError;
use crate::users::repo::UserRepository;
use crate::users::repo_types::{now_millis, ListParams, NewUser, User, UserPatch};

/// Business rules for the user resource. The only code that talks to the
/// repository.
///
/// Writes are attempted directly and a uniqueness rejection from the store is
/// reported as a conflict; nothing is pre-checked and nothing is retried.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

#[derive(Debug)]
pub struct UserPage {
    pub users: Vec<User>,
    pub pagination: Pagination,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, data), fields(email = %data.email))]
    pub async fn create_user(&self, data: NewUser) -> Result<User, DomainError> {
        let email = data.email.clone();
        let user = data.into_user(Uuid::new_v4(), now_millis());
        let created = self
            .repo
            .insert(&user)
            .await
            .map_err(|e| DomainError::from_store(e, Some(user.id), Some(&email)))?;
        info!(user_id = %created.id, "user created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_user_by_id(&self, id: Uuid) -> Result<User, DomainError> {
        self.repo
            .find_by_id(id)
            .await
            .map_err(|e| DomainError::from_store(e, Some(id), None))?
            .ok_or_else(|| DomainError::not_found(id))
    }

    /// Fetch one page plus its metadata.
    ///
    /// The count and the page run concurrently as two independent reads, so
    /// under concurrent writes `pagination.total` may disagree slightly with
    /// the rows returned.
    #[instrument(skip(self))]
    pub async fn get_users(&self, params: &ListParams) -> Result<UserPage, DomainError> {
        let (total, users) = tokio::try_join!(
            self.repo.count(&params.filter),
            self.repo.list(params)
        )
        .map_err(|e| DomainError::from_store(e, None, None))?;

        debug!(total, returned = users.len(), "listed users");
        Ok(UserPage {
            users,
            pagination: Pagination::new(total, params.page, params.limit),
        })
    }

    /// Apply a partial update. `updatedAt` moves even when no visible field
    /// changes.
    #[instrument(skip(self, patch))]
    pub async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User, DomainError> {
        let email = patch.email.as_set().cloned();
        let updated = self
            .repo
            .update(id, &patch, now_millis())
            .await
            .map_err(|e| DomainError::from_store(e, Some(id), email.as_deref()))?;
        info!(user_id = %id, "user updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid) -> Result<(), DomainError> {
        self.repo
            .delete(id)
            .await
            .map_err(|e| DomainError::from_store(e, Some(id), None))?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn user_exists(&self, id: Uuid) -> Result<bool, DomainError> {
        self.repo
            .exists(id)
            .await
            .map_err(|e| DomainError::from_store(e, Some(id), None))
    }
}
