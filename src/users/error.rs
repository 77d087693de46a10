use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::users::repo::StoreError;

/// Failures a user operation can report, independent of HTTP. Input
/// validation happens before the service is called and never shows up here.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("user not found: {id}")]
    NotFound { id: Uuid },

    #[error("user with email '{email}' already exists")]
    Conflict { email: String },

    #[error("internal error")]
    Internal,
}

impl DomainError {
    pub fn not_found(id: Uuid) -> Self {
        Self::NotFound { id }
    }

    pub fn conflict(email: impl Into<String>) -> Self {
        Self::Conflict {
            email: email.into(),
        }
    }

    /// Translate a store failure for an operation on `id` writing `email`.
    pub fn from_store(e: StoreError, id: Option<Uuid>, email: Option<&str>) -> Self {
        match e {
            StoreError::UniqueViolation { constraint } => {
                tracing::debug!(?constraint, "unique constraint rejected write");
                Self::conflict(email.unwrap_or_default())
            }
            StoreError::NotFound => match id {
                Some(id) => Self::not_found(id),
                None => {
                    error!("store reported a missing row without an id in scope");
                    Self::Internal
                }
            },
            other => {
                error!(error = %other, "store operation failed");
                Self::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_translate_to_domain_kinds() {
        let id = Uuid::new_v4();
        assert!(matches!(
            DomainError::from_store(StoreError::NotFound, Some(id), None),
            DomainError::NotFound { id: got } if got == id
        ));
        assert!(matches!(
            DomainError::from_store(
                StoreError::UniqueViolation { constraint: None },
                None,
                Some("a@b.co")
            ),
            DomainError::Conflict { email } if email == "a@b.co"
        ));
        assert!(matches!(
            DomainError::from_store(StoreError::Backend(sqlx::Error::PoolClosed), Some(id), None),
            DomainError::Internal
        ));
    }
}
