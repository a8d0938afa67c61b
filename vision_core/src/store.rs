//! Entry store gateway contract.
//!
//! The journal session only ever talks to an [`EntryStore`]. Implementations
//! convert every failure into a [`StoreError`] whose display text is safe to
//! show to the user; internal detail is logged, never surfaced.

use crate::{DemoUser, JournalEntry, NewEntry};
use async_trait::async_trait;
use uuid::Uuid;

/// Result type alias for gateway operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failure reported by the entry store boundary
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Malformed identifier or missing required field
    #[error("{0}")]
    InvalidInput(String),

    #[error("User not found")]
    UserNotFound,

    /// Entry absent or owned by someone else; the two are indistinguishable
    #[error("Entry not found or unauthorized")]
    NotFoundOrUnauthorized,

    /// Unexpected failure. The detail is for logs only.
    #[error("Internal server error")]
    Internal(String),
}

/// Coarse classification used for retry and display decisions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFoundOrUnauthorized,
    Internal,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidInput(_) => ErrorKind::Validation,
            StoreError::UserNotFound | StoreError::NotFoundOrUnauthorized => {
                ErrorKind::NotFoundOrUnauthorized
            }
            StoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Only internal failures are worth a manual retry
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }

    pub(crate) fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!("{}: {}", context, err);
        StoreError::Internal(format!("{}: {}", context, err))
    }
}

/// Persistence boundary for journal entries and user identity
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Obtain or create the demo identity. Repeated calls return the same user.
    async fn ensure_demo_user(&self) -> StoreResult<DemoUser>;

    async fn create_entry(&self, entry: NewEntry) -> StoreResult<JournalEntry>;

    /// All entries owned by `user_id`, newest `date` first
    async fn list_entries(&self, user_id: Uuid) -> StoreResult<Vec<JournalEntry>>;

    /// Delete `entry_id` only if it belongs to `user_id`
    async fn delete_entry(&self, entry_id: Uuid, user_id: Uuid) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            StoreError::InvalidInput("bad".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            StoreError::UserNotFound.kind(),
            ErrorKind::NotFoundOrUnauthorized
        );
        assert_eq!(
            StoreError::NotFoundOrUnauthorized.kind(),
            ErrorKind::NotFoundOrUnauthorized
        );
        assert!(StoreError::Internal("disk full".into()).is_retryable());
        assert!(!StoreError::UserNotFound.is_retryable());
    }

    #[test]
    fn test_internal_detail_is_not_displayed() {
        let err = StoreError::Internal("no such table: entries".into());
        assert_eq!(err.to_string(), "Internal server error");
    }
}
