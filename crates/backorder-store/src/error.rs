use common::{BackorderId, RequestId};
use domain::{BackorderStatus, DomainError};
use thiserror::Error;

/// Errors that can occur when interacting with the backorder store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backorder was not found.
    #[error("backorder not found: {0}")]
    BackorderNotFound(BackorderId),

    /// A backorder already exists for this (request, provider) pair.
    #[error("backorder already exists for request {request_id} and provider {provider}")]
    DuplicateBackorder {
        request_id: RequestId,
        provider: String,
    },

    /// An order record already exists for this request.
    #[error("order already exists for request {0}")]
    DuplicateOrder(RequestId),

    /// A guarded transition found a different status than the caller
    /// expected. Another worker got there first.
    #[error("stale transition for backorder {backorder_id}: expected status {expected}, found {actual}")]
    StaleTransition {
        backorder_id: BackorderId,
        expected: BackorderStatus,
        actual: BackorderStatus,
    },

    /// Domain validation failed (state machine or numbers invariant).
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// A stored value could not be parsed back into its domain type.
    #[error("stored value could not be parsed: {0}")]
    Corrupt(#[from] common::ParseError),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors from the coordination lock.
///
/// `AlreadyHeld` is an expected contention signal, not a failure: callers
/// skip the contended item and move on.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another worker holds a live lease on this key.
    #[error("lock already held: {key}")]
    AlreadyHeld { key: String },

    /// The caller's lease lapsed and the lock was reclaimed; the handle can
    /// no longer renew or release it.
    #[error("lock not held: {key}")]
    NotHeld { key: String },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl LockError {
    /// Returns true for the expected-contention case.
    pub fn is_contention(&self) -> bool {
        matches!(self, LockError::AlreadyHeld { .. })
    }
}
