//! Domain error types.

use thiserror::Error;

use crate::status::BackorderStatus;

/// Errors raised by domain-level validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A request or backorder was created with a non-positive quantity.
    #[error("invalid quantity: {quantity} (must be positive)")]
    InvalidQuantity { quantity: i32 },

    /// A status string from storage did not name a known lifecycle state.
    #[error("unknown backorder status: {0}")]
    UnknownStatus(String),

    /// A lifecycle transition that the state machine does not allow.
    #[error("invalid backorder transition: {from} -> {to}")]
    InvalidTransition {
        from: BackorderStatus,
        to: BackorderStatus,
    },

    /// A completed-class status without numbers, or numbers outside one.
    #[error("numbers_completed must be non-empty exactly when status is completed-class (status {status}, {count} numbers)")]
    NumbersInvariant {
        status: BackorderStatus,
        count: usize,
    },
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
