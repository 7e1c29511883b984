use backorder_store::{LockError, StoreError};
use common::RequestId;
use domain::DomainError;
use provider::ProviderError;
use thiserror::Error;

/// Errors that can occur while acquiring numbers or reconciling backorders.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Another worker holds the request lease; the caller retries after it
    /// finishes and gets the recorded outcome.
    #[error("request {0} is already in flight")]
    RequestInFlight(RequestId),

    /// Every provider failed with transport-class trouble; nothing was
    /// ordered and no backorder was placed.
    #[error("no provider available: {0}")]
    NoProviderAvailable(String),

    /// A backorder names a provider this engine was not configured with.
    #[error("no configured provider named {0}")]
    UnknownProvider(String),

    /// Provider error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Lock error.
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// Domain validation error.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
