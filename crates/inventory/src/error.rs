//! Publication error taxonomy.

use thiserror::Error;

/// Failures from the inventory endpoint.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The endpoint refused the batch (4xx). A data-shape problem; retrying
    /// the same batch will not help.
    #[error("inventory publish rejected: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The endpoint could not be reached or failed server-side. Safe to
    /// retry later.
    #[error("inventory unavailable: {reason}")]
    Unavailable { reason: String },
}

impl PublishError {
    /// Returns true for failures a later attempt may clear.
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::Unavailable { .. })
    }
}
