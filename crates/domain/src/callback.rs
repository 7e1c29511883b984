//! Outbound status callbacks to the ticketing collaborator.

use common::{BackorderId, PhoneNumber};
use serde::{Deserialize, Serialize};

/// Terminal or progress outcome reported back for a request.
///
/// The ticketing collaborator owns customer-facing formatting; this payload
/// never carries raw transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusUpdate {
    /// Numbers were ordered immediately.
    Fulfilled { numbers: Vec<PhoneNumber> },

    /// A backorder was placed and is awaiting the carrier.
    BackorderPending { backorder_id: BackorderId },

    /// A previously placed backorder completed.
    BackorderCompleted { numbers: Vec<PhoneNumber> },

    /// The request reached a permanent failure.
    Failed { reason: String },
}

impl StatusUpdate {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            StatusUpdate::Fulfilled { .. } => "fulfilled",
            StatusUpdate::BackorderPending { .. } => "backorder_pending",
            StatusUpdate::BackorderCompleted { .. } => "backorder_completed",
            StatusUpdate::Failed { .. } => "failed",
        }
    }
}
