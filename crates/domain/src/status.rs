//! Backorder lifecycle state machine.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The state of a backorder in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Checking ──► CompletedUnpublished ──► Completed
///    ▲           │
///    │           ├──► Pending   (carrier reports no change)
///    │           └──► Failed
///    └─ Pending ───► Abandoned  (attempt ceiling or max age reached)
/// ```
///
/// `Checking` is held only for the duration of one status-check cycle; a row
/// left in `Checking` by a crashed worker is picked up again once its lock
/// lease lapses. `Completed`, `Failed`, and `Abandoned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackorderStatus {
    /// Waiting for the carrier to complete the order.
    #[default]
    Pending,

    /// A reconciliation cycle is querying the carrier right now.
    Checking,

    /// The carrier delivered numbers, but inventory publication is still owed.
    CompletedUnpublished,

    /// Numbers delivered and published (terminal state).
    Completed,

    /// The carrier failed or cancelled the order (terminal state).
    Failed,

    /// Never completed within the attempt/age ceiling (terminal state).
    Abandoned,
}

impl BackorderStatus {
    /// Returns true if a status-check cycle may start from this state.
    pub fn can_begin_check(&self) -> bool {
        matches!(self, BackorderStatus::Pending | BackorderStatus::Checking)
    }

    /// Returns true if the backorder may be abandoned from this state.
    pub fn can_abandon(&self) -> bool {
        matches!(self, BackorderStatus::Pending | BackorderStatus::Checking)
    }

    /// Returns true if inventory publication may run from this state.
    pub fn can_publish(&self) -> bool {
        matches!(self, BackorderStatus::CompletedUnpublished)
    }

    /// Returns true if this is a terminal state (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BackorderStatus::Completed | BackorderStatus::Failed | BackorderStatus::Abandoned
        )
    }

    /// Returns true for the two states that carry completed numbers.
    pub fn is_completed_class(&self) -> bool {
        matches!(
            self,
            BackorderStatus::CompletedUnpublished | BackorderStatus::Completed
        )
    }

    /// Returns true if the reconciliation scan should select this state.
    pub fn needs_reconciliation(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the state machine allows `self -> to`.
    ///
    /// `Checking -> Checking` is allowed so that a cycle can re-enter a row
    /// a crashed worker left behind.
    pub fn can_transition_to(&self, to: BackorderStatus) -> bool {
        use BackorderStatus::*;
        matches!(
            (self, to),
            (Pending, Checking)
                | (Pending, Abandoned)
                | (Checking, Checking)
                | (Checking, Pending)
                | (Checking, CompletedUnpublished)
                | (Checking, Failed)
                | (Checking, Abandoned)
                | (CompletedUnpublished, Completed)
        )
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackorderStatus::Pending => "pending",
            BackorderStatus::Checking => "checking",
            BackorderStatus::CompletedUnpublished => "completed_unpublished",
            BackorderStatus::Completed => "completed",
            BackorderStatus::Failed => "failed",
            BackorderStatus::Abandoned => "abandoned",
        }
    }
}

impl std::fmt::Display for BackorderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BackorderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BackorderStatus::Pending),
            "checking" => Ok(BackorderStatus::Checking),
            "completed_unpublished" => Ok(BackorderStatus::CompletedUnpublished),
            "completed" => Ok(BackorderStatus::Completed),
            "failed" => Ok(BackorderStatus::Failed),
            "abandoned" => Ok(BackorderStatus::Abandoned),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}
