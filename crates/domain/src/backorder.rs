//! The backorder entity.

use chrono::{DateTime, Duration, Utc};
use common::{AreaCode, BackorderId, Country, PhoneNumber, RequestId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};
use crate::status::BackorderStatus;

/// A carrier-side promise to deliver numbers later, tracked locally until
/// completion or abandonment.
///
/// Rows are never deleted; terminal rows remain as an audit trail. All
/// mutation goes through the backorder store's guarded transition API while
/// holding the per-backorder lock, so this type only carries data and
/// read-side predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backorder {
    pub backorder_id: BackorderId,
    pub request_id: RequestId,
    /// Name of the provider the backorder was placed with.
    pub provider: String,
    pub area_code: AreaCode,
    pub country: Country,
    pub quantity_requested: i32,
    pub status: BackorderStatus,
    /// Status-check attempts so far; one per successful lock acquisition
    /// that polled the carrier.
    pub attempt_count: i32,
    pub created_at: DateTime<Utc>,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Delivered numbers; empty until the carrier completes the order.
    pub numbers_completed: Vec<PhoneNumber>,
}

impl Backorder {
    /// Creates a fresh `pending` backorder.
    pub fn new(
        backorder_id: BackorderId,
        request_id: RequestId,
        provider: impl Into<String>,
        area_code: AreaCode,
        country: Country,
        quantity_requested: i32,
    ) -> Result<Self> {
        if quantity_requested <= 0 {
            return Err(DomainError::InvalidQuantity {
                quantity: quantity_requested,
            });
        }
        Ok(Self {
            backorder_id,
            request_id,
            provider: provider.into(),
            area_code,
            country,
            quantity_requested,
            status: BackorderStatus::Pending,
            attempt_count: 0,
            created_at: Utc::now(),
            last_checked_at: None,
            numbers_completed: Vec::new(),
        })
    }

    /// Age of the backorder at `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Returns true if the attempt ceiling or maximum age has been reached,
    /// i.e. the next cycle should abandon instead of polling the carrier.
    pub fn should_abandon(&self, now: DateTime<Utc>, max_attempts: i32, max_age: Duration) -> bool {
        self.status.can_abandon()
            && (self.attempt_count >= max_attempts || self.age(now) >= max_age)
    }

    /// Checks the numbers/status invariant: `numbers_completed` is non-empty
    /// exactly when the status is completed-class.
    pub fn check_numbers_invariant(&self) -> Result<()> {
        if self.status.is_completed_class() == self.numbers_completed.is_empty() {
            return Err(DomainError::NumbersInvariant {
                status: self.status,
                count: self.numbers_completed.len(),
            });
        }
        Ok(())
    }
}
