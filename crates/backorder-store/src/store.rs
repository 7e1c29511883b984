use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BackorderId, OrderId, PhoneNumber, RequestId};
use domain::{Backorder, BackorderStatus, DomainError, OrderRecord};

use crate::Result;

/// A guarded status transition.
///
/// Every update names the status it replaces (see
/// [`BackorderStore::transition`]); the constructors here produce the only
/// update shapes the lifecycle allows, so callers cannot assemble a write
/// that breaks the numbers invariant.
#[derive(Debug, Clone)]
pub struct BackorderUpdate {
    /// Target status.
    pub to: BackorderStatus,
    /// Whether this update counts as one carrier poll.
    pub increment_attempts: bool,
    /// New `last_checked_at`, when the scheduler looked at the row.
    pub checked_at: Option<DateTime<Utc>>,
    /// Delivered numbers; only set when entering `completed_unpublished`.
    pub numbers_completed: Option<Vec<PhoneNumber>>,
}

impl BackorderUpdate {
    /// Marks the row as being checked by the current cycle.
    pub fn begin_check() -> Self {
        Self {
            to: BackorderStatus::Checking,
            increment_attempts: false,
            checked_at: None,
            numbers_completed: None,
        }
    }

    /// The carrier reported no change; back to `pending` for the next cycle.
    pub fn outcome_pending(checked_at: DateTime<Utc>) -> Self {
        Self {
            to: BackorderStatus::Pending,
            increment_attempts: true,
            checked_at: Some(checked_at),
            numbers_completed: None,
        }
    }

    /// The carrier delivered numbers; publication is still owed.
    pub fn outcome_completed(numbers: Vec<PhoneNumber>, checked_at: DateTime<Utc>) -> Self {
        Self {
            to: BackorderStatus::CompletedUnpublished,
            increment_attempts: true,
            checked_at: Some(checked_at),
            numbers_completed: Some(numbers),
        }
    }

    /// The carrier failed or cancelled the order.
    pub fn outcome_failed(checked_at: DateTime<Utc>) -> Self {
        Self {
            to: BackorderStatus::Failed,
            increment_attempts: true,
            checked_at: Some(checked_at),
            numbers_completed: None,
        }
    }

    /// Attempt ceiling or maximum age reached; no carrier call was made.
    pub fn abandon(decided_at: DateTime<Utc>) -> Self {
        Self {
            to: BackorderStatus::Abandoned,
            increment_attempts: false,
            checked_at: Some(decided_at),
            numbers_completed: None,
        }
    }

    /// Inventory publication succeeded; the row keeps its numbers.
    pub fn published() -> Self {
        Self {
            to: BackorderStatus::Completed,
            increment_attempts: false,
            checked_at: None,
            numbers_completed: None,
        }
    }
}

/// Validates an update against the lifecycle state machine and the numbers
/// invariant, given the status the caller expects to replace.
pub fn validate_update(expected: BackorderStatus, update: &BackorderUpdate) -> domain::error::Result<()> {
    if !expected.can_transition_to(update.to) {
        return Err(DomainError::InvalidTransition {
            from: expected,
            to: update.to,
        });
    }

    match &update.numbers_completed {
        Some(numbers) => {
            // Numbers attach exactly once, when completion is first observed.
            if update.to != BackorderStatus::CompletedUnpublished || numbers.is_empty() {
                return Err(DomainError::NumbersInvariant {
                    status: update.to,
                    count: numbers.len(),
                });
            }
        }
        None => {
            if update.to == BackorderStatus::CompletedUnpublished {
                return Err(DomainError::NumbersInvariant {
                    status: update.to,
                    count: 0,
                });
            }
        }
    }

    Ok(())
}

/// Subject of an inventory publication, the key of its PublishRecord.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PublishSubject {
    Backorder(BackorderId),
    Order(OrderId),
}

impl PublishSubject {
    /// Returns the storage key, e.g. `backorder:789555001`.
    pub fn key(&self) -> String {
        match self {
            PublishSubject::Backorder(id) => format!("backorder:{id}"),
            PublishSubject::Order(id) => format!("order:{id}"),
        }
    }
}

impl std::fmt::Display for PublishSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Core trait for the durable acquisition store.
///
/// Owns Backorder, OrderRecord, and PublishRecord rows. Backorder rows are
/// only ever mutated through [`transition`](Self::transition) while the
/// caller holds the per-backorder coordination lock; the expected-status
/// guard turns a lost race into a typed [`StaleTransition`] instead of a
/// silent overwrite. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait BackorderStore: Send + Sync {
    /// Inserts a fresh backorder row.
    ///
    /// Fails with `DuplicateBackorder` if a row already exists for the same
    /// (request_id, provider) pair.
    async fn insert_backorder(&self, backorder: &Backorder) -> Result<()>;

    /// Retrieves a backorder by ID.
    async fn get_backorder(&self, backorder_id: &BackorderId) -> Result<Option<Backorder>>;

    /// Retrieves the backorder created for a request, if any.
    async fn find_backorder_for_request(&self, request_id: RequestId)
    -> Result<Option<Backorder>>;

    /// Lists non-terminal backorders for the reconciliation scan, oldest
    /// first.
    async fn list_open_backorders(&self, limit: i64) -> Result<Vec<Backorder>>;

    /// Applies a guarded status transition and returns the updated row.
    ///
    /// The row is updated only if its current status equals `expected`;
    /// otherwise fails with `StaleTransition` carrying the actual status.
    /// The status change, `last_checked_at`, and the attempt-count increment
    /// are persisted atomically.
    async fn transition(
        &self,
        backorder_id: &BackorderId,
        expected: BackorderStatus,
        update: BackorderUpdate,
    ) -> Result<Backorder>;

    /// Inserts an immediately fulfilled order.
    ///
    /// Fails with `DuplicateOrder` if the request already has one.
    async fn insert_order(&self, order: &OrderRecord) -> Result<()>;

    /// Retrieves the order fulfilled for a request, if any.
    async fn find_order_for_request(&self, request_id: RequestId) -> Result<Option<OrderRecord>>;

    /// Records a publication, insert-if-absent.
    ///
    /// Returns true if this call created the record, false if one already
    /// existed. Even a lock-bypassing race produces a single winner.
    async fn record_publish(&self, subject: &PublishSubject, response_status: &str)
    -> Result<bool>;

    /// Returns true if a publication record exists for the subject.
    async fn has_publish_record(&self, subject: &PublishSubject) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_subject_keys_are_namespaced() {
        let backorder = PublishSubject::Backorder(BackorderId::new("789"));
        let order = PublishSubject::Order(OrderId::new("789"));
        assert_eq!(backorder.key(), "backorder:789");
        assert_eq!(order.key(), "order:789");
        assert_ne!(backorder.key(), order.key());
    }

    #[test]
    fn validate_update_accepts_lifecycle_shapes() {
        let now = Utc::now();
        let numbers = vec![PhoneNumber::parse("+19345550142").unwrap()];

        validate_update(BackorderStatus::Pending, &BackorderUpdate::begin_check()).unwrap();
        validate_update(BackorderStatus::Checking, &BackorderUpdate::begin_check()).unwrap();
        validate_update(
            BackorderStatus::Checking,
            &BackorderUpdate::outcome_pending(now),
        )
        .unwrap();
        validate_update(
            BackorderStatus::Checking,
            &BackorderUpdate::outcome_completed(numbers, now),
        )
        .unwrap();
        validate_update(
            BackorderStatus::Checking,
            &BackorderUpdate::outcome_failed(now),
        )
        .unwrap();
        validate_update(BackorderStatus::Pending, &BackorderUpdate::abandon(now)).unwrap();
        validate_update(
            BackorderStatus::CompletedUnpublished,
            &BackorderUpdate::published(),
        )
        .unwrap();
    }

    #[test]
    fn validate_update_rejects_illegal_transitions() {
        let now = Utc::now();
        assert!(matches!(
            validate_update(
                BackorderStatus::Pending,
                &BackorderUpdate::outcome_failed(now)
            ),
            Err(DomainError::InvalidTransition { .. })
        ));
        assert!(matches!(
            validate_update(BackorderStatus::Completed, &BackorderUpdate::begin_check()),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn validate_update_rejects_empty_completion() {
        let result = validate_update(
            BackorderStatus::Checking,
            &BackorderUpdate::outcome_completed(vec![], Utc::now()),
        );
        assert!(matches!(result, Err(DomainError::NumbersInvariant { .. })));
    }
}
