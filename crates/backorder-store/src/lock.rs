use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{BackorderId, RequestId};
use uuid::Uuid;

use crate::error::LockError;

/// Proof of a held lease.
///
/// Carries the holder token the backing store checks on renew and release,
/// so a handle whose lease was reclaimed by another worker cannot touch the
/// new holder's lock.
#[derive(Debug, Clone)]
pub struct LockHandle {
    key: String,
    holder: Uuid,
    expires_at: DateTime<Utc>,
}

impl LockHandle {
    pub(crate) fn new(key: String, holder: Uuid, expires_at: DateTime<Utc>) -> Self {
        Self {
            key,
            holder,
            expires_at,
        }
    }

    /// The locked key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The holder token for this grant.
    pub fn holder(&self) -> Uuid {
        self.holder
    }

    /// When the lease lapses unless renewed.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub(crate) fn set_expires_at(&mut self, expires_at: DateTime<Utc>) {
        self.expires_at = expires_at;
    }
}

/// Lock key for a backorder's reconciliation cycle.
pub fn backorder_lock_key(backorder_id: &BackorderId) -> String {
    format!("backorder/{backorder_id}")
}

/// Lock key deduplicating at-least-once delivery of a request.
pub fn request_lock_key(request_id: RequestId) -> String {
    format!("request/{request_id}")
}

/// Lease-based mutual exclusion shared by every worker process.
///
/// A lease that is not renewed lapses after its duration, so a crashed
/// holder's lock is eventually reclaimed by whoever asks next. Two key
/// spaces are in use: `backorder/{id}` and `request/{id}`.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Acquires the lock, stealing a lapsed lease if one is in the way.
    ///
    /// Fails with `AlreadyHeld` while another worker's lease is live.
    async fn acquire(&self, key: &str, lease: Duration) -> Result<LockHandle, LockError>;

    /// Extends a held lease by `lease` from now.
    ///
    /// Fails with `NotHeld` if the lease lapsed and was reclaimed.
    async fn renew(&self, handle: &mut LockHandle, lease: Duration) -> Result<(), LockError>;

    /// Releases a held lock. A lapsed-and-reclaimed handle fails with
    /// `NotHeld` and leaves the new holder's lock alone.
    async fn release(&self, handle: LockHandle) -> Result<(), LockError>;
}
