use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{BackorderId, OrderId, RequestId};
use domain::{Backorder, BackorderStatus, OrderRecord};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    Result, StoreError,
    error::LockError,
    lock::{LockHandle, LockManager},
    store::{BackorderStore, BackorderUpdate, PublishSubject, validate_update},
};

/// In-memory backorder store implementation for testing.
///
/// Stores all rows in memory and provides the same observable semantics as
/// the PostgreSQL implementation, including duplicate detection and the
/// guarded-transition conflict behavior.
#[derive(Clone, Default)]
pub struct InMemoryBackorderStore {
    backorders: Arc<RwLock<HashMap<BackorderId, Backorder>>>,
    orders: Arc<RwLock<HashMap<OrderId, OrderRecord>>>,
    publish_records: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryBackorderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of backorder rows.
    pub async fn backorder_count(&self) -> usize {
        self.backorders.read().await.len()
    }

    /// Returns the total number of publish records.
    pub async fn publish_record_count(&self) -> usize {
        self.publish_records.read().await.len()
    }
}

#[async_trait]
impl BackorderStore for InMemoryBackorderStore {
    async fn insert_backorder(&self, backorder: &Backorder) -> Result<()> {
        let mut backorders = self.backorders.write().await;

        let duplicate = backorders.contains_key(&backorder.backorder_id)
            || backorders.values().any(|b| {
                b.request_id == backorder.request_id && b.provider == backorder.provider
            });
        if duplicate {
            return Err(StoreError::DuplicateBackorder {
                request_id: backorder.request_id,
                provider: backorder.provider.clone(),
            });
        }

        backorders.insert(backorder.backorder_id.clone(), backorder.clone());
        Ok(())
    }

    async fn get_backorder(&self, backorder_id: &BackorderId) -> Result<Option<Backorder>> {
        Ok(self.backorders.read().await.get(backorder_id).cloned())
    }

    async fn find_backorder_for_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<Backorder>> {
        let backorders = self.backorders.read().await;
        Ok(backorders
            .values()
            .filter(|b| b.request_id == request_id)
            .min_by_key(|b| b.created_at)
            .cloned())
    }

    async fn list_open_backorders(&self, limit: i64) -> Result<Vec<Backorder>> {
        let backorders = self.backorders.read().await;
        let mut open: Vec<Backorder> = backorders
            .values()
            .filter(|b| b.status.needs_reconciliation())
            .cloned()
            .collect();
        open.sort_by_key(|b| b.created_at);
        open.truncate(limit.max(0) as usize);
        Ok(open)
    }

    async fn transition(
        &self,
        backorder_id: &BackorderId,
        expected: BackorderStatus,
        update: BackorderUpdate,
    ) -> Result<Backorder> {
        validate_update(expected, &update)?;

        let mut backorders = self.backorders.write().await;
        let backorder = backorders
            .get_mut(backorder_id)
            .ok_or_else(|| StoreError::BackorderNotFound(backorder_id.clone()))?;

        if backorder.status != expected {
            return Err(StoreError::StaleTransition {
                backorder_id: backorder_id.clone(),
                expected,
                actual: backorder.status,
            });
        }

        backorder.status = update.to;
        if update.increment_attempts {
            backorder.attempt_count += 1;
        }
        if let Some(checked_at) = update.checked_at {
            backorder.last_checked_at = Some(checked_at);
        }
        if let Some(numbers) = update.numbers_completed {
            backorder.numbers_completed = numbers;
        }

        Ok(backorder.clone())
    }

    async fn insert_order(&self, order: &OrderRecord) -> Result<()> {
        let mut orders = self.orders.write().await;

        let duplicate = orders.contains_key(&order.order_id)
            || orders.values().any(|o| o.request_id == order.request_id);
        if duplicate {
            return Err(StoreError::DuplicateOrder(order.request_id));
        }

        orders.insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    async fn find_order_for_request(&self, request_id: RequestId) -> Result<Option<OrderRecord>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .find(|o| o.request_id == request_id)
            .cloned())
    }

    async fn record_publish(
        &self,
        subject: &PublishSubject,
        response_status: &str,
    ) -> Result<bool> {
        let mut records = self.publish_records.write().await;
        let key = subject.key();
        if records.contains_key(&key) {
            return Ok(false);
        }
        records.insert(key, response_status.to_string());
        Ok(true)
    }

    async fn has_publish_record(&self, subject: &PublishSubject) -> Result<bool> {
        Ok(self.publish_records.read().await.contains_key(&subject.key()))
    }
}

/// In-memory lock manager for testing.
///
/// Lease expiry uses the process clock; semantics otherwise match the
/// PostgreSQL implementation, including lapsed-lease stealing and
/// holder-checked renew/release.
#[derive(Clone, Default)]
pub struct InMemoryLockManager {
    leases: Arc<RwLock<HashMap<String, (Uuid, DateTime<Utc>)>>>,
}

impl InMemoryLockManager {
    /// Creates a new in-memory lock manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a live lease exists on the key.
    pub async fn is_locked(&self, key: &str) -> bool {
        let leases = self.leases.read().await;
        leases
            .get(key)
            .is_some_and(|(_, expires_at)| *expires_at > Utc::now())
    }

    /// Returns the number of leases, live or lapsed.
    pub async fn lease_count(&self) -> usize {
        self.leases.read().await.len()
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn acquire(&self, key: &str, lease: Duration) -> std::result::Result<LockHandle, LockError> {
        let mut leases = self.leases.write().await;
        let now = Utc::now();

        if let Some((_, expires_at)) = leases.get(key)
            && *expires_at > now
        {
            return Err(LockError::AlreadyHeld {
                key: key.to_string(),
            });
        }

        let holder = Uuid::new_v4();
        let expires_at = now + lease;
        leases.insert(key.to_string(), (holder, expires_at));
        Ok(LockHandle::new(key.to_string(), holder, expires_at))
    }

    async fn renew(
        &self,
        handle: &mut LockHandle,
        lease: Duration,
    ) -> std::result::Result<(), LockError> {
        let mut leases = self.leases.write().await;
        match leases.get_mut(handle.key()) {
            Some((holder, expires_at)) if *holder == handle.holder() => {
                *expires_at = Utc::now() + lease;
                handle.set_expires_at(*expires_at);
                Ok(())
            }
            _ => Err(LockError::NotHeld {
                key: handle.key().to_string(),
            }),
        }
    }

    async fn release(&self, handle: LockHandle) -> std::result::Result<(), LockError> {
        let mut leases = self.leases.write().await;
        match leases.get(handle.key()) {
            Some((holder, _)) if *holder == handle.holder() => {
                leases.remove(handle.key());
                Ok(())
            }
            _ => Err(LockError::NotHeld {
                key: handle.key().to_string(),
            }),
        }
    }
}
