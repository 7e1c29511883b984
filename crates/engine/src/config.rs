//! Tunables for acquisition and reconciliation.

use inventory::InventoryIdentity;
use provider::SearchResult;

/// How much of a request a provider must cover before its numbers are
/// ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FulfillmentPolicy {
    /// A provider is used only when it can cover the full quantity;
    /// otherwise the engine falls through to the next provider.
    #[default]
    AllOrNothing,
}

impl FulfillmentPolicy {
    /// Returns true if a search result satisfies this policy for the
    /// requested quantity.
    pub fn satisfied_by(&self, result: &SearchResult, quantity: i32) -> bool {
        match self {
            FulfillmentPolicy::AllOrNothing => result.can_fill(quantity),
        }
    }
}

/// Configuration for the acquisition path.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Lease taken on `request/{id}` for the duration of one acquire call.
    pub request_lease: chrono::Duration,
    /// Fulfillment policy applied to every search result.
    pub fulfillment: FulfillmentPolicy,
    /// Identity stamped on published number records.
    pub identity: InventoryIdentity,
}

impl EngineConfig {
    pub fn new(identity: InventoryIdentity) -> Self {
        Self {
            request_lease: chrono::Duration::seconds(120),
            fulfillment: FulfillmentPolicy::default(),
            identity,
        }
    }
}

/// Configuration for the background reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Pause between reconciliation cycles.
    pub check_interval: std::time::Duration,
    /// Lease duration for `backorder/{id}` locks. Must comfortably exceed
    /// one carrier poll; the lease is renewed before the publish leg.
    pub lock_lease: chrono::Duration,
    /// Attempt ceiling after which a backorder is abandoned.
    pub max_check_attempts: i32,
    /// Maximum age after which a backorder is abandoned.
    pub abandon_after: chrono::Duration,
    /// How many backorders one cycle checks concurrently.
    pub max_concurrent_checks: usize,
    /// Scan window for one cycle, oldest rows first.
    pub scan_limit: i64,
    /// Acting user recorded on publications made by the reconciler.
    pub publish_user_email: String,
    /// Identity stamped on published number records.
    pub identity: InventoryIdentity,
}

impl ReconcilerConfig {
    pub fn new(identity: InventoryIdentity) -> Self {
        Self {
            check_interval: std::time::Duration::from_secs(600),
            lock_lease: chrono::Duration::seconds(120),
            max_check_attempts: 1000,
            abandon_after: chrono::Duration::days(180),
            max_concurrent_checks: 4,
            scan_limit: 256,
            publish_user_email: "admin@example.com".to_string(),
            identity,
        }
    }
}
