//! Scriptable in-memory provider for tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{AreaCode, BackorderId, Country, OrderId, PhoneNumber};

use crate::client::{BackorderPoll, OrderConfirmation, ProviderClient, SearchResult};
use crate::error::ProviderError;

/// A backorder placement recorded by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedBackorder {
    pub area_code: AreaCode,
    pub quantity: i32,
    pub reference: String,
}

#[derive(Debug, Default)]
struct MockProviderState {
    inventory: HashMap<String, Vec<PhoneNumber>>,
    polls: HashMap<BackorderId, BackorderPoll>,
    orders: Vec<Vec<PhoneNumber>>,
    backorders: Vec<PlacedBackorder>,
    next_id: u32,
    search_calls: u32,
    check_calls: u32,
    fail_on_search: bool,
    fail_on_order: bool,
    reject_orders: bool,
    fail_on_backorder: bool,
    reject_backorders: bool,
    fail_on_check: bool,
}

/// In-memory provider with scriptable inventory, failure modes, and poll
/// outcomes.
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: &'static str,
    state: Arc<RwLock<MockProviderState>>,
}

impl MockProvider {
    /// Creates a mock provider that answers to the given name.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(RwLock::new(MockProviderState::default())),
        }
    }

    /// Scripts the purchasable numbers for an area code.
    pub fn set_inventory(&self, area_code: &AreaCode, numbers: Vec<PhoneNumber>) {
        self.state
            .write()
            .unwrap()
            .inventory
            .insert(area_code.as_str().to_string(), numbers);
    }

    /// Scripts the outcome of the next status polls for a backorder.
    pub fn set_poll_result(&self, backorder_id: BackorderId, poll: BackorderPoll) {
        self.state.write().unwrap().polls.insert(backorder_id, poll);
    }

    /// Configures search calls to fail with a transport-class error.
    pub fn set_fail_on_search(&self, fail: bool) {
        self.state.write().unwrap().fail_on_search = fail;
    }

    /// Configures order calls to fail with a transport-class error.
    pub fn set_fail_on_order(&self, fail: bool) {
        self.state.write().unwrap().fail_on_order = fail;
    }

    /// Configures order calls to be refused by the carrier.
    pub fn set_reject_orders(&self, reject: bool) {
        self.state.write().unwrap().reject_orders = reject;
    }

    /// Configures backorder placement to fail with a transport-class error.
    pub fn set_fail_on_backorder(&self, fail: bool) {
        self.state.write().unwrap().fail_on_backorder = fail;
    }

    /// Configures backorder placement to be refused by the carrier.
    pub fn set_reject_backorders(&self, reject: bool) {
        self.state.write().unwrap().reject_backorders = reject;
    }

    /// Configures status polls to fail with a transport-class error.
    pub fn set_fail_on_check(&self, fail: bool) {
        self.state.write().unwrap().fail_on_check = fail;
    }

    /// Returns the numbers ordered so far, one entry per order call.
    pub fn orders(&self) -> Vec<Vec<PhoneNumber>> {
        self.state.read().unwrap().orders.clone()
    }

    /// Returns the backorders placed so far.
    pub fn placed_backorders(&self) -> Vec<PlacedBackorder> {
        self.state.read().unwrap().backorders.clone()
    }

    /// Number of search calls made against this provider.
    pub fn search_call_count(&self) -> u32 {
        self.state.read().unwrap().search_calls
    }

    /// Number of status polls made against this provider.
    pub fn check_call_count(&self) -> u32 {
        self.state.read().unwrap().check_calls
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn search(
        &self,
        _country: Country,
        area_code: &AreaCode,
        quantity: i32,
    ) -> Result<SearchResult, ProviderError> {
        let mut state = self.state.write().unwrap();
        state.search_calls += 1;

        if state.fail_on_search {
            return Err(ProviderError::Unavailable {
                provider: self.name.to_string(),
                reason: "scripted search failure".to_string(),
            });
        }

        let candidates = state
            .inventory
            .get(area_code.as_str())
            .map(|numbers| {
                numbers
                    .iter()
                    .take(quantity.max(0) as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(SearchResult { candidates })
    }

    async fn order(&self, numbers: &[PhoneNumber]) -> Result<OrderConfirmation, ProviderError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_order {
            return Err(ProviderError::Unavailable {
                provider: self.name.to_string(),
                reason: "scripted order failure".to_string(),
            });
        }
        if state.reject_orders {
            return Err(ProviderError::OrderRejected {
                provider: self.name.to_string(),
                reason: "scripted order rejection".to_string(),
            });
        }

        state.next_id += 1;
        let order_id = OrderId::new(format!("ORD-{:04}", state.next_id));
        state.orders.push(numbers.to_vec());
        Ok(OrderConfirmation {
            order_id,
            numbers: numbers.to_vec(),
        })
    }

    async fn place_backorder(
        &self,
        _country: Country,
        area_code: &AreaCode,
        quantity: i32,
        reference: &str,
    ) -> Result<BackorderId, ProviderError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_backorder {
            return Err(ProviderError::Unavailable {
                provider: self.name.to_string(),
                reason: "scripted backorder failure".to_string(),
            });
        }
        if state.reject_backorders {
            return Err(ProviderError::BackorderRejected {
                provider: self.name.to_string(),
                reason: "scripted backorder rejection".to_string(),
            });
        }

        state.next_id += 1;
        let backorder_id = BackorderId::new(format!("BO-{:04}", state.next_id));
        state.backorders.push(PlacedBackorder {
            area_code: area_code.clone(),
            quantity,
            reference: reference.to_string(),
        });
        Ok(backorder_id)
    }

    async fn check_status(
        &self,
        backorder_id: &BackorderId,
    ) -> Result<BackorderPoll, ProviderError> {
        let mut state = self.state.write().unwrap();
        state.check_calls += 1;

        if state.fail_on_check {
            return Err(ProviderError::Unavailable {
                provider: self.name.to_string(),
                reason: "scripted status failure".to_string(),
            });
        }

        Ok(state
            .polls
            .get(backorder_id)
            .cloned()
            .unwrap_or(BackorderPoll::Pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(count: usize) -> Vec<PhoneNumber> {
        (0..count)
            .map(|i| PhoneNumber::parse(&format!("+1934555{:04}", 100 + i)).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_search_serves_scripted_inventory() {
        let provider = MockProvider::new("primary");
        let area = AreaCode::parse("934").unwrap();
        provider.set_inventory(&area, numbers(12));

        let result = provider.search(Country::Us, &area, 10).await.unwrap();
        assert_eq!(result.available_count(), 10);
        assert_eq!(result.candidates, numbers(12)[..10].to_vec());
        assert_eq!(provider.search_call_count(), 1);

        let other = AreaCode::parse("555").unwrap();
        let empty = provider.search(Country::Us, &other, 5).await.unwrap();
        assert_eq!(empty.available_count(), 0);
    }

    #[tokio::test]
    async fn test_order_rejection_and_failure_modes() {
        let provider = MockProvider::new("primary");

        provider.set_reject_orders(true);
        let rejected = provider.order(&numbers(2)).await;
        assert!(matches!(rejected, Err(ProviderError::OrderRejected { .. })));

        provider.set_reject_orders(false);
        provider.set_fail_on_order(true);
        let failed = provider.order(&numbers(2)).await;
        assert!(matches!(failed, Err(ProviderError::Unavailable { .. })));

        provider.set_fail_on_order(false);
        let confirmed = provider.order(&numbers(2)).await.unwrap();
        assert_eq!(confirmed.order_id.as_str(), "ORD-0001");
        assert_eq!(provider.orders(), vec![numbers(2)]);
    }

    #[tokio::test]
    async fn test_backorders_record_placement() {
        let provider = MockProvider::new("fallback");
        let area = AreaCode::parse("555").unwrap();

        let id = provider
            .place_backorder(Country::Us, &area, 5, "req-1")
            .await
            .unwrap();
        assert_eq!(id.as_str(), "BO-0001");
        assert_eq!(
            provider.placed_backorders(),
            vec![PlacedBackorder {
                area_code: area.clone(),
                quantity: 5,
                reference: "req-1".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_poll_defaults_to_pending() {
        let provider = MockProvider::new("fallback");
        let id = BackorderId::new("BO-0001");

        assert_eq!(
            provider.check_status(&id).await.unwrap(),
            BackorderPoll::Pending
        );

        provider.set_poll_result(
            id.clone(),
            BackorderPoll::Completed {
                numbers: numbers(3),
            },
        );
        assert_eq!(
            provider.check_status(&id).await.unwrap(),
            BackorderPoll::Completed {
                numbers: numbers(3)
            }
        );
        assert_eq!(provider.check_call_count(), 2);
    }
}
