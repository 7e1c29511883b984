//! The carrier provider abstraction.

use async_trait::async_trait;
use common::{AreaCode, BackorderId, Country, OrderId, PhoneNumber};

use crate::error::ProviderError;

/// Numbers a provider can sell right now, in the provider's own ranking.
///
/// Search never reorders candidates; the sequence here is exactly what the
/// carrier returned, capped at the requested quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub candidates: Vec<PhoneNumber>,
}

impl SearchResult {
    /// Number of purchasable candidates found.
    pub fn available_count(&self) -> usize {
        self.candidates.len()
    }

    /// Returns true if the result covers the full requested quantity.
    pub fn can_fill(&self, quantity: i32) -> bool {
        quantity >= 0 && self.candidates.len() >= quantity as usize
    }
}

/// A confirmed immediate order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmation {
    /// Carrier-side order reference where the carrier issues one, otherwise
    /// a locally generated identifier.
    pub order_id: OrderId,
    pub numbers: Vec<PhoneNumber>,
}

/// Outcome of polling a backorder at the carrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackorderPoll {
    /// The carrier is still working the request.
    Pending,
    /// The carrier closed the request and delivered these numbers.
    Completed { numbers: Vec<PhoneNumber> },
    /// The carrier cancelled or rejected the request.
    Failed { reason: String },
}

/// Operations every carrier integration provides.
///
/// Implementations own their authentication and translate transport
/// failures into [`ProviderError`]; a raw HTTP error never crosses this
/// boundary. Implementations hold no state between calls.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Stable provider name, used in stored rows and logs.
    fn name(&self) -> &'static str;

    /// Searches purchasable numbers matching the area code, returning up to
    /// `quantity` candidates in carrier ranking order.
    async fn search(
        &self,
        country: Country,
        area_code: &AreaCode,
        quantity: i32,
    ) -> Result<SearchResult, ProviderError>;

    /// Purchases the given numbers as one logical order. Any refused number
    /// fails the whole order.
    async fn order(&self, numbers: &[PhoneNumber]) -> Result<OrderConfirmation, ProviderError>;

    /// Asks the carrier to deliver `quantity` numbers later, returning the
    /// carrier's backorder identifier.
    async fn place_backorder(
        &self,
        country: Country,
        area_code: &AreaCode,
        quantity: i32,
        reference: &str,
    ) -> Result<BackorderId, ProviderError>;

    /// Polls the current state of a previously placed backorder.
    async fn check_status(
        &self,
        backorder_id: &BackorderId,
    ) -> Result<BackorderPoll, ProviderError>;
}
