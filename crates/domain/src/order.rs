//! Immediately fulfilled orders.

use chrono::{DateTime, Utc};
use common::{OrderId, PhoneNumber, RequestId};
use serde::{Deserialize, Serialize};

/// Record of an order the carrier fulfilled immediately.
///
/// Terminal on creation; there is no further lifecycle. Persisted so a
/// redelivered request can be answered with the original numbers instead of
/// ordering again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub request_id: RequestId,
    /// Name of the provider that fulfilled the order.
    pub provider: String,
    pub numbers: Vec<PhoneNumber>,
    pub placed_at: DateTime<Utc>,
}

impl OrderRecord {
    pub fn new(
        order_id: OrderId,
        request_id: RequestId,
        provider: impl Into<String>,
        numbers: Vec<PhoneNumber>,
    ) -> Self {
        Self {
            order_id,
            request_id,
            provider: provider.into(),
            numbers,
            placed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_record_carries_numbers_in_given_order() {
        let numbers = vec![
            PhoneNumber::parse("+19345550142").unwrap(),
            PhoneNumber::parse("+19345550143").unwrap(),
        ];
        let record = OrderRecord::new(
            OrderId::new("ord-1"),
            RequestId::new(),
            "plivo",
            numbers.clone(),
        );
        assert_eq!(record.numbers, numbers);
        assert_eq!(record.provider, "plivo");
    }
}
