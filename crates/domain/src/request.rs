//! Inbound number requests.

use common::{AreaCode, Country, RequestId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// A structured request for telephone numbers, produced by the ticket
/// ingestion collaborator.
///
/// Immutable once created; every downstream record references it by
/// `request_id`. Redelivery of the same request carries the same ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberRequest {
    pub request_id: RequestId,
    pub country: Country,
    pub area_code: AreaCode,
    pub quantity: i32,
    /// E-mail of the requesting user; forwarded to inventory publication.
    pub requested_by: String,
}

impl NumberRequest {
    /// Creates a request with a fresh ID.
    pub fn new(
        country: Country,
        area_code: AreaCode,
        quantity: i32,
        requested_by: impl Into<String>,
    ) -> Result<Self> {
        Self::with_id(RequestId::new(), country, area_code, quantity, requested_by)
    }

    /// Creates a request with a caller-supplied ID (redelivery keeps the ID).
    pub fn with_id(
        request_id: RequestId,
        country: Country,
        area_code: AreaCode,
        quantity: i32,
        requested_by: impl Into<String>,
    ) -> Result<Self> {
        if quantity <= 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        Ok(Self {
            request_id,
            country,
            area_code,
            quantity,
            requested_by: requested_by.into(),
        })
    }
}
