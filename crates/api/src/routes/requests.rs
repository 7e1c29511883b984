//! Number request intake endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use backorder_store::{BackorderStore, LockManager};
use common::{AreaCode, Country, RequestId};
use domain::NumberRequest;
use engine::{AcquireOutcome, AcquisitionEngine};
use inventory::InventoryPublisher;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S, L, P>
where
    S: BackorderStore,
    L: LockManager,
    P: InventoryPublisher,
{
    pub engine: AcquisitionEngine<S, L, P>,
    pub store: S,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateRequestBody {
    /// Caller-supplied UUID; redelivering the same ID returns the
    /// recorded outcome instead of ordering again.
    pub request_id: Option<String>,
    /// ISO country code, `US` or `CA` (default: `US`).
    pub country: Option<String>,
    pub area_code: String,
    pub quantity: i32,
    pub requested_by: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct FulfilledResponse {
    pub request_id: String,
    pub outcome: &'static str,
    pub order_id: String,
    pub provider: String,
    pub numbers: Vec<String>,
    pub published: bool,
}

#[derive(Serialize)]
pub struct BackorderPlacedResponse {
    pub request_id: String,
    pub outcome: &'static str,
    pub backorder_id: String,
    pub provider: String,
    pub status: String,
    pub quantity_requested: i32,
}

// -- Handlers --

/// POST /requests — acquire numbers now or place a backorder.
#[tracing::instrument(skip(state, body))]
pub async fn create<S, L, P>(
    State(state): State<Arc<AppState<S, L, P>>>,
    Json(body): Json<CreateRequestBody>,
) -> Result<Response, ApiError>
where
    S: BackorderStore + Clone + 'static,
    L: LockManager + 'static,
    P: InventoryPublisher + 'static,
{
    let request = parse_request(&body)?;

    match state.engine.acquire(&request).await? {
        AcquireOutcome::Fulfilled { order, published } => {
            let response = FulfilledResponse {
                request_id: request.request_id.to_string(),
                outcome: "fulfilled",
                order_id: order.order_id.to_string(),
                provider: order.provider,
                numbers: order.numbers.iter().map(|n| n.to_string()).collect(),
                published,
            };
            Ok((StatusCode::CREATED, Json(response)).into_response())
        }
        AcquireOutcome::BackorderPlaced { backorder } => {
            let response = BackorderPlacedResponse {
                request_id: request.request_id.to_string(),
                outcome: "backordered",
                backorder_id: backorder.backorder_id.to_string(),
                provider: backorder.provider,
                status: backorder.status.to_string(),
                quantity_requested: backorder.quantity_requested,
            };
            Ok((StatusCode::ACCEPTED, Json(response)).into_response())
        }
    }
}

fn parse_request(body: &CreateRequestBody) -> Result<NumberRequest, ApiError> {
    let country = match &body.country {
        Some(raw) => raw
            .parse::<Country>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => Country::Us,
    };
    let area_code = body
        .area_code
        .parse::<AreaCode>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let result = match &body.request_id {
        Some(raw) => {
            let uuid = uuid::Uuid::parse_str(raw)
                .map_err(|e| ApiError::BadRequest(format!("Invalid request_id: {e}")))?;
            NumberRequest::with_id(
                RequestId::from_uuid(uuid),
                country,
                area_code,
                body.quantity,
                body.requested_by.as_str(),
            )
        }
        None => NumberRequest::new(country, area_code, body.quantity, body.requested_by.as_str()),
    };
    result.map_err(|e| ApiError::BadRequest(e.to_string()))
}
