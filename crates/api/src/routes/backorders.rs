//! Backorder inspection endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use backorder_store::{BackorderStore, LockManager};
use common::BackorderId;
use domain::Backorder;
use inventory::InventoryPublisher;
use serde::Serialize;

use crate::error::ApiError;
use crate::routes::requests::AppState;

#[derive(Serialize)]
pub struct BackorderResponse {
    pub backorder_id: String,
    pub request_id: String,
    pub provider: String,
    pub area_code: String,
    pub country: String,
    pub quantity_requested: i32,
    pub status: String,
    pub attempt_count: i32,
    pub created_at: String,
    pub last_checked_at: Option<String>,
    pub numbers: Vec<String>,
}

impl From<Backorder> for BackorderResponse {
    fn from(backorder: Backorder) -> Self {
        Self {
            backorder_id: backorder.backorder_id.to_string(),
            request_id: backorder.request_id.to_string(),
            provider: backorder.provider,
            area_code: backorder.area_code.to_string(),
            country: backorder.country.to_string(),
            quantity_requested: backorder.quantity_requested,
            status: backorder.status.to_string(),
            attempt_count: backorder.attempt_count,
            created_at: backorder.created_at.to_rfc3339(),
            last_checked_at: backorder.last_checked_at.map(|t| t.to_rfc3339()),
            numbers: backorder
                .numbers_completed
                .iter()
                .map(|n| n.to_string())
                .collect(),
        }
    }
}

/// GET /backorders/{id} — load a backorder row by carrier order ID.
#[tracing::instrument(skip(state))]
pub async fn get<S, L, P>(
    State(state): State<Arc<AppState<S, L, P>>>,
    Path(id): Path<String>,
) -> Result<Json<BackorderResponse>, ApiError>
where
    S: BackorderStore + Clone + 'static,
    L: LockManager + 'static,
    P: InventoryPublisher + 'static,
{
    let backorder = state
        .store
        .get_backorder(&BackorderId::new(id.as_str()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Backorder {id} not found")))?;

    Ok(Json(BackorderResponse::from(backorder)))
}
