//! HTTP API server with observability for the number acquisition engine.
//!
//! Provides REST endpoints for number requests and backorder inspection,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use backorder_store::{BackorderStore, LockManager};
use inventory::InventoryPublisher;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use routes::requests::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, L, P>(
    state: Arc<AppState<S, L, P>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    S: BackorderStore + Clone + 'static,
    L: LockManager + 'static,
    P: InventoryPublisher + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/requests", post(routes::requests::create::<S, L, P>))
        .route("/backorders/{id}", get(routes::backorders::get::<S, L, P>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
