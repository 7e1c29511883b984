//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use backorder_store::StoreError;
use engine::EngineError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Acquisition engine error.
    Engine(EngineError),
    /// Backorder store error.
    Store(StoreError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Engine(err) => engine_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn engine_error_to_response(err: EngineError) -> (StatusCode, String) {
    match &err {
        EngineError::RequestInFlight(_) => (StatusCode::CONFLICT, err.to_string()),
        EngineError::NoProviderAvailable(_) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        EngineError::Provider(provider_err) if provider_err.is_transient() => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        EngineError::Provider(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        EngineError::Domain(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        EngineError::Store(
            StoreError::DuplicateBackorder { .. }
            | StoreError::DuplicateOrder(_)
            | StoreError::StaleTransition { .. },
        ) => (StatusCode::CONFLICT, err.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match &err {
        StoreError::BackorderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        StoreError::DuplicateBackorder { .. }
        | StoreError::DuplicateOrder(_)
        | StoreError::StaleTransition { .. } => (StatusCode::CONFLICT, err.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
