//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory_store::StoreError;
use reconciliation::ReconcileError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Order-level reconciliation error.
    Reconcile(ReconcileError),
    /// Catalog or ledger error outside a reconciliation pass.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Reconcile(err) => reconcile_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn reconcile_error_to_response(err: ReconcileError) -> (StatusCode, String) {
    match &err {
        ReconcileError::EmptyOrder(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        ReconcileError::InProgress(_) => (StatusCode::CONFLICT, err.to_string()),
        ReconcileError::LedgerUnavailable { .. } => {
            tracing::error!(error = %err, "ledger unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match &err {
        StoreError::ProductNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        StoreError::Unavailable(_) | StoreError::Database(_) => {
            tracing::error!(error = %err, "store error");
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        _ => {
            tracing::error!(error = %err, "internal server error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        ApiError::Reconcile(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
