//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use inventory_store::{Catalog, Ledger};
use serde::Serialize;

use crate::routes::orders::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
    pub ledger_failure_policy: &'static str,
}

/// GET /health: returns service health and storage backend.
pub async fn check<C, L>(State(state): State<Arc<AppState<C, L>>>) -> Json<HealthResponse>
where
    C: Catalog + Clone + 'static,
    L: Ledger + 'static,
{
    Json(HealthResponse {
        status: "ok",
        storage: state.storage,
        ledger_failure_policy: state.reconciler.options().ledger_failure_policy.as_str(),
    })
}
