//! Order reconciliation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Order, OrderId, PurchasedLineItem};
use inventory_store::{AppliedLine, Catalog, Ledger};
use reconciliation::{Outcome, ReconciliationResult, Reconciler};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<C: Catalog, L: Ledger> {
    pub reconciler: Reconciler<C, L>,
    pub catalog: C,
    pub ledger: L,
    /// Name of the storage backend, reported by the health check.
    pub storage: &'static str,
}

// -- Request types --

#[derive(Deserialize)]
pub struct ReconcileRequest {
    pub items: Vec<PurchasedLineItem>,
    pub completed_at: Option<DateTime<Utc>>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ReconcileResponse {
    pub summary: String,
    #[serde(flatten)]
    pub result: ReconciliationResult,
}

#[derive(Serialize)]
pub struct ReconciliationStatusResponse {
    pub order_id: String,
    pub marked: bool,
    pub applied_lines: Vec<AppliedLine>,
}

// -- Handlers --

/// POST /orders/:id/reconcile: apply stock decrements for a completed order.
///
/// Called by the checkout success page and by manual retries.
#[tracing::instrument(skip(state, req))]
pub async fn reconcile<C, L>(
    State(state): State<Arc<AppState<C, L>>>,
    Path(id): Path<String>,
    Json(req): Json<ReconcileRequest>,
) -> Result<(StatusCode, Json<ReconcileResponse>), ApiError>
where
    C: Catalog + Clone + 'static,
    L: Ledger + 'static,
{
    let order = build_order(&id, req.items, req.completed_at)?;
    run_reconciliation(&state, &order).await
}

/// GET /orders/:id/reconciliation: ledger status for an order.
#[tracing::instrument(skip(state))]
pub async fn status<C, L>(
    State(state): State<Arc<AppState<C, L>>>,
    Path(id): Path<String>,
) -> Result<Json<ReconciliationStatusResponse>, ApiError>
where
    C: Catalog + Clone + 'static,
    L: Ledger + 'static,
{
    let order_id = parse_order_id(&id)?;
    let marked = state.ledger.is_marked(&order_id).await?;
    let applied_lines = state.ledger.applied_lines(&order_id).await?;

    Ok(Json(ReconciliationStatusResponse {
        order_id: order_id.to_string(),
        marked,
        applied_lines,
    }))
}

/// Runs a reconciliation pass and maps its outcome to a status code.
///
/// `200` on success, `207` on partial failure, `422` when nothing applied.
pub(crate) async fn run_reconciliation<C, L>(
    state: &AppState<C, L>,
    order: &Order,
) -> Result<(StatusCode, Json<ReconcileResponse>), ApiError>
where
    C: Catalog + Clone,
    L: Ledger,
{
    tracing::debug!(completed_at = %order.completed_at, "reconciling completed order");
    let result = state.reconciler.reconcile_order(order).await?;

    let status = match result.outcome {
        Outcome::Success => StatusCode::OK,
        Outcome::PartialFailure => StatusCode::MULTI_STATUS,
        Outcome::TotalFailure => StatusCode::UNPROCESSABLE_ENTITY,
    };

    Ok((
        status,
        Json(ReconcileResponse {
            summary: result.summary(),
            result,
        }),
    ))
}

pub(crate) fn build_order(
    id: &str,
    items: Vec<PurchasedLineItem>,
    completed_at: Option<DateTime<Utc>>,
) -> Result<Order, ApiError> {
    let order = Order::new(parse_order_id(id)?, items);
    Ok(match completed_at {
        Some(ts) => order.completed_at(ts),
        None => order,
    })
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::BadRequest("Order ID must not be empty".to_string()));
    }
    Ok(OrderId::new(id))
}
