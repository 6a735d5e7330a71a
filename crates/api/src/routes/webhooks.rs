//! Payment processor webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::PurchasedLineItem;
use inventory_store::{Catalog, Ledger};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::orders::{AppState, ReconcileResponse, build_order, run_reconciliation};

/// Payment processor that confirmed the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Stripe,
    MercadoPago,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Stripe => "stripe",
            Provider::MercadoPago => "mercado_pago",
        }
    }
}

/// Checkout completion notification, already normalized from the
/// processor's own payload.
#[derive(Deserialize)]
pub struct CheckoutCompletedRequest {
    pub provider: Provider,
    pub order_id: String,
    pub items: Vec<PurchasedLineItem>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// POST /webhooks/checkout-completed: reconcile stock for a paid checkout.
#[tracing::instrument(skip(state, req), fields(provider = req.provider.as_str(), order_id = %req.order_id))]
pub async fn checkout_completed<C, L>(
    State(state): State<Arc<AppState<C, L>>>,
    Json(req): Json<CheckoutCompletedRequest>,
) -> Result<(StatusCode, Json<ReconcileResponse>), ApiError>
where
    C: Catalog + Clone + 'static,
    L: Ledger + 'static,
{
    metrics::counter!("checkout_webhooks_total", "provider" => req.provider.as_str()).increment(1);
    let order = build_order(&req.order_id, req.items, req.completed_at)?;
    run_reconciliation(&state, &order).await
}
