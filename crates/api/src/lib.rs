//! HTTP API server for stock reconciliation.
//!
//! Exposes the reconciliation entry points used by the checkout success
//! page and by payment processor webhooks, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use inventory_store::{Catalog, Ledger};
use metrics_exporter_prometheus::PrometheusHandle;
use reconciliation::{ReconcileOptions, Reconciler};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<C, L>(state: Arc<AppState<C, L>>, metrics_handle: PrometheusHandle) -> Router
where
    C: Catalog + Clone + 'static,
    L: Ledger + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<C, L>))
        .route(
            "/orders/{id}/reconcile",
            post(routes::orders::reconcile::<C, L>),
        )
        .route(
            "/orders/{id}/reconciliation",
            get(routes::orders::status::<C, L>),
        )
        .route(
            "/webhooks/checkout-completed",
            post(routes::webhooks::checkout_completed::<C, L>),
        )
        .route("/products/{id}", get(routes::products::get::<C, L>))
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

/// Creates the application state around a catalog and ledger.
///
/// `storage` names the backend for the health check.
pub fn create_default_state<C, L>(
    catalog: C,
    ledger: L,
    options: ReconcileOptions,
    storage: &'static str,
) -> Arc<AppState<C, L>>
where
    C: Catalog + Clone + 'static,
    L: Ledger + Clone + 'static,
{
    let reconciler = Reconciler::with_options(catalog.clone(), ledger.clone(), options);

    Arc::new(AppState {
        reconciler,
        catalog,
        ledger,
        storage,
    })
}
