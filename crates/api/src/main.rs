//! API server entry point.

use api::config::Config;
use inventory_store::{Catalog, InMemoryCatalog, InMemoryLedger, Ledger, PostgresStore};
use metrics_exporter_prometheus::PrometheusHandle;
use reconciliation::ReconcileOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Binds the listener and serves the app until a shutdown signal arrives.
async fn serve<C, L>(
    addr: &str,
    catalog: C,
    ledger: L,
    options: ReconcileOptions,
    storage: &'static str,
    metrics_handle: PrometheusHandle,
) where
    C: Catalog + Clone + 'static,
    L: Ledger + Clone + 'static,
{
    let state = api::create_default_state(catalog, ledger, options, storage);
    let app = api::create_app(state, metrics_handle);

    tracing::info!(%addr, storage, "starting API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let options = config.reconcile_options();
    tracing::info!(
        policy = %options.ledger_failure_policy,
        lease_secs = config.claim_lease_secs,
        "reconciliation options loaded"
    );

    // 3. Pick storage and start serving
    let addr = config.addr();
    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url)
                .await
                .expect("failed to connect to database");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            serve(
                &addr,
                store.clone(),
                store,
                options,
                "postgres",
                metrics_handle,
            )
            .await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            serve(
                &addr,
                InMemoryCatalog::new(),
                InMemoryLedger::new(),
                options,
                "memory",
                metrics_handle,
            )
            .await;
        }
    }

    tracing::info!("server shut down gracefully");
}
