//! API server entry point.

use std::sync::Arc;

use api::AppState;
use backorder_store::{PostgresBackorderStore, PostgresLockManager};
use engine::{AcquisitionEngine, LoggingCallback, Reconciler};
use inventory::HttpInventoryPublisher;
use provider::{InteliquentClient, PlivoClient, ProviderClient};
use sqlx::postgres::PgPoolOptions;
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

#[tokio::main]
async fn main() {
    // 1. Load configuration
    let config = api::Config::from_env();

    // 2. Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // 3. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Connect to Postgres and run migrations
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    let store = PostgresBackorderStore::new(pool.clone());
    store.run_migrations().await.expect("migrations failed");
    let locks = PostgresLockManager::new(pool);

    // 5. Wire providers, inventory, engine, and reconciler
    let providers: Vec<Arc<dyn ProviderClient>> = vec![
        Arc::new(PlivoClient::new(config.plivo.clone())),
        Arc::new(InteliquentClient::new(config.inteliquent.clone())),
    ];
    let publisher = HttpInventoryPublisher::new(config.inventory.clone());

    let engine = AcquisitionEngine::new(
        store.clone(),
        locks.clone(),
        publisher.clone(),
        providers.clone(),
        config.engine_config(),
    );
    let reconciler = Reconciler::new(
        store.clone(),
        locks.clone(),
        publisher,
        providers,
        LoggingCallback,
        config.reconciler_config(),
    );

    // 6. Start the reconciliation loop
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let reconciler_task = tokio::spawn(async move { reconciler.run(shutdown_rx).await });

    // 7. Build the application
    let state = Arc::new(AppState { engine, store });
    let app = api::create_app(state, metrics_handle);

    // 8. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 9. Stop the reconciler and wait for the cycle in flight
    let _ = shutdown_tx.send(true);
    let _ = reconciler_task.await;

    tracing::info!("server shut down gracefully");
}
