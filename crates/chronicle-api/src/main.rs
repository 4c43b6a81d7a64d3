//! Chronicle API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use chronicle_api::app;
use chronicle_api::config::AppConfig;
use chronicle_api::error::AppError;
use chronicle_api::state::AppState;
use chronicle_core::cancel::{CancelHandle, CancelSignal};
use chronicle_core::clock::SystemClock;
use chronicle_core::repository::AggregateRepository;
use chronicle_event_store::pg_event_store::PgEventStore;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Chronicle API server");

    let config = AppConfig::from_env()?;

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    let codec = app::build_codec(config.codec)?;
    let store = Arc::new(PgEventStore::new(pool));
    let clock = Arc::new(SystemClock);
    let (shutdown_handle, shutdown) = CancelSignal::pair();

    if config.seed_on_startup {
        let seeder = app::build_seeder(
            store.clone(),
            codec.clone(),
            clock.clone(),
            config.seed_verification,
        );
        app::run_seeders(&seeder, &shutdown)
            .await
            .map_err(AppError::Seeding)?;
    }

    let repository = AggregateRepository::new(store, codec, clock);
    let router = app::build_router(AppState::new(repository, shutdown));

    // Start server.
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown_handle))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C and cancels in-flight store operations.
async fn shutdown_signal(handle: CancelHandle) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
    handle.cancel();
}
