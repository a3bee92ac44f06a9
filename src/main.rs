//! MoveHub notification server.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

use movehub_api::{Stores, build_app, build_state};
use movehub_capture::CaptureBackend;
use movehub_core::config::{AppConfig, DatabaseProvider};
use movehub_core::error::AppError;
use movehub_database::DatabasePool;
use movehub_database::memory::{MemoryDirectory, MemoryNotificationStore, MemorySettingsStore};
use movehub_database::migration::run_migrations;
use movehub_database::repositories::{
    DirectoryRepository, NotificationRepository, SettingsRepository,
};

#[tokio::main]
async fn main() {
    let env = std::env::var("MOVEHUB_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        "Starting MoveHub notification server"
    );

    // ── Step 1: Stores ───────────────────────────────────────────
    let (stores, pool) = match config.database.provider {
        DatabaseProvider::Postgres => {
            let pool = DatabasePool::connect(&config.database).await?;
            if config.database.run_migrations {
                run_migrations(pool.pool()).await?;
            }
            let pg = pool.pool().clone();
            let stores = Stores {
                notifications: Arc::new(NotificationRepository::new(pg.clone())),
                directory: Arc::new(DirectoryRepository::new(pg.clone())),
                settings: Arc::new(SettingsRepository::new(pg.clone())),
                capture: CaptureBackend::Postgres(pg),
            };
            (stores, Some(pool))
        }
        DatabaseProvider::Memory => {
            tracing::warn!("Using in-memory stores; data is lost on restart");
            let directory = MemoryDirectory::new();
            let stores = Stores {
                notifications: Arc::new(MemoryNotificationStore::new()),
                directory: Arc::new(directory.clone()),
                settings: Arc::new(MemorySettingsStore::new()),
                capture: CaptureBackend::Memory(directory),
            };
            (stores, None)
        }
    };

    // ── Step 2: Services, jobs, and scheduler ────────────────────
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_state(config, stores).await?;
    let scheduler = Arc::clone(&state.scheduler);
    scheduler.start().await?;

    // ── Step 3: HTTP server ──────────────────────────────────────
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    tracing::info!(address = %addr, "MoveHub server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    // ── Step 4: Shutdown ─────────────────────────────────────────
    tracing::info!("Stopping scheduler");
    match tokio::time::timeout(grace, scheduler.stop()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Scheduler shutdown failed"),
        Err(_) => tracing::warn!(
            grace_seconds = grace.as_secs(),
            "Scheduler did not stop within the grace period"
        ),
    }
    if let Some(pool) = pool {
        pool.close().await;
    }

    tracing::info!("MoveHub server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
