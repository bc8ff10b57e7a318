//! IronRelay server: durable job queue and webhook relay.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

use ironrelay_api::AppState;
use ironrelay_core::config::AppConfig;
use ironrelay_core::error::AppError;
use ironrelay_core::traits::{Clock, SystemClock};
use ironrelay_database::Stores;
use ironrelay_worker::jobs::register_builtin_jobs;
use ironrelay_worker::{JobQueue, JobRegistry, WorkerPool};

#[tokio::main]
async fn main() {
    let env = std::env::var("IRONRELAY_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
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
    tracing::info!("Starting IronRelay v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Stores ───────────────────────────────────────────
    let stores = Stores::connect(&config.database).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // ── Step 2: Job registry ─────────────────────────────────────
    let mut registry = JobRegistry::new();
    register_builtin_jobs(&mut registry, &stores, Arc::clone(&clock), &config.webhook)?;
    let registry = Arc::new(registry);

    // ── Step 3: Workers ──────────────────────────────────────────
    let workers = if config.worker.enabled {
        Some(WorkerPool::spawn(
            &config.worker,
            Arc::clone(&stores.jobs),
            Arc::clone(&registry),
            Arc::clone(&clock),
        ))
    } else {
        tracing::info!("Worker disabled; serving API only");
        None
    };

    // ── Step 4: HTTP server ──────────────────────────────────────
    let queue = JobQueue::new(stores.clone(), clock, config.worker.default_max_attempts);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let state = AppState::new(Arc::new(config), queue);
    let served = ironrelay_api::serve(state, shutdown_signal()).await;

    // ── Step 5: Drain workers ────────────────────────────────────
    if let Some(pool) = workers {
        if tokio::time::timeout(grace, pool.shutdown()).await.is_err() {
            tracing::warn!(
                grace_seconds = grace.as_secs(),
                "Workers did not stop within the grace period"
            );
        }
    }
    stores.close().await;
    tracing::info!("IronRelay stopped");

    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
