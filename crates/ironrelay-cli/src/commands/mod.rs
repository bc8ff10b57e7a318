//! CLI command definitions and dispatch.

pub mod jobs;
pub mod migrate;
pub mod status;
pub mod webhook;
pub mod worker;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use ironrelay_core::config::AppConfig;
use ironrelay_core::error::AppError;
use ironrelay_core::traits::{Clock, SystemClock};
use ironrelay_database::Stores;
use ironrelay_worker::JobQueue;

use crate::output::{self, OutputFormat};

/// IronRelay: durable job queue and webhook relay
#[derive(Debug, Parser)]
#[command(name = "ironrelay", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding default.toml and the environment overlays
    #[arg(short, long, default_value = "config")]
    pub config: String,

    /// Environment overlay to apply (config/<env>.toml)
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply database migrations
    Migrate,
    /// Show queue and delivery counters
    Status,
    /// Inspect and manage jobs
    Jobs(jobs::JobsArgs),
    /// Outbound webhooks
    Webhook(webhook::WebhookArgs),
    /// Run background workers
    Worker(worker::WorkerArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = AppConfig::load_from(&self.config, &self.env)?;
        match &self.command {
            Commands::Migrate => migrate::execute(&config).await,
            Commands::Status => status::execute(&config, self.format).await,
            Commands::Jobs(args) => jobs::execute(args, &config, self.format).await,
            Commands::Webhook(args) => webhook::execute(args, &config, self.format).await,
            Commands::Worker(args) => worker::execute(args, &config).await,
        }
    }
}

/// Helper: open the configured stores, warning when they are process-local.
pub async fn connect(config: &AppConfig) -> Result<Stores, AppError> {
    if config.database.is_memory() {
        output::print_warning("Using the in-memory store; nothing outlives this command.");
    }
    Stores::connect(&config.database).await
}

/// Helper: job queue over the configured stores.
pub async fn job_queue(config: &AppConfig) -> Result<JobQueue, AppError> {
    let stores = connect(config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    Ok(JobQueue::new(
        stores,
        clock,
        config.worker.default_max_attempts,
    ))
}
