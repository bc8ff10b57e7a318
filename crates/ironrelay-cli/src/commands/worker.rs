//! Worker CLI commands.

use std::sync::Arc;

use clap::{Args, Subcommand};

use ironrelay_core::config::AppConfig;
use ironrelay_core::error::AppError;
use ironrelay_core::traits::{Clock, SystemClock};
use ironrelay_worker::jobs::register_builtin_jobs;
use ironrelay_worker::{JobRegistry, WorkerPool, WorkerRunner};

use crate::output;

/// Arguments for worker commands
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Worker subcommand
    #[command(subcommand)]
    pub command: WorkerCommand,
}

/// Worker subcommands
#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    /// Run workers until Ctrl+C
    Run {
        /// Number of concurrent workers (default: worker.concurrency)
        #[arg(short = 'n', long)]
        concurrency: Option<usize>,
        /// Process every eligible job once, then exit
        #[arg(long)]
        drain: bool,
    },
}

/// Execute worker commands
pub async fn execute(args: &WorkerArgs, config: &AppConfig) -> Result<(), AppError> {
    match &args.command {
        WorkerCommand::Run { concurrency, drain } => {
            let stores = super::connect(config).await?;
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);

            let mut registry = JobRegistry::new();
            register_builtin_jobs(&mut registry, &stores, Arc::clone(&clock), &config.webhook)?;
            let registry = Arc::new(registry);

            let mut worker_config = config.worker.clone();
            if let Some(n) = concurrency {
                worker_config.concurrency = *n;
            }

            if *drain {
                let runner = WorkerRunner::new(
                    format!("{}-drain", worker_config.id_prefix),
                    Arc::clone(&stores.jobs),
                    registry,
                    clock,
                    &worker_config,
                );
                let mut processed = 0u64;
                while runner.run_once().await?.is_some() {
                    processed += 1;
                }
                output::print_success(&format!("Processed {processed} job(s)"));
            } else {
                let pool = WorkerPool::spawn(&worker_config, Arc::clone(&stores.jobs), registry, clock);
                println!("Workers running: {}", pool.worker_ids().join(", "));
                tokio::signal::ctrl_c().await.map_err(|e| {
                    AppError::internal(format!("Failed to listen for Ctrl+C: {e}"))
                })?;
                pool.shutdown().await;
            }

            stores.close().await;
            Ok(())
        }
    }
}
