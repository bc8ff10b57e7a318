//! Job management CLI commands.

use clap::{Args, Subcommand};

use ironrelay_core::config::AppConfig;
use ironrelay_core::error::AppError;
use ironrelay_core::types::JobId;
use ironrelay_entity::job::JobStatus;

use crate::output::{self, JobRow, OutputFormat};

/// Arguments for job commands
#[derive(Debug, Args)]
pub struct JobsArgs {
    /// Job subcommand
    #[command(subcommand)]
    pub command: JobsCommand,
}

/// Job subcommands
#[derive(Debug, Subcommand)]
pub enum JobsCommand {
    /// List jobs, most urgent first
    List {
        /// Only jobs in this status
        #[arg(short, long)]
        status: Option<JobStatus>,
        /// Maximum rows
        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },
    /// Reset failed jobs to pending with a fresh attempt budget
    RetryFailed {
        /// Only these jobs (default: every failed job)
        ids: Vec<JobId>,
    },
    /// Cancel a pending job
    Cancel {
        /// Job id
        id: JobId,
    },
}

/// Execute job commands
pub async fn execute(
    args: &JobsArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let queue = super::job_queue(config).await?;

    match &args.command {
        JobsCommand::List { status, limit } => {
            let jobs = queue.list(*status, *limit).await?;
            match format {
                OutputFormat::Json => output::print_json(&jobs),
                OutputFormat::Table => {
                    let rows: Vec<JobRow> = jobs.iter().map(JobRow::from).collect();
                    output::print_list(&rows, format);
                }
            }
        }
        JobsCommand::RetryFailed { ids } => {
            let ids = (!ids.is_empty()).then_some(ids.as_slice());
            let count = queue.retry_failed(ids).await?;
            output::print_success(&format!("{count} failed job(s) reset to pending"));
        }
        JobsCommand::Cancel { id } => {
            queue.cancel(*id).await?;
            output::print_success(&format!("Job {id} cancelled"));
        }
    }

    queue.stores().close().await;
    Ok(())
}
