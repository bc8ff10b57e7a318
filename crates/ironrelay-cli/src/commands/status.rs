//! Queue status command.

use ironrelay_core::config::AppConfig;
use ironrelay_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Print job and delivery counters
pub async fn execute(config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let stores = super::connect(config).await?;
    let stats = stores.stats().await?;
    stores.close().await;

    match format {
        OutputFormat::Json => output::print_json(&stats),
        OutputFormat::Table => {
            println!("Jobs:");
            output::print_kv("Pending", &stats.pending_jobs.to_string());
            output::print_kv("Running", &stats.running_jobs.to_string());
            output::print_kv("Success", &stats.success_jobs.to_string());
            output::print_kv("Failed", &stats.failed_jobs.to_string());
            output::print_kv("Cancelled", &stats.cancelled_jobs.to_string());
            output::print_kv("Total", &stats.total_jobs.to_string());
            println!("Webhook deliveries:");
            output::print_kv("Pending", &stats.pending_deliveries.to_string());
            output::print_kv("Sending", &stats.sending_deliveries.to_string());
            output::print_kv("Success", &stats.success_deliveries.to_string());
            output::print_kv("Failed", &stats.failed_deliveries.to_string());
            output::print_kv("Total", &stats.total_deliveries.to_string());
            println!("Incoming webhooks:");
            output::print_kv("Total", &stats.total_incoming.to_string());
        }
    }
    Ok(())
}
