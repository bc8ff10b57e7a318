//! Outbound webhook CLI commands.

use clap::{Args, Subcommand};

use ironrelay_core::config::AppConfig;
use ironrelay_core::error::AppError;
use ironrelay_worker::jobs::WebhookSender;

use crate::output::{self, OutputFormat};

/// Arguments for webhook commands
#[derive(Debug, Args)]
pub struct WebhookArgs {
    /// Webhook subcommand
    #[command(subcommand)]
    pub command: WebhookCommand,
}

/// Webhook subcommands
#[derive(Debug, Subcommand)]
pub enum WebhookCommand {
    /// Queue a webhook delivery
    Send {
        /// Event name, sent in the event header
        event: String,
        /// Target URL
        url: String,
        /// JSON payload
        #[arg(short, long, default_value = "{}")]
        payload: String,
        /// Attempt budget (default: webhook.default_max_attempts)
        #[arg(short, long)]
        max_attempts: Option<i32>,
    },
}

/// Execute webhook commands
pub async fn execute(
    args: &WebhookArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        WebhookCommand::Send {
            event,
            url,
            payload,
            max_attempts,
        } => {
            let payload: serde_json::Value = serde_json::from_str(payload)
                .map_err(|e| AppError::validation(format!("Invalid JSON payload: {e}")))?;

            let queue = super::job_queue(config).await?;
            let sender = WebhookSender::new(queue.clone(), &config.webhook);
            let delivery = sender.send(event, url, payload, *max_attempts).await?;
            queue.stores().close().await;

            match format {
                OutputFormat::Json => output::print_json(&delivery),
                OutputFormat::Table => output::print_success(&format!(
                    "Delivery {} queued for '{}' -> {}",
                    delivery.id, delivery.event, delivery.target_url
                )),
            }
        }
    }
    Ok(())
}
