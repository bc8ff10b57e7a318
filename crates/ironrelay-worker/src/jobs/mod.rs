//! Built-in job handler implementations.

pub mod incoming;
pub mod webhook;

use std::sync::Arc;

use ironrelay_core::config::WebhookConfig;
use ironrelay_core::error::AppError;
use ironrelay_core::traits::Clock;
use ironrelay_database::Stores;

use crate::registry::JobRegistry;

pub use incoming::{HANDLE_INCOMING_WEBHOOK, IncomingWebhookHandler, handle_incoming_request};
pub use webhook::{DELIVER_WEBHOOK, WebhookDeliveryHandler, WebhookSender};

/// Register the webhook delivery and incoming webhook jobs.
pub fn register_builtin_jobs(
    registry: &mut JobRegistry,
    stores: &Stores,
    clock: Arc<dyn Clock>,
    webhook: &WebhookConfig,
) -> Result<(), AppError> {
    registry.register(
        WebhookDeliveryHandler::new(Arc::clone(&stores.deliveries), clock, webhook)?.into_task(),
    )?;
    registry.register(IncomingWebhookHandler::new(Arc::clone(&stores.incoming)).into_task())?;
    Ok(())
}
