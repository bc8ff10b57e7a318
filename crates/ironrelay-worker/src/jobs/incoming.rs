//! Handling of payloads received on the ingestion endpoint.

use std::sync::Arc;

use async_trait::async_trait;

use ironrelay_core::types::IncomingWebhookId;
use ironrelay_database::IncomingWebhookStore;
use ironrelay_entity::job::JobPayload;
use ironrelay_entity::webhook::IncomingStatus;

use crate::queue::JobRequest;
use crate::registry::{JobExecutionError, JobHandler, Task, arg, kwarg};

/// Registered name of the incoming webhook job.
pub const HANDLE_INCOMING_WEBHOOK: &str = concat!(module_path!(), "::handle_incoming_webhook");

/// Build the request for handling one inbound payload.
///
/// Positional args are the event name and the body; the log record id is
/// passed as the `incoming_id` keyword.
pub fn handle_incoming_request(
    incoming_id: IncomingWebhookId,
    event: &str,
    body: serde_json::Value,
) -> JobRequest {
    JobRequest::new(HANDLE_INCOMING_WEBHOOK)
        .arg(event)
        .arg(body)
        .kwarg("incoming_id", incoming_id.to_string())
}

/// Logs the event and marks the record handled.
#[derive(Debug)]
pub struct IncomingWebhookHandler {
    incoming: Arc<dyn IncomingWebhookStore>,
}

impl IncomingWebhookHandler {
    pub fn new(incoming: Arc<dyn IncomingWebhookStore>) -> Self {
        Self { incoming }
    }

    pub fn into_task(self) -> Task {
        Task::new(HANDLE_INCOMING_WEBHOOK, Arc::new(self))
    }
}

#[async_trait]
impl JobHandler for IncomingWebhookHandler {
    async fn execute(&self, payload: &JobPayload) -> Result<(), JobExecutionError> {
        let event: String = arg(payload, 0)?;
        let raw: String = kwarg(payload, "incoming_id")?;
        let id: IncomingWebhookId = raw
            .parse()
            .map_err(|e| JobExecutionError::handler(format!("Invalid incoming id '{raw}': {e}")))?;

        tracing::info!(incoming.id = %id, event = %event, "Handling incoming webhook");
        self.incoming.mark_status(id, IncomingStatus::Handled).await?;
        Ok(())
    }
}
