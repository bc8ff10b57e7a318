//! Outbound webhook delivery.
//!
//! [`WebhookSender`] creates a delivery record and a job pointing at it.
//! [`WebhookDeliveryHandler`] is that job: one POST per attempt, with the
//! outcome written back to the delivery record before the job resolves.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};

use ironrelay_core::config::WebhookConfig;
use ironrelay_core::error::{AppError, ErrorKind};
use ironrelay_core::traits::Clock;
use ironrelay_core::types::DeliveryId;
use ironrelay_database::{DeliveryStore, UnitOfWork};
use ironrelay_entity::job::{JobPayload, NewJob};
use ironrelay_entity::webhook::{DeliveryStatus, NewWebhookDelivery, WebhookDelivery};

use crate::queue::{JobQueue, JobRequest};
use crate::registry::{JobExecutionError, JobHandler, Task, arg};

/// Registered name of the delivery job.
pub const DELIVER_WEBHOOK: &str = concat!(module_path!(), "::deliver_webhook");

/// Creates webhook deliveries and the jobs that send them.
#[derive(Debug, Clone)]
pub struct WebhookSender {
    queue: JobQueue,
    default_max_attempts: i32,
}

impl WebhookSender {
    pub fn new(queue: JobQueue, config: &WebhookConfig) -> Self {
        Self {
            queue,
            default_max_attempts: config.default_max_attempts,
        }
    }

    fn prepare(
        &self,
        event: &str,
        target_url: &str,
        payload: serde_json::Value,
        max_attempts: Option<i32>,
    ) -> Result<(NewWebhookDelivery, NewJob), AppError> {
        let url = reqwest::Url::parse(target_url)
            .map_err(|e| AppError::validation(format!("Invalid target URL '{target_url}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::validation(format!(
                "Target URL must be http or https, got '{}'",
                url.scheme()
            )));
        }

        let max_attempts = max_attempts.unwrap_or(self.default_max_attempts);
        let delivery = NewWebhookDelivery {
            id: DeliveryId::new(),
            event: event.to_string(),
            target_url: target_url.to_string(),
            payload,
            max_attempts,
        };
        let job = self.queue.build(
            JobRequest::new(DELIVER_WEBHOOK)
                .arg(delivery.id.to_string())
                .max_attempts(max_attempts),
        )?;
        Ok((delivery, job))
    }

    /// Create a delivery record and enqueue its job right away.
    pub async fn send(
        &self,
        event: &str,
        target_url: &str,
        payload: serde_json::Value,
        max_attempts: Option<i32>,
    ) -> Result<WebhookDelivery, AppError> {
        let (new, job) = self.prepare(event, target_url, payload, max_attempts)?;
        let delivery = self
            .queue
            .stores()
            .deliveries
            .insert(new, self.queue.clock().now())
            .await?;
        let job = self.queue.enqueue_built(job).await?;

        tracing::info!(
            delivery.id = %delivery.id,
            job.id = %job.id,
            event = %delivery.event,
            "Webhook delivery queued"
        );
        Ok(delivery)
    }

    /// Like [`WebhookSender::send`], but both records are only written
    /// when `uow` commits.
    pub fn send_deferred(
        &self,
        uow: &mut UnitOfWork,
        event: &str,
        target_url: &str,
        payload: serde_json::Value,
        max_attempts: Option<i32>,
    ) -> Result<DeliveryId, AppError> {
        let (new, job) = self.prepare(event, target_url, payload, max_attempts)?;
        let id = new.id;
        let deliveries = Arc::clone(&self.queue.stores().deliveries);
        let clock = Arc::clone(self.queue.clock());
        uow.on_commit(move || {
            async move {
                deliveries.insert(new, clock.now()).await?;
                Ok(())
            }
            .boxed()
        });
        self.queue.defer_built(uow, job);
        Ok(id)
    }
}

/// Job handler that performs one delivery attempt.
#[derive(Debug)]
pub struct WebhookDeliveryHandler {
    deliveries: Arc<dyn DeliveryStore>,
    clock: Arc<dyn Clock>,
    client: reqwest::Client,
    event_header: HeaderName,
    max_body_chars: usize,
}

impl WebhookDeliveryHandler {
    pub fn new(
        deliveries: Arc<dyn DeliveryStore>,
        clock: Arc<dyn Clock>,
        config: &WebhookConfig,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    "Failed to build webhook HTTP client",
                    e,
                )
            })?;
        let event_header = HeaderName::from_bytes(config.event_header.as_bytes()).map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("Invalid webhook event header '{}'", config.event_header),
                e,
            )
        })?;

        Ok(Self {
            deliveries,
            clock,
            client,
            event_header,
            max_body_chars: config.max_response_body_chars,
        })
    }

    /// Wrap the handler as a registrable task.
    pub fn into_task(self) -> Task {
        Task::new(DELIVER_WEBHOOK, Arc::new(self))
    }

    async fn post(&self, delivery: &WebhookDelivery) -> Result<(u16, String), String> {
        let body = serde_json::to_vec(&delivery.payload).map_err(|e| e.to_string())?;
        let event = HeaderValue::from_str(&delivery.event)
            .map_err(|e| format!("Invalid event name '{}': {e}", delivery.event))?;

        let response = self
            .client
            .post(&delivery.target_url)
            .header(CONTENT_TYPE, "application/json")
            .header(self.event_header.clone(), event)
            .body(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let code = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        Ok((code, truncate_chars(&String::from_utf8_lossy(&bytes), self.max_body_chars)))
    }
}

#[async_trait]
impl JobHandler for WebhookDeliveryHandler {
    async fn execute(&self, payload: &JobPayload) -> Result<(), JobExecutionError> {
        let raw: String = arg(payload, 0)?;
        let id: DeliveryId = raw
            .parse()
            .map_err(|e| JobExecutionError::handler(format!("Invalid delivery id '{raw}': {e}")))?;
        let mut delivery = self
            .deliveries
            .find_by_id(id)
            .await?
            .ok_or_else(|| JobExecutionError::handler(format!("Webhook delivery {id} not found")))?;

        delivery.begin_attempt(self.clock.now());
        self.deliveries.save(&delivery).await?;

        let outcome = self.post(&delivery).await;
        let now = self.clock.now();
        let result = match outcome {
            Ok((code, body)) => {
                delivery.record_response(code, body, now);
                match delivery.status {
                    DeliveryStatus::Success => Ok(()),
                    _ => Err(JobExecutionError::handler(delivery.last_error.clone())),
                }
            }
            Err(message) => {
                delivery.record_transport_error(message.clone(), now);
                Err(JobExecutionError::Transport(message))
            }
        };
        self.deliveries.save(&delivery).await?;

        match &result {
            Ok(()) => tracing::info!(
                delivery.id = %delivery.id,
                code = ?delivery.last_response_code,
                "Webhook delivered"
            ),
            Err(e) => tracing::warn!(
                delivery.id = %delivery.id,
                attempt = delivery.attempts,
                error = %e,
                "Webhook delivery attempt failed"
            ),
        }
        result
    }
}

/// First `max` characters of `s`.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((end, _)) => s[..end].to_string(),
        None => s.to_string(),
    }
}
