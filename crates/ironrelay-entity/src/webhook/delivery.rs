//! Outbound webhook delivery record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use ironrelay_core::types::DeliveryId;

/// Outcome of the most recent delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "delivery_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Created, no attempt yet.
    Pending,
    /// Request in flight.
    Sending,
    /// Last attempt got a 2xx response.
    Success,
    /// Last attempt got a non-2xx response or a transport error.
    Failed,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 4] = [Self::Pending, Self::Sending, Self::Success, Self::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sending => "sending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A webhook delivery backed by exactly one job.
///
/// `status` reflects the last attempt only; the backing job tracks overall
/// retry progress.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebhookDelivery {
    pub id: DeliveryId,
    /// Event name, sent in the event header.
    pub event: String,
    pub target_url: String,
    /// JSON body posted to the target.
    pub payload: serde_json::Value,
    pub status: DeliveryStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_response_code: Option<i32>,
    /// Lossy UTF-8 response body, truncated.
    pub last_response_body: String,
    pub last_error: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookDelivery {
    pub fn from_new(new: NewWebhookDelivery, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            event: new.event,
            target_url: new.target_url,
            payload: new.payload,
            status: DeliveryStatus::Pending,
            attempts: 0,
            max_attempts: new.max_attempts,
            last_response_code: None,
            last_response_body: String::new(),
            last_error: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Start a new attempt.
    pub fn begin_attempt(&mut self, now: DateTime<Utc>) {
        self.attempts += 1;
        self.status = DeliveryStatus::Sending;
        self.updated_at = now;
    }

    /// Record an HTTP response. Non-2xx codes mark the attempt failed.
    pub fn record_response(&mut self, code: u16, body: String, now: DateTime<Utc>) {
        self.last_response_code = Some(i32::from(code));
        self.last_response_body = body;
        if (200..300).contains(&code) {
            self.status = DeliveryStatus::Success;
            self.last_error.clear();
        } else {
            self.status = DeliveryStatus::Failed;
            self.last_error = format!("HTTP {code}");
        }
        self.updated_at = now;
    }

    /// Record a failure that produced no HTTP response.
    pub fn record_transport_error(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.status = DeliveryStatus::Failed;
        self.last_error = message.into();
        self.updated_at = now;
    }
}

/// Data required to create a delivery record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWebhookDelivery {
    pub id: DeliveryId,
    pub event: String,
    pub target_url: String,
    pub payload: serde_json::Value,
    pub max_attempts: i32,
}
