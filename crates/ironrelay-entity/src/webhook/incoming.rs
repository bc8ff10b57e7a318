//! Inbound webhook log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use ironrelay_core::types::{IncomingWebhookId, JobId};

/// Processing state of an inbound webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "incoming_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IncomingStatus {
    Received,
    Handled,
    Failed,
}

impl IncomingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Handled => "handled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for IncomingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payload received on the ingestion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IncomingWebhook {
    pub id: IncomingWebhookId,
    /// Sender tag taken from the URL, e.g. `stripe`.
    pub source: String,
    /// The body's `event` field, or empty.
    pub event: String,
    pub payload: serde_json::Value,
    pub status: IncomingStatus,
    /// Job that handles this payload, linked once it is enqueued.
    pub handler_job_id: Option<JobId>,
    pub created_at: DateTime<Utc>,
}

impl IncomingWebhook {
    pub fn from_new(new: NewIncomingWebhook, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            source: new.source,
            event: new.event,
            payload: new.payload,
            status: IncomingStatus::Received,
            handler_job_id: None,
            created_at: now,
        }
    }
}

/// Data required to log an inbound webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIncomingWebhook {
    pub id: IncomingWebhookId,
    pub source: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl NewIncomingWebhook {
    /// Build a record from a raw body, pulling the event name out of it.
    pub fn from_body(source: impl Into<String>, payload: serde_json::Value) -> Self {
        let event = payload
            .get("event")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Self {
            id: IncomingWebhookId::new(),
            source: source.into(),
            event,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_from_body() {
        let new = NewIncomingWebhook::from_body(
            "stripe",
            serde_json::json!({"event": "charge.succeeded", "amount": 10}),
        );
        assert_eq!(new.event, "charge.succeeded");
        assert_eq!(new.source, "stripe");

        let bare = NewIncomingWebhook::from_body("github", serde_json::json!({"ref": "main"}));
        assert_eq!(bare.event, "");
    }
}
