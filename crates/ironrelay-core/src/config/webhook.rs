//! Outbound webhook delivery configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the webhook delivery job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Request timeout covering connect, send and body read.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// `User-Agent` header sent with every delivery.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Header carrying the event name.
    #[serde(default = "default_event_header")]
    pub event_header: String,
    /// Response bodies are truncated to this many characters before storage.
    #[serde(default = "default_max_body")]
    pub max_response_body_chars: usize,
    /// Attempt budget for deliveries sent without an explicit one.
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: i32,
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            event_header: default_event_header(),
            max_response_body_chars: default_max_body(),
            default_max_attempts: default_max_attempts(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    "IronRelayWebhook/1.0".to_string()
}

fn default_event_header() -> String {
    "X-IronRelay-Event".to_string()
}

fn default_max_body() -> usize {
    2000
}

fn default_max_attempts() -> i32 {
    5
}
