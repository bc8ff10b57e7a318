//! Background worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Background job worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the server binary starts in-process workers.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of independent claim loops.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Worker identity prefix; loops are named `{prefix}-{n}`.
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
    /// Sleep between polls when nothing is claimable, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Pause after each executed job, in milliseconds.
    #[serde(default = "default_idle_pause")]
    pub idle_pause_ms: u64,
    /// Fixed delay before a failed job becomes eligible again.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    /// Attempt budget for jobs enqueued without an explicit one.
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: i32,
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_pause(&self) -> Duration {
        Duration::from_millis(self.idle_pause_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    /// Reject values the worker loop cannot act on.
    pub fn validate(&self) -> Result<(), AppError> {
        if chrono::Duration::from_std(self.retry_delay()).is_err() {
            return Err(AppError::configuration(format!(
                "worker.retry_delay_seconds is out of range: {}",
                self.retry_delay_seconds
            )));
        }
        if self.default_max_attempts < 1 {
            return Err(AppError::configuration(format!(
                "worker.default_max_attempts must be at least 1, got {}",
                self.default_max_attempts
            )));
        }
        Ok(())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            concurrency: default_concurrency(),
            id_prefix: default_id_prefix(),
            poll_interval_ms: default_poll_interval(),
            idle_pause_ms: default_idle_pause(),
            retry_delay_seconds: default_retry_delay(),
            default_max_attempts: default_max_attempts(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    1
}

fn default_id_prefix() -> String {
    "local-worker".to_string()
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_idle_pause() -> u64 {
    200
}

fn default_retry_delay() -> u64 {
    3
}

fn default_max_attempts() -> i32 {
    5
}
