//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ironrelay_core::types::{IncomingWebhookId, JobId};
use ironrelay_entity::job::Job;
use ironrelay_entity::stats::QueueStats;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Reply to an accepted inbound webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingAccepted {
    pub id: IncomingWebhookId,
    pub status: String,
}

/// Counters reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusStats {
    pub pending_tasks: i64,
    pub running_tasks: i64,
    pub failed_tasks: i64,
    pub success_webhooks: i64,
    pub total_incoming: i64,
    pub total_tasks: i64,
    pub total_deliveries: i64,
}

impl From<QueueStats> for StatusStats {
    fn from(stats: QueueStats) -> Self {
        Self {
            pending_tasks: stats.pending_jobs,
            running_tasks: stats.running_jobs,
            failed_tasks: stats.failed_jobs,
            success_webhooks: stats.success_deliveries,
            total_incoming: stats.total_incoming,
            total_tasks: stats.total_jobs,
            total_deliveries: stats.total_deliveries,
        }
    }
}

/// Body of `GET /ironrelay/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub timestamp: DateTime<Utc>,
    pub app: String,
    pub version: String,
    pub stats: StatusStats,
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status string.
    pub status: String,
    /// Server version.
    pub version: String,
}

/// Job listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub count: usize,
}

/// Result of a bulk reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryFailedResponse {
    /// Number of jobs moved back to `pending`.
    pub reset: u64,
}

/// Result of a cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub id: JobId,
    pub status: String,
}
