//! Aggregate queue statistics.

use serde::{Deserialize, Serialize};

/// Counts across jobs, deliveries and inbound webhooks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending_jobs: i64,
    pub running_jobs: i64,
    pub success_jobs: i64,
    pub failed_jobs: i64,
    pub cancelled_jobs: i64,
    pub total_jobs: i64,
    pub pending_deliveries: i64,
    pub sending_deliveries: i64,
    pub success_deliveries: i64,
    pub failed_deliveries: i64,
    pub total_deliveries: i64,
    pub total_incoming: i64,
}
