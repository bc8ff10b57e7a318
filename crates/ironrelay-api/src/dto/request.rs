//! Request DTOs.

use serde::{Deserialize, Serialize};

use ironrelay_core::types::JobId;

/// Body of `POST /ironrelay/admin/jobs/retry-failed`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryFailedRequest {
    /// Restrict the reset to these jobs. Absent means every failed job.
    #[serde(default)]
    pub ids: Option<Vec<JobId>>,
}
