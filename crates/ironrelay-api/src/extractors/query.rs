//! Query parameters for the job listing.

use serde::{Deserialize, Serialize};

use ironrelay_core::error::AppError;
use ironrelay_entity::job::JobStatus;

/// `?status=&limit=` on `GET /ironrelay/admin/jobs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobListParams {
    /// Filter by status name (`pending`, `failed`, ...).
    pub status: Option<String>,
    /// Maximum rows (default: 100, max: 1000).
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

impl JobListParams {
    /// Parsed status filter. An empty value means no filter.
    pub fn status(&self) -> Result<Option<JobStatus>, AppError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => s.parse().map(Some),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, 1000)
    }
}
