//! Job status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use ironrelay_core::AppError;

/// Status of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for its scheduled time and a free worker.
    Pending,
    /// Claimed by exactly one worker.
    Running,
    /// Handler returned successfully.
    Success,
    /// Attempt budget exhausted.
    Failed,
    /// Cancelled by an operator before it ran.
    Cancelled,
}

impl JobStatus {
    /// All statuses, in display order.
    pub const ALL: [JobStatus; 5] = [
        Self::Pending,
        Self::Running,
        Self::Success,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Terminal jobs are never claimed again without operator action.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// Check if an operator reset may move the job back to pending.
    pub fn can_retry(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::validation(format!("Unknown job status '{s}'")))
    }
}
