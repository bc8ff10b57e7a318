//! Typed path parameter helpers.

use ironrelay_core::error::AppError;
use ironrelay_core::types::JobId;

/// Parses a job id from a path segment.
pub fn parse_job_id(s: &str) -> Result<JobId, AppError> {
    s.parse()
        .map_err(|_| AppError::validation(format!("Invalid job id: {s}")))
}
