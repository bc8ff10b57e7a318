//! Job management handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};

use ironrelay_core::error::AppError;
use ironrelay_entity::job::JobStatus;

use crate::dto::request::RetryFailedRequest;
use crate::dto::response::{ApiResponse, CancelResponse, JobListResponse, RetryFailedResponse};
use crate::error::ApiError;
use crate::extractors::{JobListParams, parse_job_id};
use crate::state::AppState;

/// GET /ironrelay/admin/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListParams>,
) -> Result<Json<ApiResponse<JobListResponse>>, ApiError> {
    let jobs = state.queue.list(params.status()?, params.limit()).await?;
    Ok(Json(ApiResponse::ok(JobListResponse {
        count: jobs.len(),
        jobs,
    })))
}

/// POST /ironrelay/admin/jobs/retry-failed
pub async fn retry_failed(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApiResponse<RetryFailedResponse>>, ApiError> {
    let request: RetryFailedRequest = if body.is_empty() {
        RetryFailedRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::validation(format!("Invalid request body: {e}")))?
    };

    let reset = state.queue.retry_failed(request.ids.as_deref()).await?;
    Ok(Json(ApiResponse::ok(RetryFailedResponse { reset })))
}

/// POST /ironrelay/admin/jobs/{id}/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CancelResponse>>, ApiError> {
    let id = parse_job_id(&id)?;
    state.queue.cancel(id).await?;
    Ok(Json(ApiResponse::ok(CancelResponse {
        id,
        status: JobStatus::Cancelled.to_string(),
    })))
}
