//! JSON status endpoint.

use axum::Json;
use axum::extract::State;

use crate::dto::response::StatusResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /ironrelay/status
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let stats = state.stores.stats().await?;
    Ok(Json(StatusResponse {
        ok: true,
        timestamp: state.queue.clock().now(),
        app: "ironrelay".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        stats: stats.into(),
    }))
}
