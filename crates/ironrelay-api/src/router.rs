//! Route definitions for the IronRelay HTTP API.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the router with every route, threading `state` through
/// `.with_state(state)`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(relay_routes())
        .merge(admin_routes())
        .route("/api/health", get(handlers::health::health))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Ingestion and status
fn relay_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/ironrelay/incoming/{source}",
            post(handlers::incoming::receive),
        )
        .route("/ironrelay/status", get(handlers::status::status))
}

/// Operator job actions
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/ironrelay/admin/jobs", get(handlers::admin::jobs::list_jobs))
        .route(
            "/ironrelay/admin/jobs/retry-failed",
            post(handlers::admin::jobs::retry_failed),
        )
        .route(
            "/ironrelay/admin/jobs/{id}/cancel",
            post(handlers::admin::jobs::cancel_job),
        )
}
