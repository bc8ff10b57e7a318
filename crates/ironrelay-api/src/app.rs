//! Application builder: wires router, middleware and state into an Axum app.

use std::future::Future;

use axum::Router;
use tower_http::trace::TraceLayer;

use ironrelay_core::error::{AppError, ErrorKind};

use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    build_router(state).layer(TraceLayer::new_for_http())
}

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn serve<F>(state: AppState, shutdown: F) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        AppError::with_source(ErrorKind::Configuration, format!("Failed to bind {addr}"), e)
    })?;

    tracing::info!("IronRelay server listening on {}", addr);

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Server error", e))
}
