//! Application state shared across all handlers.

use std::sync::Arc;

use ironrelay_core::config::AppConfig;
use ironrelay_database::Stores;
use ironrelay_worker::JobQueue;

/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Job, delivery and incoming webhook stores
    pub stores: Stores,
    /// Queue used for enqueueing and admin actions
    pub queue: JobQueue,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, queue: JobQueue) -> Self {
        Self {
            config,
            stores: queue.stores().clone(),
            queue,
        }
    }
}
