//! Shared test helpers for integration tests.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

use ironrelay_api::{AppState, build_app};
use ironrelay_core::config::AppConfig;
use ironrelay_core::traits::ManualClock;
use ironrelay_database::{MemoryStore, Stores};
use ironrelay_worker::jobs::{WebhookSender, register_builtin_jobs};
use ironrelay_worker::{JobQueue, JobRegistry, WorkerRunner};

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Stores shared by the router and the worker
    pub stores: Stores,
    /// A single worker over the same stores
    pub runner: WorkerRunner,
    /// Outbound webhook sender
    pub sender: WebhookSender,
}

/// Response captured from the router
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    /// Create a new test application on the in-memory store
    pub fn new() -> Self {
        let config = AppConfig::default();
        let stores = Stores::memory(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let mut registry = JobRegistry::new();
        register_builtin_jobs(&mut registry, &stores, clock.clone(), &config.webhook)
            .expect("Failed to register jobs");

        let queue = JobQueue::new(
            stores.clone(),
            clock.clone(),
            config.worker.default_max_attempts,
        );
        let runner = WorkerRunner::new(
            "integration-worker-1",
            Arc::clone(&stores.jobs),
            Arc::new(registry),
            clock.clone(),
            &config.worker,
        );
        let sender = WebhookSender::new(queue.clone(), &config.webhook);
        let router = build_app(AppState::new(Arc::new(config), queue));

        Self {
            router,
            stores,
            runner,
            sender,
        }
    }

    /// Send a request with an optional raw body
    pub async fn request(&self, method: &str, uri: &str, body: Option<&str>) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.unwrap_or_default().to_string()))
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }

    /// Run the worker until nothing is eligible; returns the number of jobs run
    pub async fn drain(&self) -> usize {
        let mut count = 0;
        while self.runner.run_once().await.expect("Worker poll failed").is_some() {
            count += 1;
        }
        count
    }
}
