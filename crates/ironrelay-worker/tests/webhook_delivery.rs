//! End-to-end webhook delivery through the worker against a mock endpoint.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ironrelay_core::config::{WebhookConfig, WorkerConfig};
use ironrelay_core::traits::{Clock, ManualClock};
use ironrelay_database::{MemoryStore, Stores, UnitOfWork};
use ironrelay_entity::job::JobStatus;
use ironrelay_entity::webhook::DeliveryStatus;
use ironrelay_worker::jobs::{WebhookSender, register_builtin_jobs};
use ironrelay_worker::{JobQueue, JobRegistry, WorkerRunner};

struct Harness {
    stores: Stores,
    clock: Arc<ManualClock>,
    sender: WebhookSender,
    runner: WorkerRunner,
}

fn harness() -> Harness {
    let stores = Stores::memory(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let webhook = WebhookConfig::default();

    let mut registry = JobRegistry::new();
    register_builtin_jobs(&mut registry, &stores, clock.clone(), &webhook).unwrap();

    let queue = JobQueue::new(stores.clone(), clock.clone(), webhook.default_max_attempts);
    let sender = WebhookSender::new(queue, &webhook);
    let runner = WorkerRunner::new(
        "test-worker-1",
        Arc::clone(&stores.jobs),
        Arc::new(registry),
        clock.clone(),
        &WorkerConfig::default(),
    );

    Harness {
        stores,
        clock,
        sender,
        runner,
    }
}

#[tokio::test]
async fn test_successful_delivery_records_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("content-type", "application/json"))
        .and(header("user-agent", "IronRelayWebhook/1.0"))
        .and(header("x-ironrelay-event", "order.created"))
        .and(body_json(json!({"order": 42})))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness();
    let delivery = h
        .sender
        .send(
            "order.created",
            &format!("{}/hook", server.uri()),
            json!({"order": 42}),
            None,
        )
        .await
        .unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Pending);

    let job_id = h.runner.run_once().await.unwrap().expect("a job ran");

    let delivery = h
        .stores
        .deliveries
        .find_by_id(delivery.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert_eq!(delivery.attempts, 1);
    assert_eq!(delivery.last_response_code, Some(200));
    assert_eq!(delivery.last_response_body, "ok");
    assert_eq!(delivery.last_error, "");

    let job = h.stores.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Success);
}

#[tokio::test]
async fn test_server_errors_exhaust_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let h = harness();
    let delivery = h
        .sender
        .send("order.created", &server.uri(), json!({}), Some(3))
        .await
        .unwrap();

    let job_id = h.runner.run_once().await.unwrap().expect("first attempt");

    // Nothing is eligible until the retry delay has passed.
    assert!(h.runner.run_once().await.unwrap().is_none());
    h.clock.advance(Duration::seconds(3));
    assert_eq!(h.runner.run_once().await.unwrap(), Some(job_id));
    h.clock.advance(Duration::seconds(3));
    assert_eq!(h.runner.run_once().await.unwrap(), Some(job_id));

    h.clock.advance(Duration::seconds(3));
    assert!(h.runner.run_once().await.unwrap().is_none());

    let job = h.stores.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert_eq!(job.last_error, "HTTP 500");

    let delivery = h
        .stores
        .deliveries
        .find_by_id(delivery.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Failed);
    assert_eq!(delivery.attempts, 3);
    assert_eq!(delivery.last_response_code, Some(500));
    assert_eq!(delivery.last_response_body, "boom");
    assert_eq!(delivery.last_error, "HTTP 500");
}

#[tokio::test]
async fn test_long_response_body_is_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_string("a".repeat(5000)))
        .mount(&server)
        .await;

    let h = harness();
    let delivery = h
        .sender
        .send("bulk", &server.uri(), json!([1, 2, 3]), None)
        .await
        .unwrap();
    h.runner.run_once().await.unwrap();

    let delivery = h
        .stores
        .deliveries
        .find_by_id(delivery.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert_eq!(delivery.last_response_code, Some(201));
    assert_eq!(delivery.last_response_body.chars().count(), 2000);
}

#[tokio::test]
async fn test_connection_refused_is_a_transport_failure() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let h = harness();
    let delivery = h
        .sender
        .send("ping", &format!("http://127.0.0.1:{port}/"), json!({}), Some(1))
        .await
        .unwrap();
    let job_id = h.runner.run_once().await.unwrap().unwrap();

    let delivery = h
        .stores
        .deliveries
        .find_by_id(delivery.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Failed);
    assert_eq!(delivery.last_response_code, None);
    assert!(!delivery.last_error.is_empty());

    let job = h.stores.jobs.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.last_error, delivery.last_error);
}

#[tokio::test]
async fn test_invalid_target_url_is_rejected() {
    let h = harness();
    let err = h
        .sender
        .send("ping", "not a url", json!({}), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ironrelay_core::error::ErrorKind::Validation);
    assert_eq!(h.stores.stats().await.unwrap().total_deliveries, 0);
}

#[tokio::test]
async fn test_zero_attempt_budget_writes_nothing() {
    let h = harness();
    let err = h
        .sender
        .send("order.paid", "http://127.0.0.1:9/hook", json!({"a": 1}), Some(0))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ironrelay_core::error::ErrorKind::Validation);

    let mut uow = UnitOfWork::new();
    let err = h
        .sender
        .send_deferred(&mut uow, "order.paid", "http://127.0.0.1:9/hook", json!({}), Some(0))
        .unwrap_err();
    assert_eq!(err.kind, ironrelay_core::error::ErrorKind::Validation);
    uow.commit().await.unwrap();

    let stats = h.stores.stats().await.unwrap();
    assert_eq!(stats.total_deliveries, 0);
    assert_eq!(stats.total_jobs, 0);
}

#[tokio::test]
async fn test_deferred_send_waits_for_commit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let h = harness();

    let mut uow = UnitOfWork::new();
    h.sender
        .send_deferred(&mut uow, "ping", &server.uri(), json!({}), None)
        .unwrap();
    uow.rollback();
    assert_eq!(h.stores.stats().await.unwrap().total_deliveries, 0);
    assert!(h.runner.run_once().await.unwrap().is_none());

    let mut uow = UnitOfWork::new();
    let id = h
        .sender
        .send_deferred(&mut uow, "ping", &server.uri(), json!({}), None)
        .unwrap();
    uow.commit().await.unwrap();
    h.runner.run_once().await.unwrap().expect("delivery job ran");

    let delivery = h.stores.deliveries.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert_eq!(delivery.last_response_code, Some(204));
    assert!(h.clock.now() >= delivery.created_at);
}
