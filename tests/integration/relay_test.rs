//! Integration tests across the HTTP layer, the queue and the worker.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ironrelay_core::types::IncomingWebhookId;
use ironrelay_entity::job::JobStatus;
use ironrelay_entity::webhook::IncomingStatus;

#[tokio::test]
async fn test_incoming_webhook_is_handled_by_worker() {
    let app = helpers::TestApp::new();

    let response = app
        .request(
            "POST",
            "/ironrelay/incoming/github",
            Some(r#"{"event": "push", "ref": "refs/heads/main"}"#),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let id: IncomingWebhookId = response.body["id"].as_str().unwrap().parse().unwrap();

    assert_eq!(app.drain().await, 1);

    let record = app.stores.incoming.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(record.status, IncomingStatus::Handled);
    let job = app
        .stores
        .jobs
        .find_by_id(record.handler_job_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.attempts, 0);
}

#[tokio::test]
async fn test_outbound_delivery_shows_in_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-ironrelay-event", "invoice.paid"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let app = helpers::TestApp::new();
    app.sender
        .send("invoice.paid", &server.uri(), json!({"invoice": 7}), None)
        .await
        .unwrap();

    let before = app.request("GET", "/ironrelay/status", None).await;
    assert_eq!(before.body["stats"]["pending_tasks"], 1);
    assert_eq!(before.body["stats"]["success_webhooks"], 0);

    assert_eq!(app.drain().await, 1);

    let after = app.request("GET", "/ironrelay/status", None).await;
    assert_eq!(after.status, StatusCode::OK);
    assert_eq!(after.body["stats"]["pending_tasks"], 0);
    assert_eq!(after.body["stats"]["success_webhooks"], 1);
    assert_eq!(after.body["stats"]["total_deliveries"], 1);
    assert_eq!(after.body["stats"]["total_tasks"], 1);
}

#[tokio::test]
async fn test_failed_delivery_can_be_retried_from_admin() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let app = helpers::TestApp::new();
    app.sender
        .send("ping", &server.uri(), json!({}), Some(1))
        .await
        .unwrap();

    assert_eq!(app.drain().await, 1);
    let failed = app
        .request("GET", "/ironrelay/admin/jobs?status=failed", None)
        .await;
    assert_eq!(failed.body["data"]["count"], 1);
    assert_eq!(failed.body["data"]["jobs"][0]["last_error"], "HTTP 503");

    let reset = app
        .request("POST", "/ironrelay/admin/jobs/retry-failed", None)
        .await;
    assert_eq!(reset.body["data"]["reset"], 1);

    assert_eq!(app.drain().await, 1);
    let status = app.request("GET", "/ironrelay/status", None).await;
    assert_eq!(status.body["stats"]["failed_tasks"], 0);
    assert_eq!(status.body["stats"]["success_webhooks"], 1);
}
