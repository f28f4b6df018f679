//! Error paths: bad bodies, oversized payloads, the script endpoint and
//! queue outages.

use axum::http::StatusCode;
use integration_tests::{fixtures, setup::TestContext, setup::TEST_SCRIPT};
use serde_json::Value;

#[tokio::test]
async fn test_invalid_json_returns_400() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/ingest")
        .content_type("application/json")
        .text("{ not json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALID_001");
}

#[tokio::test]
async fn test_scalar_body_returns_400() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.post("/ingest").json(&42).await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payload_too_large_returns_413() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/ingest")
        .content_type("application/json")
        .text(fixtures::oversized_body())
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALID_002");
    assert_eq!(ctx.queue.job_count(), 0);
}

#[tokio::test]
async fn test_empty_array_accepted() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.post("/ingest").json(&Vec::<Value>::new()).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["received"], 0);
    assert_eq!(body["skipped"], 0);
}

#[tokio::test]
async fn test_unknown_tracking_id_skipped() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let mut record = fixtures::fresh_record("pageview");
    record["tenantId"] = Value::String("nobody".to_string());
    let response = server.post("/ingest").json(&record).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["received"], 0);
    assert_eq!(body["skipped"], 1);
}

/// With the queue down, events land in the fallback buffer and the flusher
/// persists them directly.
#[tokio::test]
async fn test_queue_outage_uses_fallback_buffer() {
    let ctx = TestContext::new();
    let server = ctx.server();
    ctx.queue.set_down(true);

    let response = server.post("/ingest").json(&fixtures::records(4)).await;

    // The response never waits for dispatch.
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["received"], 4);

    ctx.wait_for_dispatch(4).await;
    assert_eq!(ctx.queue.job_count(), 0);
    assert_eq!(ctx.dispatcher.fallback().len(), 4);

    let flushed = ctx.dispatcher.drain_fallback().await;
    assert_eq!(flushed, 4);
    assert!(ctx.dispatcher.fallback().is_empty());
    assert_eq!(ctx.events.len(), 4);
    assert_eq!(ctx.sessions.len(), 4);
}

#[tokio::test]
async fn test_failed_flush_keeps_remainder_buffered() {
    let ctx = TestContext::new();
    let server = ctx.server();
    ctx.queue.set_down(true);

    server
        .post("/ingest")
        .json(&fixtures::records(3))
        .await
        .assert_status_ok();
    ctx.wait_for_dispatch(3).await;

    ctx.events.fail_next(1);
    let flushed = ctx.dispatcher.flush_fallback().await;
    assert_eq!(flushed, 0);
    assert_eq!(ctx.dispatcher.fallback().len(), 3);

    assert_eq!(ctx.dispatcher.flush_fallback().await, 3);
    assert_eq!(ctx.events.len(), 3);
}

#[tokio::test]
async fn test_script_missing_id_returns_400() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/script.js").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "TENANT_001");
}

#[tokio::test]
async fn test_script_unknown_or_inactive_returns_404() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let unknown = server.get("/script.js").add_query_param("id", "nobody").await;
    unknown.assert_status(StatusCode::NOT_FOUND);

    let inactive = server
        .get("/script.js")
        .add_query_param("id", fixtures::INACTIVE_TRACKING_ID)
        .await;
    inactive.assert_status(StatusCode::NOT_FOUND);
    let body: Value = inactive.json();
    assert_eq!(body["code"], "TENANT_002");
}

#[tokio::test]
async fn test_script_served_to_active_tenant() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .get("/script.js")
        .add_query_param("id", fixtures::TRACKING_ID)
        .await;

    response.assert_status_ok();
    assert_eq!(response.text(), TEST_SCRIPT);
    let content_type = response.header("content-type");
    assert!(content_type
        .to_str()
        .unwrap()
        .starts_with("application/javascript"));
}

/// Shutdown order: in-flight dispatches finish before the final fallback
/// drain, so a request accepted during an outage is still persisted.
#[tokio::test]
async fn test_shutdown_persists_in_flight_dispatches() {
    let ctx = TestContext::new();
    let server = ctx.server();
    ctx.queue.set_down(true);

    let response = server.post("/ingest").json(&fixtures::records(3)).await;
    response.assert_status_ok();

    ctx.dispatcher.wait_dispatches().await;
    assert_eq!(ctx.dispatcher.in_flight(), 0);
    assert_eq!(ctx.dispatcher.fallback().len(), 3);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let flusher = tokio::spawn(ctx.dispatcher.clone().run_flusher(shutdown_rx));
    shutdown_tx.send(true).unwrap();
    flusher.await.unwrap();

    assert!(ctx.dispatcher.fallback().is_empty());
    assert_eq!(ctx.events.len(), 3);
    assert_eq!(ctx.queue.job_count(), 0);
}
