//! Tests for health check endpoints.
//!
//! The health registry is process-global, so only one test here changes it.

use axum::http::StatusCode;
use integration_tests::{fixtures, setup::TestContext};
use serde_json::Value;
use telemetry::health;

#[tokio::test]
async fn test_health_endpoint_structure() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let status = body["status"].as_str().unwrap_or("");
    assert!(
        ["healthy", "degraded", "unhealthy"].contains(&status),
        "unexpected status '{}'",
        status
    );

    let names: Vec<&str> = body["components"]
        .as_array()
        .expect("components array")
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, vec!["queue", "clickhouse", "postgres"]);
    assert!(body.get("fallback_depth").is_some());
    assert!(body.get("failed_jobs").is_some());
}

#[tokio::test]
async fn test_health_reports_fallback_depth() {
    let ctx = TestContext::new();
    let server = ctx.server();
    ctx.queue.set_down(true);

    server
        .post("/ingest")
        .json(&fixtures::records(2))
        .await
        .assert_status_ok();
    ctx.wait_for_dispatch(2).await;

    let body: Value = server.get("/health").await.json();
    assert_eq!(body["fallback_depth"], 2);
}

#[tokio::test]
async fn test_ready_follows_component_health() {
    let ctx = TestContext::new();
    let server = ctx.server();

    health().queue.set_healthy();
    health().clickhouse.set_healthy();
    health().postgres.set_healthy();
    server.get("/health/ready").await.assert_status_ok();

    // Stores alone can still take the fallback path.
    health().queue.set_unhealthy("down");
    server.get("/health/ready").await.assert_status_ok();
    let body: Value = server.get("/health").await.json();
    assert_eq!(body["status"], "degraded");

    health().postgres.set_unhealthy("down");
    server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_live_endpoint() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server.get("/health/live").await.assert_status_ok();
}
