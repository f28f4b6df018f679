//! End-to-end tests for the ingest pipeline.
//!
//! POST /ingest → sanitize → enrich → dispatch → FlakyQueue → consumer pool
//! → memory event store + memory session store.
//!
//! Numeric epochs below 1e11 are read as seconds, so the small timestamps
//! here land in 1970.

use chrono::{DateTime, TimeZone, Utc};
use engine_core::{EventType, Priority};
use integration_tests::{fixtures, setup::TestContext};
use serde_json::{json, Value};

fn secs(n: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(n, 0).unwrap()
}

#[tokio::test]
async fn test_ingest_array_format_e2e() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.post("/ingest").json(&fixtures::records(5)).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["received"], 5);
    assert_eq!(body["skipped"], 0);
    assert!(body.get("truncated").is_none());

    assert_eq!(ctx.settle(5).await, 5);
    assert_eq!(ctx.events.len(), 5);
    assert_eq!(ctx.sessions.len(), 5);
    assert!(ctx
        .events
        .events()
        .iter()
        .all(|e| e.tenant_id == fixtures::TENANT_ID && e.data.event_type() == EventType::Pageview));
}

#[tokio::test]
async fn test_ingest_object_format_e2e() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let records = (0..3).map(|_| fixtures::fresh_record("click")).collect();
    let response = server
        .post("/ingest")
        .json(&fixtures::object_payload(records))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["received"], 3);

    assert_eq!(ctx.settle(3).await, 3);
    assert_eq!(ctx.events.len(), 3);
}

#[tokio::test]
async fn test_ingest_single_record_e2e() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/ingest")
        .json(&fixtures::fresh_record("scroll"))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["received"], 1);

    assert_eq!(ctx.settle(1).await, 1);
    assert_eq!(ctx.events.events()[0].data.event_type(), EventType::Scroll);
}

#[tokio::test]
async fn test_priority_hint_from_event_type() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let records = vec![
        fixtures::fresh_record("click"),
        fixtures::fresh_record("pageview"),
        fixtures::fresh_record("unload"),
    ];
    server.post("/ingest").json(&records).await.assert_status_ok();
    ctx.wait_for_dispatch(3).await;

    let priorities: Vec<(EventType, Priority)> = ctx
        .queue
        .captured_jobs()
        .iter()
        .map(|job| (job.event.data.event_type(), job.priority))
        .collect();
    assert!(priorities.contains(&(EventType::Click, Priority::Normal)));
    assert!(priorities.contains(&(EventType::Pageview, Priority::High)));
    assert!(priorities.contains(&(EventType::Unload, Priority::High)));
}

/// Pageview then click on the same session.
#[tokio::test]
async fn test_scenario_a_pageview_then_click() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let records = json!([
        fixtures::record("pageview", "S1", 1000),
        fixtures::record("click", "S1", 2000),
    ]);
    server.post("/ingest").json(&records).await.assert_status_ok();
    assert_eq!(ctx.settle(2).await, 2);

    let session = ctx.session("S1").await.expect("session S1");
    assert_eq!(session.page_views, 1);
    assert_eq!(session.clicks, 1);
    assert!(!session.is_bounce);
    assert_eq!(session.start_time, secs(1000));
    assert_eq!(session.last_activity, secs(2000));
    assert_eq!(session.last_event, EventType::Click);
}

/// A lone pageview stays a bounce.
#[tokio::test]
async fn test_scenario_b_single_pageview_bounces() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server
        .post("/ingest")
        .json(&fixtures::record("pageview", "S2", 500))
        .await
        .assert_status_ok();
    assert_eq!(ctx.settle(1).await, 1);

    let session = ctx.session("S2").await.expect("session S2");
    assert_eq!(session.page_views, 1);
    assert!(session.is_bounce);
    assert_eq!(
        session.first_page.as_deref(),
        Some("https://example.com/pricing")
    );
}

/// Unload closes the session and sets its duration in the same update.
#[tokio::test]
async fn test_scenario_c_unload_sets_duration() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let records = json!([
        fixtures::record("pageview", "S3", 0),
        fixtures::record("unload", "S3", 5000),
    ]);
    server.post("/ingest").json(&records).await.assert_status_ok();
    assert_eq!(ctx.settle(2).await, 2);

    let session = ctx.session("S3").await.expect("session S3");
    assert_eq!(session.start_time, secs(0));
    assert_eq!(session.end_time, Some(secs(5000)));
    assert_eq!(session.duration_ms, Some(5_000_000));
}

/// Millisecond epochs from the tracker give millisecond durations.
#[tokio::test]
async fn test_scenario_c_millisecond_timestamps() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let start = 1_700_000_000_000;
    let records = json!([
        fixtures::record("pageview", "S3ms", start),
        fixtures::record("unload", "S3ms", start + 5000),
    ]);
    server.post("/ingest").json(&records).await.assert_status_ok();
    assert_eq!(ctx.settle(2).await, 2);

    let session = ctx.session("S3ms").await.expect("session S3ms");
    assert_eq!(session.start_time, Utc.timestamp_millis_opt(start).unwrap());
    assert_eq!(
        session.end_time,
        Some(Utc.timestamp_millis_opt(start + 5000).unwrap())
    );
    assert_eq!(session.duration_ms, Some(5000));
}

/// Records for an inactive tenant are skipped and never reach a session.
#[tokio::test]
async fn test_scenario_d_inactive_tenant_skipped() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let mut record = fixtures::record("pageview", "S4", 1000);
    record["tenantId"] = json!(fixtures::INACTIVE_TRACKING_ID);

    let response = server.post("/ingest").json(&record).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["received"], 0);
    assert_eq!(body["skipped"], 1);

    assert_eq!(ctx.process_all().await, 0);
    assert_eq!(ctx.queue.job_count(), 0);
    assert!(ctx.sessions.is_empty());
}

/// A malformed timestamp falls back to ingestion time.
#[tokio::test]
async fn test_scenario_e_bad_timestamp_uses_now() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let mut record = fixtures::record("pageview", "S5", 0);
    record["timestamp"] = json!("yesterday-ish");

    let before = Utc::now();
    let response = server.post("/ingest").json(&record).await;
    let after = Utc::now();

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["received"], 1);
    assert_eq!(ctx.settle(1).await, 1);

    let session = ctx.session("S5").await.expect("session S5");
    assert!(session.start_time >= before && session.start_time <= after);
}

#[tokio::test]
async fn test_oversized_batch_truncated_not_rejected() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.post("/ingest").json(&fixtures::records(1001)).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["received"], 1000);
    assert_eq!(body["truncated"], 1);

    ctx.wait_for_dispatch(1000).await;
    assert_eq!(ctx.queue.job_count(), 1000);
}

#[tokio::test]
async fn test_mixed_batch_counts_skipped() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let records = json!([
        fixtures::fresh_record("pageview"),
        fixtures::fresh_record("hover"),
        { "tenantId": fixtures::TRACKING_ID, "type": "click" },
        "not an object",
        fixtures::fresh_record("click"),
    ]);
    let response = server.post("/ingest").json(&records).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["received"], 2);
    assert_eq!(body["skipped"], 3);

    assert_eq!(ctx.settle(2).await, 2);
}

#[tokio::test]
async fn test_session_counters_match_event_counts() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let mut records = Vec::new();
    for (i, kind) in ["pageview", "scroll", "click", "route", "form", "pageview", "scroll"]
        .iter()
        .enumerate()
    {
        records.push(fixtures::record(kind, "S6", 1000 + i as i64));
    }
    server.post("/ingest").json(&records).await.assert_status_ok();
    assert_eq!(ctx.settle(7).await, 7);

    let session = ctx.session("S6").await.expect("session S6");
    assert_eq!(session.page_views, 2);
    assert_eq!(session.scrolls, 2);
    assert_eq!(session.clicks, 1);
    assert_eq!(session.routes, 1);
    assert_eq!(session.forms, 1);
    assert!(!session.is_bounce);
}
