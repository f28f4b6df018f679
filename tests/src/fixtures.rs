//! Test fixtures and record generators.

use chrono::{TimeZone, Utc};
use engine_core::{CanonicalEvent, Event, EventData, PageInfo, Tenant, UserSnapshot};
use serde_json::{json, Value};
use uuid::Uuid;

/// Active tenant served by the test directory.
pub const TENANT_ID: &str = "tenant-1";
pub const TRACKING_ID: &str = "site-1";

/// Tenant that exists but may not ingest.
pub const INACTIVE_TENANT_ID: &str = "tenant-off";
pub const INACTIVE_TRACKING_ID: &str = "site-off";

pub fn tenants() -> Vec<Tenant> {
    vec![
        Tenant::new(TENANT_ID, TRACKING_ID),
        Tenant::new(INACTIVE_TENANT_ID, INACTIVE_TRACKING_ID).deactivated(),
    ]
}

/// A client record as the tracking script sends it.
pub fn record(event_type: &str, session_id: &str, timestamp: i64) -> Value {
    json!({
        "tenantId": TRACKING_ID,
        "sessionId": session_id,
        "type": event_type,
        "timestamp": timestamp,
        "url": "https://example.com/pricing",
    })
}

/// A record with a fresh session and the current time.
pub fn fresh_record(event_type: &str) -> Value {
    record(
        event_type,
        &Uuid::new_v4().to_string(),
        Utc::now().timestamp_millis(),
    )
}

/// N pageview records, each in its own session.
pub fn records(n: usize) -> Vec<Value> {
    (0..n).map(|_| fresh_record("pageview")).collect()
}

pub fn object_payload(records: Vec<Value>) -> Value {
    json!({
        "events": records,
        "metadata": { "sdkVersion": "1.0.0" }
    })
}

/// A JSON body just over the 1 MiB payload limit.
pub fn oversized_body() -> String {
    let mut record = fresh_record("custom");
    record["blob"] = Value::String("x".repeat(1024 * 1024 + 1));
    record.to_string()
}

/// An enriched pageview for the active tenant.
pub fn event(tenant_id: &str, session_id: &str, timestamp_ms: i64) -> Event {
    let timestamp = Utc
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .unwrap_or_else(Utc::now);
    let canonical = CanonicalEvent {
        tracking_id: TRACKING_ID.to_string(),
        session_id: session_id.to_string(),
        client_id: None,
        timestamp,
        received_at: Utc::now(),
        data: EventData::Pageview {
            page: PageInfo {
                url: "https://example.com/".to_string(),
                path: "/".to_string(),
                ..Default::default()
            },
        },
    };
    Event::enriched(
        canonical,
        &Tenant::new(tenant_id, TRACKING_ID),
        UserSnapshot::default(),
    )
}

/// Same event with a different payload type.
pub fn with_data(mut event: Event, data: EventData) -> Event {
    event.data = data;
    event
}
