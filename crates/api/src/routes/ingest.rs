//! Ingestion endpoint handler.
//!
//! Accepts records in 3 formats:
//! 1. Array: `[record, record, ...]`
//! 2. Object with events: `{ "events": [...] }`
//! 3. Single record: `{ "tenantId": "...", "type": "...", ... }`
//!
//! Records are sanitized and enriched synchronously; dispatch to the queue
//! runs in a background task tracked by the dispatcher, and the response
//! never waits for it.

use std::collections::HashMap;
use std::time::Instant;

use axum::{body::Bytes, extract::State, Json};
use chrono::Utc;
use engine_core::{
    limits::{MAX_BATCH_EVENTS, MAX_BATCH_SIZE_BYTES},
    sanitize, CanonicalEvent, Error, Tenant, ValidationErrorCode,
};
use enrichment::RequestContext;
use serde_json::Value;
use telemetry::metrics;
use tracing::{debug, info};

use crate::extractors::{ClientIp, UserAgent};
use crate::response::{ApiError, IngestResponse};
use crate::state::AppState;

/// Splits a request body into its records.
fn records(payload: Value) -> Result<Vec<Value>, ApiError> {
    match payload {
        Value::Array(records) => Ok(records),
        Value::Object(mut obj) => match obj.remove("events") {
            Some(Value::Array(records)) => Ok(records),
            Some(other) => {
                obj.insert("events".to_string(), other);
                Ok(vec![Value::Object(obj)])
            }
            None => Ok(vec![Value::Object(obj)]),
        },
        _ => Err(ApiError::bad_request(
            "Expected a JSON array, an object with an events array, or a single record",
        )),
    }
}

/// POST /ingest - Batch ingestion endpoint.
pub async fn ingest_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    UserAgent(user_agent): UserAgent,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    let start = Instant::now();
    metrics().batches_received.inc();

    // Check payload size before parsing
    if body.len() > MAX_BATCH_SIZE_BYTES {
        return Err(Error::validation_code(
            ValidationErrorCode::PayloadTooLarge,
            format!(
                "Payload size {}KB exceeds {}KB limit",
                body.len() / 1024,
                MAX_BATCH_SIZE_BYTES / 1024
            ),
        )
        .into());
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?;
    let mut records = records(payload)?;

    let total = records.len();
    let truncated = total.saturating_sub(MAX_BATCH_EVENTS);
    records.truncate(MAX_BATCH_EVENTS);
    metrics().events_received.inc_by(total as u64);
    metrics().events_truncated.inc_by(truncated as u64);

    let now = Utc::now();
    let mut skipped = 0;
    let mut canonical: Vec<CanonicalEvent> = Vec::with_capacity(records.len());
    for record in &records {
        match sanitize(record, now) {
            Ok(event) => canonical.push(event),
            Err(rejection) => {
                debug!(reason = %rejection, "Record skipped");
                skipped += 1;
            }
        }
    }

    // One directory lookup per distinct tracking id in the batch.
    let mut tenants: HashMap<String, Option<Tenant>> = HashMap::new();
    for event in &canonical {
        if !tenants.contains_key(&event.tracking_id) {
            let tenant = state.enricher.resolve_tenant(&event.tracking_id).await;
            tenants.insert(event.tracking_id.clone(), tenant);
        }
    }

    let mut events = Vec::with_capacity(canonical.len());
    let mut user = None;
    for event in canonical {
        let Some(Some(tenant)) = tenants.get(&event.tracking_id) else {
            metrics().tenant_rejections.inc();
            skipped += 1;
            continue;
        };
        // Device and geo once per request, only if something is accepted.
        if user.is_none() {
            let ctx = RequestContext {
                ip: ip.clone(),
                user_agent: user_agent.clone(),
            };
            user = Some(state.enricher.snapshot(&ctx).await);
        }
        if let Some(user) = &user {
            events.push(state.enricher.enrich(event, tenant, user));
        }
    }

    let received = events.len();
    metrics().events_accepted.inc_by(received as u64);
    metrics().events_skipped.inc_by(skipped as u64);

    if !events.is_empty() {
        state.dispatcher.spawn_batch(events);
    }

    let latency_ms = start.elapsed().as_millis() as u64;
    metrics().ingest_latency_ms.observe(latency_ms);

    info!(
        received,
        skipped,
        truncated,
        latency_ms,
        "Batch ingested"
    );

    Ok(Json(IngestResponse::new(received, skipped, truncated)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_shapes() {
        assert_eq!(records(json!([{"a": 1}, {"b": 2}])).unwrap().len(), 2);
        assert_eq!(records(json!({"events": [{"a": 1}]})).unwrap().len(), 1);
        assert_eq!(records(json!({"type": "pageview"})).unwrap().len(), 1);
        assert!(records(json!("nope")).is_err());
    }

    #[test]
    fn test_non_array_events_field_is_a_record() {
        let records = records(json!({"type": "custom", "events": 3})).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["events"], 3);
    }
}
