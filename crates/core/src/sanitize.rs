//! Validation and sanitization of raw client records.
//!
//! A record either becomes a [`CanonicalEvent`] or is rejected with a
//! [`Rejection`]. Rejections are never fatal to the batch. Everything short
//! of a missing identity field or an unknown type is repaired: strings are
//! truncated, numbers clamped, bad timestamps replaced by the receipt time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::events::{
    CanonicalEvent, ElementInfo, EventData, EventType, PageInfo, Position, Properties,
    RouteChange,
};
use crate::limits::*;

/// Keys with a fixed meaning; everything else on a custom record is a property.
const RESERVED_KEYS: &[&str] = &[
    "tenantId",
    "sessionId",
    "type",
    "timestamp",
    "id",
    "nonce",
    "name",
    "properties",
];

/// Why a record was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unknown event type: {0}")]
    UnknownType(String),
}

/// Sanitize one raw record received at `now`.
pub fn sanitize(raw: &Value, now: DateTime<Utc>) -> Result<CanonicalEvent, Rejection> {
    let obj = raw.as_object().ok_or(Rejection::NotAnObject)?;

    let tracking_id = identity(obj, "tenantId")?;
    let session_id = identity(obj, "sessionId")?;
    let type_name = obj
        .get("type")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(Rejection::MissingField("type"))?;
    let event_type = EventType::parse(type_name)
        .ok_or_else(|| Rejection::UnknownType(truncate(type_name, MAX_TYPE_ECHO_LEN)))?;

    let timestamp = obj
        .get("timestamp")
        .and_then(parse_timestamp)
        .unwrap_or(now);
    let client_id = text(obj, "id", MAX_ID_LEN).or_else(|| text(obj, "nonce", MAX_ID_LEN));

    let data = match event_type {
        EventType::Pageview => pageview(obj),
        EventType::Click => click(obj),
        EventType::Scroll => EventData::Scroll {
            depth: clamp_number(
                obj.get("depth").and_then(number),
                MIN_SCROLL_DEPTH,
                MAX_SCROLL_DEPTH,
            ),
        },
        EventType::Form => EventData::Form {
            form: text(obj, "form", MAX_ID_LEN).or_else(|| text(obj, "formId", MAX_ID_LEN)),
        },
        EventType::Route => route(obj),
        EventType::Unload => EventData::Unload,
        EventType::Custom => EventData::Custom {
            name: text(obj, "name", MAX_CUSTOM_NAME_LEN),
            properties: custom_properties(obj),
        },
    };

    Ok(CanonicalEvent {
        tracking_id,
        session_id,
        client_id,
        timestamp,
        received_at: now,
        data,
    })
}

/// Parse a client timestamp: RFC 3339, RFC 2822, `YYYY-MM-DD[ HH:MM:SS]`,
/// numeric epochs (seconds or milliseconds) and numeric strings.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<f64>() {
        return from_epoch(n);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let millis = if value < EPOCH_SECONDS_THRESHOLD {
        value * 1000.0
    } else {
        value
    };
    if millis > i64::MAX as f64 {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}

fn pageview(obj: &Map<String, Value>) -> EventData {
    let page = obj.get("page").and_then(Value::as_object).unwrap_or(obj);
    let url = text(page, "url", MAX_URL_LEN).unwrap_or_default();
    let path = url_path(&url);

    EventData::Pageview {
        page: PageInfo {
            url,
            path,
            title: text(page, "title", MAX_TITLE_LEN),
            referrer: text(page, "referrer", MAX_REFERRER_LEN),
        },
    }
}

fn click(obj: &Map<String, Value>) -> EventData {
    let mut element = match obj.get("element") {
        Some(Value::Object(el)) => ElementInfo {
            tag: text(el, "tag", MAX_ELEMENT_TAG_LEN),
            id: text(el, "id", MAX_ELEMENT_ID_LEN),
            text: text(el, "text", MAX_CLICK_TEXT_LEN),
        },
        Some(Value::String(tag)) if !tag.trim().is_empty() => ElementInfo {
            tag: Some(truncate(tag.trim(), MAX_ELEMENT_TAG_LEN)),
            id: None,
            text: None,
        },
        _ => ElementInfo::default(),
    };
    if element.text.is_none() {
        element.text = text(obj, "text", MAX_CLICK_TEXT_LEN);
    }

    let position = match obj.get("position").and_then(Value::as_object) {
        Some(pos) => Some(coordinates(pos)),
        None if obj.contains_key("x") || obj.contains_key("y") => Some(coordinates(obj)),
        None => None,
    };

    EventData::Click { element, position }
}

fn coordinates(obj: &Map<String, Value>) -> Position {
    Position {
        x: clamp_number(obj.get("x").and_then(number), MIN_COORDINATE, MAX_COORDINATE),
        y: clamp_number(obj.get("y").and_then(number), MIN_COORDINATE, MAX_COORDINATE),
    }
}

fn route(obj: &Map<String, Value>) -> EventData {
    let route = obj.get("route").and_then(Value::as_object).unwrap_or(obj);
    EventData::Route {
        route: RouteChange {
            from: text(route, "from", MAX_ROUTE_LEN),
            to: text(route, "to", MAX_ROUTE_LEN),
        },
    }
}

/// Explicit `properties` first, then every unreserved top-level field,
/// dropping entries once the serialized map would exceed the cap.
fn custom_properties(obj: &Map<String, Value>) -> Properties {
    let explicit = obj
        .get("properties")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|props| props.iter());
    let extra = obj
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()));

    let mut properties = Properties::new();
    let mut used: usize = 2; // {}
    for (key, value) in explicit.chain(extra) {
        if properties.contains_key(key) {
            continue;
        }
        let value_len = serde_json::to_string(value).map(|s| s.len()).unwrap_or(usize::MAX);
        let cost = key.len().saturating_add(value_len).saturating_add(4);
        if used.saturating_add(cost) > MAX_CUSTOM_PROPERTIES_BYTES {
            continue;
        }
        used += cost;
        properties.insert(key.clone(), value.clone());
    }
    properties
}

fn identity(obj: &Map<String, Value>, key: &'static str) -> Result<String, Rejection> {
    text(obj, key, MAX_ID_LEN).ok_or(Rejection::MissingField(key))
}

/// Non-blank string (or number) field, trimmed and truncated.
fn text(obj: &Map<String, Value>, key: &str, max_chars: usize) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| truncate(s, max_chars))
        }
        Value::Number(n) => Some(truncate(&n.to_string(), max_chars)),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn clamp_number(value: Option<f64>, min: f64, max: f64) -> f64 {
    value
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
        .clamp(min, max)
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn url_path(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        return parsed.path().to_string();
    }
    if url.starts_with('/') {
        let end = url.find(['?', '#']).unwrap_or(url.len());
        return url[..end].to_string();
    }
    String::new()
}
