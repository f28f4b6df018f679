//! ClickHouse table schemas.
//!
//! Raw events are append-only:
//! - ReplacingMergeTree keyed on the idempotency key, so redelivered jobs
//!   collapse on merge
//! - LowCardinality for enum-like fields
//! - DateTime64(3) for millisecond precision
//! - Table TTL enforces event retention

/// Raw events table name.
pub const EVENTS_TABLE: &str = "events";

pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", database)
}

/// DDL for the raw events table with the given retention.
pub fn create_events_table(database: &str, ttl_days: u32) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {database}.{table} (
    -- Identity
    event_id String,
    idempotency_key String,
    tenant_id String,
    tracking_id String,
    session_id String,

    -- Classification
    type LowCardinality(String),
    timestamp DateTime64(3),
    received_at DateTime64(3),

    -- Pageview
    url Nullable(String),
    path Nullable(String),
    title Nullable(String),
    referrer Nullable(String),

    -- Click
    element_tag Nullable(String),
    element_id Nullable(String),
    element_text Nullable(String),
    x Nullable(Float64),
    y Nullable(Float64),

    -- Scroll / form / route
    scroll_depth Nullable(Float64),
    form_id Nullable(String),
    route_from Nullable(String),
    route_to Nullable(String),

    -- Custom
    custom_name Nullable(String),
    properties String,

    -- Client snapshot
    ip Nullable(String),
    user_agent Nullable(String),
    browser LowCardinality(String),
    os LowCardinality(String),
    device LowCardinality(String),
    country LowCardinality(String),
    region Nullable(String),
    city Nullable(String)
)
ENGINE = ReplacingMergeTree(received_at)
PARTITION BY toYYYYMM(timestamp)
ORDER BY (tenant_id, timestamp, idempotency_key)
TTL toDateTime(timestamp) + INTERVAL {ttl_days} DAY
SETTINGS index_granularity = 8192
"#,
        table = EVENTS_TABLE
    )
}

/// All DDL statements in execution order.
pub fn all_statements(database: &str, ttl_days: u32) -> Vec<String> {
    vec![
        create_database(database),
        create_events_table(database, ttl_days),
    ]
}
