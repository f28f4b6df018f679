//! Query functions for reading data back (used in tests and admin).

use crate::client::ClickHouseClient;
use crate::schema::EVENTS_TABLE;
use clickhouse::Row;
use engine_core::{Error, Result};
use serde::Deserialize;

fn query_error(e: clickhouse::error::Error) -> Error {
    Error::internal(format!("Query error: {}", e))
}

/// Query result for event verification.
#[derive(Debug, Clone, Row, Deserialize)]
pub struct QueryEventRow {
    pub event_id: String,
    pub idempotency_key: String,
    pub tenant_id: String,
    pub session_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
}

/// Count events for a tenant, collapsing redeliveries.
pub async fn count_events(client: &ClickHouseClient, tenant_id: &str) -> Result<u64> {
    let sql = format!(
        "SELECT count() FROM {}.{} FINAL WHERE tenant_id = ?",
        client.database(),
        EVENTS_TABLE
    );
    client
        .inner()
        .query(&sql)
        .bind(tenant_id)
        .fetch_one::<u64>()
        .await
        .map_err(query_error)
}

/// Fetch events for one session in timestamp order.
pub async fn query_session_events(
    client: &ClickHouseClient,
    tenant_id: &str,
    session_id: &str,
) -> Result<Vec<QueryEventRow>> {
    let sql = format!(
        "SELECT event_id, idempotency_key, tenant_id, session_id, type FROM {}.{} FINAL \
         WHERE tenant_id = ? AND session_id = ? ORDER BY timestamp",
        client.database(),
        EVENTS_TABLE
    );
    client
        .inner()
        .query(&sql)
        .bind(tenant_id)
        .bind(session_id)
        .fetch_all::<QueryEventRow>()
        .await
        .map_err(query_error)
}

/// Truncate all events (test cleanup).
pub async fn truncate_events(client: &ClickHouseClient) -> Result<()> {
    let sql = format!(
        "TRUNCATE TABLE IF EXISTS {}.{}",
        client.database(),
        EVENTS_TABLE
    );
    client
        .inner()
        .query(&sql)
        .execute()
        .await
        .map_err(query_error)
}
