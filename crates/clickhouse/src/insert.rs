//! Raw event writes.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use engine_core::{Error, Event, EventData, EventStore, Result, StoreErrorCode};
use serde::Serialize;
use telemetry::health;
use tracing::debug;

use crate::client::ClickHouseClient;
use crate::schema::EVENTS_TABLE;

/// Flattened event row for ClickHouse insertion.
#[derive(Debug, Clone, Row, Serialize)]
pub struct EventRow {
    pub event_id: String,
    pub idempotency_key: String,
    pub tenant_id: String,
    pub tracking_id: String,
    pub session_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: i64, // milliseconds since epoch
    pub received_at: i64,

    pub url: Option<String>,
    pub path: Option<String>,
    pub title: Option<String>,
    pub referrer: Option<String>,

    pub element_tag: Option<String>,
    pub element_id: Option<String>,
    pub element_text: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,

    pub scroll_depth: Option<f64>,
    pub form_id: Option<String>,
    pub route_from: Option<String>,
    pub route_to: Option<String>,

    pub custom_name: Option<String>,
    pub properties: String,

    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub browser: String,
    pub os: String,
    pub device: String,
    pub country: String,
    pub region: Option<String>,
    pub city: Option<String>,
}

impl From<&Event> for EventRow {
    fn from(event: &Event) -> Self {
        let user = &event.user;
        let mut row = EventRow {
            event_id: event.id.to_string(),
            idempotency_key: event.idempotency_key.to_string(),
            tenant_id: event.tenant_id.clone(),
            tracking_id: event.tracking_id.clone(),
            session_id: event.session_id.clone(),
            event_type: event.event_type().to_string(),
            timestamp: event.timestamp.timestamp_millis(),
            received_at: event.received_at.timestamp_millis(),

            url: None,
            path: None,
            title: None,
            referrer: None,

            element_tag: None,
            element_id: None,
            element_text: None,
            x: None,
            y: None,

            scroll_depth: None,
            form_id: None,
            route_from: None,
            route_to: None,

            custom_name: None,
            properties: "{}".to_string(),

            ip: user.ip.clone(),
            user_agent: user.user_agent.clone(),
            browser: user.browser.clone(),
            os: user.os.clone(),
            device: user.device.clone(),
            country: user.country.clone(),
            region: user.region.clone(),
            city: user.city.clone(),
        };

        match &event.data {
            EventData::Pageview { page } => {
                row.url = Some(page.url.clone());
                row.path = Some(page.path.clone());
                row.title = page.title.clone();
                row.referrer = page.referrer.clone();
            }
            EventData::Click { element, position } => {
                row.element_tag = element.tag.clone();
                row.element_id = element.id.clone();
                row.element_text = element.text.clone();
                if let Some(pos) = position {
                    row.x = Some(pos.x);
                    row.y = Some(pos.y);
                }
            }
            EventData::Scroll { depth } => row.scroll_depth = Some(*depth),
            EventData::Form { form } => row.form_id = form.clone(),
            EventData::Route { route } => {
                row.route_from = route.from.clone();
                row.route_to = route.to.clone();
            }
            EventData::Unload => {}
            EventData::Custom { name, properties } => {
                row.custom_name = name.clone();
                row.properties = serde_json::Value::Object(properties.clone()).to_string();
            }
        }

        row
    }
}

fn write_error(e: impl std::fmt::Display) -> Error {
    Error::storage(StoreErrorCode::EventWrite, e.to_string())
}

/// Raw event store over the ClickHouse `events` table.
#[derive(Clone)]
pub struct ClickHouseEventStore {
    client: ClickHouseClient,
}

impl ClickHouseEventStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ClickHouseClient {
        &self.client
    }
}

#[async_trait]
impl EventStore for ClickHouseEventStore {
    async fn insert(&self, event: &Event) -> Result<()> {
        let start = Instant::now();
        let row = EventRow::from(event);

        let result = async {
            let mut insert = self.client.inner().insert(EVENTS_TABLE).map_err(write_error)?;
            insert.write(&row).await.map_err(write_error)?;
            insert.end().await.map_err(write_error)
        }
        .await;

        match &result {
            Ok(()) => health().clickhouse.set_healthy(),
            Err(e) => health().clickhouse.set_unhealthy(e.to_string()),
        }
        result?;

        debug!(
            event_id = %event.id,
            latency_ms = %start.elapsed().as_millis(),
            "Inserted event into ClickHouse"
        );
        Ok(())
    }

    /// Expiry is the table TTL's job; nothing to delete here.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        debug!(cutoff = %cutoff, "Raw events expire through the table TTL");
        Ok(0)
    }
}
