//! Event type definitions for the pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tenant::Tenant;

/// Namespace for deterministic idempotency keys.
const IDEMPOTENCY_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0x1d, 0x3f, 0x0e, 0x52, 0x8a, 0x4c, 0x17, 0x9e, 0x44, 0x0b, 0x7a, 0x25, 0xc1, 0x90, 0xd3,
]);

/// Event type enum for fast matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Pageview,
    Click,
    Scroll,
    Form,
    Route,
    Unload,
    Custom,
}

impl EventType {
    pub const ALL: [EventType; 7] = [
        Self::Pageview,
        Self::Click,
        Self::Scroll,
        Self::Form,
        Self::Route,
        Self::Unload,
        Self::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pageview => "pageview",
            Self::Click => "click",
            Self::Scroll => "scroll",
            Self::Form => "form",
            Self::Route => "route",
            Self::Unload => "unload",
            Self::Custom => "custom",
        }
    }

    /// Parse a wire type name. `event` is accepted as an alias of `custom`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pageview" => Some(Self::Pageview),
            "click" => Some(Self::Click),
            "scroll" => Some(Self::Scroll),
            "form" => Some(Self::Form),
            "route" => Some(Self::Route),
            "unload" => Some(Self::Unload),
            "custom" | "event" => Some(Self::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page details for pageview events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub url: String,
    /// Path component of `url`, empty when the url does not parse.
    #[serde(default)]
    pub path: String,
    pub title: Option<String>,
    pub referrer: Option<String>,
}

/// Clicked element description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub text: Option<String>,
}

/// Pixel coordinates for click events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Client-side navigation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteChange {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Opaque custom event properties.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Type-specific event data, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventData {
    Pageview {
        page: PageInfo,
    },
    Click {
        element: ElementInfo,
        position: Option<Position>,
    },
    Scroll {
        depth: f64,
    },
    Form {
        form: Option<String>,
    },
    Route {
        route: RouteChange,
    },
    Unload,
    Custom {
        name: Option<String>,
        #[serde(default)]
        properties: Properties,
    },
}

impl EventData {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Pageview { .. } => EventType::Pageview,
            Self::Click { .. } => EventType::Click,
            Self::Scroll { .. } => EventType::Scroll,
            Self::Form { .. } => EventType::Form,
            Self::Route { .. } => EventType::Route,
            Self::Unload => EventType::Unload,
            Self::Custom { .. } => EventType::Custom,
        }
    }

    /// The page url for pageview events.
    pub fn page_url(&self) -> Option<&str> {
        match self {
            Self::Pageview { page } => Some(page.url.as_str()),
            _ => None,
        }
    }
}

/// Browser, OS and device class derived from the user agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub browser: String,
    pub os: String,
    pub device: String,
}

impl DeviceInfo {
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn unknown() -> Self {
        Self {
            browser: Self::UNKNOWN.to_string(),
            os: Self::UNKNOWN.to_string(),
            device: Self::UNKNOWN.to_string(),
        }
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Coarse location derived from the client IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub country: String,
    pub region: Option<String>,
    pub city: Option<String>,
}

impl GeoInfo {
    pub fn unknown() -> Self {
        Self {
            country: "Unknown".to_string(),
            region: None,
            city: None,
        }
    }

    /// Loopback, private and link-local addresses.
    pub fn local() -> Self {
        Self {
            country: "Local".to_string(),
            region: None,
            city: None,
        }
    }
}

impl Default for GeoInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Client snapshot captured at receipt time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub browser: String,
    pub os: String,
    pub device: String,
    pub country: String,
    pub city: Option<String>,
    pub region: Option<String>,
}

impl UserSnapshot {
    pub fn new(
        ip: Option<String>,
        user_agent: Option<String>,
        device: DeviceInfo,
        geo: GeoInfo,
    ) -> Self {
        Self {
            ip,
            user_agent,
            browser: device.browser,
            os: device.os,
            device: device.device,
            country: geo.country,
            city: geo.city,
            region: geo.region,
        }
    }
}

impl Default for UserSnapshot {
    fn default() -> Self {
        Self::new(None, None, DeviceInfo::unknown(), GeoInfo::unknown())
    }
}

/// A sanitized client record, before tenant resolution and enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEvent {
    pub tracking_id: String,
    pub session_id: String,
    /// Client-supplied event id or nonce, when present.
    pub client_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub data: EventData,
}

impl CanonicalEvent {
    pub fn event_type(&self) -> EventType {
        self.data.event_type()
    }
}

/// An enriched, immutable event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Server-assigned event ID
    pub id: Uuid,
    /// Deterministic key used to collapse redeliveries in the raw store
    pub idempotency_key: Uuid,
    /// Resolved project id
    pub tenant_id: String,
    /// Public id the client sent
    pub tracking_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub data: EventData,
    pub user: UserSnapshot,
}

impl Event {
    /// Builds the enriched event for a resolved tenant.
    ///
    /// Without a client id or nonce the server id doubles as the
    /// idempotency key; it travels inside the job, so redeliveries still
    /// collapse while distinct emissions never share a key.
    pub fn enriched(canonical: CanonicalEvent, tenant: &Tenant, user: UserSnapshot) -> Self {
        let id = Uuid::new_v4();
        let idempotency_key = match canonical.client_id.as_deref() {
            Some(client_id) => idempotency_key(
                &tenant.id,
                &canonical.session_id,
                canonical.event_type(),
                canonical.timestamp,
                client_id,
            ),
            None => id,
        };

        Self {
            id,
            idempotency_key,
            tenant_id: tenant.id.clone(),
            tracking_id: canonical.tracking_id,
            session_id: canonical.session_id,
            timestamp: canonical.timestamp,
            received_at: canonical.received_at,
            data: canonical.data,
            user,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.data.event_type()
    }

    /// Partition key keeping one session's events on one partition.
    pub fn partition_key(&self) -> String {
        format!("{}:{}", self.tenant_id, self.session_id)
    }
}

/// Deterministic key over the fields that identify one client emission.
pub fn idempotency_key(
    tenant_id: &str,
    session_id: &str,
    event_type: EventType,
    timestamp: DateTime<Utc>,
    client_id: &str,
) -> Uuid {
    let name = format!(
        "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
        tenant_id,
        session_id,
        event_type.as_str(),
        timestamp.timestamp_millis(),
        client_id
    );
    Uuid::new_v5(&IDEMPOTENCY_NAMESPACE, name.as_bytes())
}
