//! Event builders for unit tests.

use chrono::{DateTime, Utc};
use engine_core::{CanonicalEvent, ElementInfo, Event, EventData, PageInfo, Tenant, UserSnapshot};

pub fn event(session_id: &str, timestamp: DateTime<Utc>, data: EventData) -> Event {
    Event::enriched(
        CanonicalEvent {
            tracking_id: "T1".to_string(),
            session_id: session_id.to_string(),
            client_id: None,
            timestamp,
            received_at: Utc::now(),
            data,
        },
        &Tenant::new("P1", "T1"),
        UserSnapshot::default(),
    )
}

pub fn pageview(session_id: &str) -> Event {
    event(
        session_id,
        Utc::now(),
        EventData::Pageview {
            page: PageInfo {
                url: "https://example.com/".to_string(),
                path: "/".to_string(),
                title: None,
                referrer: None,
            },
        },
    )
}

pub fn click(session_id: &str) -> Event {
    event(
        session_id,
        Utc::now(),
        EventData::Click {
            element: ElementInfo::default(),
            position: None,
        },
    )
}
