//! Queue job envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{Event, EventType};

/// Delivery priority hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
}

impl Priority {
    /// Pageviews and unloads bound session start and end; deliver them first.
    pub fn for_event(event_type: EventType) -> Self {
        match event_type {
            EventType::Pageview | EventType::Unload => Self::High,
            _ => Self::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Normal => "normal",
        }
    }
}

/// One enriched event on its way through the durable queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub priority: Priority,
    pub enqueued_at: DateTime<Utc>,
    pub event: Event,
}

impl Job {
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            priority: Priority::for_event(event.event_type()),
            enqueued_at: Utc::now(),
            event,
        }
    }

    pub fn partition_key(&self) -> String {
        self.event.partition_key()
    }
}
