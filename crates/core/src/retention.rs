//! Retention policy definitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long raw events and sessions are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Raw event retention in days (storage TTL)
    #[serde(default = "default_event_ttl_days")]
    pub event_ttl_days: u32,
    /// Session retention in days, counted from session start
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: u32,
}

fn default_event_ttl_days() -> u32 {
    90
}

fn default_session_ttl_days() -> u32 {
    365
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            event_ttl_days: default_event_ttl_days(),
            session_ttl_days: default_session_ttl_days(),
        }
    }
}

impl RetentionPolicy {
    /// Events with a timestamp before this instant are expired.
    pub fn event_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.event_ttl_days))
    }

    /// Sessions started before this instant are expired.
    pub fn session_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.session_ttl_days))
    }
}
