//! Retention sweep.
//!
//! Raw events expire through the ClickHouse table TTL, so the event store's
//! purge usually reports nothing. Sessions have no native TTL and are deleted
//! here once their start time falls outside the horizon.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use engine_core::{EventStore, Result, RetentionPolicy, SessionStore};
use serde::Serialize;
use telemetry::metrics;
use tracing::{info, warn};

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetentionReport {
    pub events_purged: u64,
    pub sessions_purged: u64,
}

/// Deletes data older than the retention horizons.
pub struct RetentionWorker {
    events: Arc<dyn EventStore>,
    sessions: Arc<dyn SessionStore>,
    policy: RetentionPolicy,
}

impl RetentionWorker {
    pub fn new(
        events: Arc<dyn EventStore>,
        sessions: Arc<dyn SessionStore>,
        policy: RetentionPolicy,
    ) -> Self {
        Self {
            events,
            sessions,
            policy,
        }
    }

    pub async fn run(&self) -> Result<RetentionReport> {
        self.run_at(Utc::now()).await
    }

    /// Sweep relative to `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RetentionReport> {
        let event_cutoff = self.policy.event_cutoff(now);
        let session_cutoff = self.policy.session_cutoff(now);

        // A failed event purge must not block the session sweep.
        let events_purged = match self.events.purge_before(event_cutoff).await {
            Ok(n) => n,
            Err(e) => {
                warn!(cutoff = %event_cutoff, error = %e, "Event purge failed");
                0
            }
        };

        let sessions_purged = self.sessions.purge_started_before(session_cutoff).await?;
        metrics().sessions_purged.inc_by(sessions_purged);

        info!(
            event_cutoff = %event_cutoff,
            session_cutoff = %session_cutoff,
            events_purged,
            sessions_purged,
            "Retention sweep complete"
        );

        Ok(RetentionReport {
            events_purged,
            sessions_purged,
        })
    }
}
