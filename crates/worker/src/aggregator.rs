//! Folds events into their sessions.

use std::sync::Arc;

use engine_core::{Event, Result, SessionStore, SessionUpdate};
use telemetry::metrics;
use tracing::warn;

/// Applies each event to its session through the store's atomic upsert.
#[derive(Clone)]
pub struct Aggregator {
    sessions: Arc<dyn SessionStore>,
}

impl Aggregator {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self { sessions }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub async fn apply(&self, event: &Event) -> Result<()> {
        let update = SessionUpdate::from_event(event);
        match self.sessions.apply(&update).await {
            Ok(()) => {
                metrics().sessions_updated.inc();
                Ok(())
            }
            Err(e) => {
                metrics().session_store_errors.inc();
                warn!(
                    tenant_id = %update.tenant_id,
                    session_id = %update.session_id,
                    error = %e,
                    "Session update failed"
                );
                Err(e)
            }
        }
    }
}
