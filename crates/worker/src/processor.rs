//! Per-event processing shared by the consumer pool and the fallback flusher.

use std::sync::Arc;

use engine_core::{Event, EventStore, Result};
use telemetry::metrics;
use tracing::warn;

use crate::aggregator::Aggregator;

/// Persists the raw event, then folds it into its session.
#[derive(Clone)]
pub struct EventProcessor {
    events: Arc<dyn EventStore>,
    aggregator: Aggregator,
}

impl EventProcessor {
    pub fn new(events: Arc<dyn EventStore>, aggregator: Aggregator) -> Self {
        Self { events, aggregator }
    }

    pub fn event_store(&self) -> &Arc<dyn EventStore> {
        &self.events
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub async fn process(&self, event: &Event) -> Result<()> {
        if let Err(e) = self.events.insert(event).await {
            metrics().event_store_errors.inc();
            warn!(event_id = %event.id, error = %e, "Raw event write failed");
            return Err(e);
        }
        metrics().events_persisted.inc();

        self.aggregator.apply(event).await
    }
}
