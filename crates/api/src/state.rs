//! Application state shared across handlers.

use std::sync::Arc;

use axum::body::Bytes;
use enrichment::Enricher;
use worker::Dispatcher;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Tenant resolution and client snapshot
    pub enricher: Arc<Enricher>,
    /// Queue submission with fallback
    pub dispatcher: Arc<Dispatcher>,
    /// Tracking script served by `/script.js`, loaded once at startup
    pub script: Bytes,
}

impl AppState {
    pub fn new(enricher: Arc<Enricher>, dispatcher: Arc<Dispatcher>, script: impl Into<Bytes>) -> Self {
        Self {
            enricher,
            dispatcher,
            script: script.into(),
        }
    }
}
