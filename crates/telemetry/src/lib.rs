//! Telemetry for the analytics pipeline.
//!
//! Structured logs through `tracing`, plus process-global counters and a
//! component health registry surfaced on the health endpoints.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
