//! Durable job queue over Redpanda for the analytics pipeline.

pub mod client;
pub mod config;
pub mod consumer;
pub mod health;
pub mod producer;
pub mod topics;

pub use config::*;
pub use consumer::*;
pub use health::{check_connection, ensure_lane_topics};
pub use producer::*;
pub use topics::*;
