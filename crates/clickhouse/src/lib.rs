//! ClickHouse raw event store for the analytics pipeline.

pub mod client;
pub mod config;
pub mod health;
pub mod insert;
pub mod query;
pub mod schema;

pub use client::*;
pub use config::*;
pub use health::{check_connection, init_schema};
pub use insert::{ClickHouseEventStore, EventRow};
pub use query::*;
