//! PostgreSQL session store for the analytics pipeline.

pub mod config;
pub mod health;
pub mod schema;
pub mod store;

pub use config::*;
pub use health::{check_connection, connect, init_schema};
pub use store::PostgresSessionStore;
