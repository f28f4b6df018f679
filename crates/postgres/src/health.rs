//! Pool setup, health checks, and schema bootstrap.

use std::time::Duration;

use engine_core::{Error, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, error, info};

use crate::config::PostgresConfig;
use crate::schema::all_statements;

/// Open a connection pool. Connections are established lazily.
pub fn connect(config: &PostgresConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_lazy(&config.url)
        .map_err(|e| Error::internal(format!("Invalid PostgreSQL URL: {}", e)))?;

    info!(
        max_connections = config.max_connections,
        "Created PostgreSQL pool"
    );
    Ok(pool)
}

/// Check PostgreSQL connection health.
pub async fn check_connection(pool: &PgPool) -> bool {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => {
            debug!("PostgreSQL connection healthy");
            true
        }
        Err(e) => {
            error!("PostgreSQL health check failed: {}", e);
            false
        }
    }
}

/// Create the sessions table and its indexes.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    for ddl in all_statements() {
        sqlx::query(&ddl)
            .execute(pool)
            .await
            .map_err(|e| Error::internal(format!("Failed to execute DDL: {}", e)))?;
    }

    debug!("PostgreSQL schema initialized");
    Ok(())
}
