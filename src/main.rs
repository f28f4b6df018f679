//! Analytics Pipeline
//!
//! Behavioral event ingestion and session aggregation:
//! - Record validation, sanitization and enrichment
//! - Redpanda job queue with priority lanes and an in-process fallback buffer
//! - Consumer pool persisting raw events to ClickHouse and sessions to PostgreSQL
//! - Background retention sweep

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use validator::Validate;

use api::{router, AppState};
use clickhouse_client::{ClickHouseClient, ClickHouseConfig, ClickHouseEventStore};
use engine_core::{
    EventStore, JobQueue, JobSource, MemoryEventStore, MemoryQueue, MemorySessionStore,
    RetentionPolicy, SessionStore,
};
use enrichment::{Enricher, EnrichmentConfig};
use postgres_client::{PostgresConfig, PostgresSessionStore};
use redpanda::{RedpandaConfig, RedpandaJobSource, RedpandaQueue};
use telemetry::{health, init_tracing_from_env};
use worker::{
    Aggregator, ConsumerPool, Dispatcher, EventProcessor, RetentionWorker, WorkerConfig,
    WorkerScheduler,
};

/// Storage and queue backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Backend {
    /// Redpanda, ClickHouse and PostgreSQL
    External,
    /// In-process queue and stores, for local development
    Memory,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default = "default_backend")]
    backend: Backend,

    /// Tracking script served by `/script.js`
    #[serde(default = "default_script_path")]
    script_path: String,

    #[serde(default)]
    redpanda: RedpandaConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    postgres: PostgresConfig,

    #[serde(default)]
    enrichment: EnrichmentConfig,

    #[serde(default)]
    worker: WorkerConfig,

    #[serde(default)]
    retention: RetentionPolicy,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_backend() -> Backend {
    Backend::External
}

fn default_script_path() -> String {
    "assets/tracker.js".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backend: default_backend(),
            script_path: default_script_path(),
            redpanda: RedpandaConfig::default(),
            clickhouse: ClickHouseConfig::default(),
            postgres: PostgresConfig::default(),
            enrichment: EnrichmentConfig::default(),
            worker: WorkerConfig::default(),
            retention: RetentionPolicy::default(),
        }
    }
}

/// Queue and store handles for the selected backend.
struct Backends {
    queue: Arc<dyn JobQueue>,
    source: Arc<dyn JobSource>,
    events: Arc<dyn EventStore>,
    sessions: Arc<dyn SessionStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider BEFORE any TLS operations
    // rustls 0.23+ requires explicit crypto provider selection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }

    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Analytics Pipeline v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config
        .worker
        .validate()
        .context("Invalid worker configuration")?;

    let backends = match config.backend {
        Backend::External => external_backends(&config).await?,
        Backend::Memory => memory_backends(),
    };
    info!(backend = ?config.backend, "Backends ready");

    let enricher = Arc::new(
        Enricher::from_config(&config.enrichment).context("Failed to create enricher")?,
    );

    let processor = EventProcessor::new(
        backends.events.clone(),
        Aggregator::new(backends.sessions.clone()),
    );
    let dispatcher = Arc::new(Dispatcher::new(
        backends.queue.clone(),
        processor.clone(),
        config.worker.dispatch.clone(),
    ));
    let pool = Arc::new(ConsumerPool::new(
        backends.source.clone(),
        processor,
        config.worker.pool.clone(),
    ));
    let retention = RetentionWorker::new(
        backends.events.clone(),
        backends.sessions.clone(),
        config.retention,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = WorkerScheduler::new(
        config.worker.clone(),
        pool,
        dispatcher.clone(),
        retention,
    );
    let worker_handles = scheduler.start(shutdown_rx);

    let script = tokio::fs::read(&config.script_path)
        .await
        .with_context(|| format!("Failed to read tracking script {}", config.script_path))?;

    let state = AppState::new(enricher, dispatcher.clone(), script);
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutting down...");

    // Dispatches still retrying may yet fall back to the buffer, so they
    // must finish before the flusher's final drain.
    dispatcher.wait_dispatches().await;

    // Stop workers; the flusher drains the fallback buffer on the way out.
    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        if let Err(e) = handle.await {
            error!("Worker task failed: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from defaults, `config/default.toml` and the environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables, e.g. PIPELINE__POSTGRES__URL
        .add_source(
            config::Environment::with_prefix("PIPELINE")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("redpanda.brokers")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Connect to Redpanda, ClickHouse and PostgreSQL.
async fn external_backends(config: &Config) -> Result<Backends> {
    // Redpanda
    if redpanda::check_connection(&config.redpanda).await {
        health().queue.set_healthy();
        info!("Redpanda connection: healthy");
        if let Err(e) = redpanda::ensure_lane_topics(&config.redpanda).await {
            error!("Failed to ensure lane topics: {}", e);
        }
    } else {
        health().queue.set_unhealthy("Connection failed");
        error!("Redpanda connection: unhealthy");
    }

    // ClickHouse
    let clickhouse = ClickHouseClient::new(config.clickhouse.clone());
    if clickhouse_client::check_connection(&clickhouse).await {
        health().clickhouse.set_healthy();
        info!("ClickHouse connection: healthy");
        if let Err(e) =
            clickhouse_client::init_schema(&clickhouse, config.retention.event_ttl_days).await
        {
            // Continue anyway - schema might already exist
            error!("Failed to initialize ClickHouse schema: {}", e);
        }
    } else {
        health().clickhouse.set_unhealthy("Connection failed");
        error!("ClickHouse connection: unhealthy");
    }

    // PostgreSQL
    let pool = postgres_client::connect(&config.postgres).context("Failed to create PostgreSQL pool")?;
    if postgres_client::check_connection(&pool).await {
        health().postgres.set_healthy();
        info!("PostgreSQL connection: healthy");
        postgres_client::init_schema(&pool)
            .await
            .context("Failed to initialize PostgreSQL schema")?;
    } else {
        health().postgres.set_unhealthy("Connection failed");
        error!("PostgreSQL connection: unhealthy");
    }

    Ok(Backends {
        queue: Arc::new(RedpandaQueue::new(config.redpanda.clone())),
        source: Arc::new(RedpandaJobSource::new(config.redpanda.clone())),
        events: Arc::new(ClickHouseEventStore::new(clickhouse)),
        sessions: Arc::new(PostgresSessionStore::new(pool)),
    })
}

fn memory_backends() -> Backends {
    let queue = Arc::new(MemoryQueue::new());
    health().queue.set_healthy();
    health().clickhouse.set_healthy();
    health().postgres.set_healthy();
    warn!("Using in-memory backends; nothing survives a restart");

    Backends {
        queue: queue.clone(),
        source: queue,
        events: Arc::new(MemoryEventStore::new()),
        sessions: Arc::new(MemorySessionStore::new()),
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
