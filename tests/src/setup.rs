//! Common test setup functions.

use std::sync::Arc;
use std::time::Duration;

use api::{router, AppState};
use axum::Router;
use axum_test::TestServer;
use engine_core::{MemoryEventStore, MemorySessionStore, Session, SessionKey, SessionStore};
use enrichment::{Enricher, GeoConfig, GeoLocator, StaticTenantDirectory};
use worker::{
    Aggregator, ConsumerPool, DispatchConfig, Dispatcher, EventProcessor, JobOptions, PoolConfig,
};

use crate::fixtures;
use crate::mocks::FlakyQueue;

/// Served by `/script.js` in tests.
pub const TEST_SCRIPT: &str = "/* tracker */";

/// Pipeline wired against in-memory backends.
///
/// This exercises the production code paths:
/// - The real Axum router with all layers
/// - The real dispatcher, fallback buffer and consumer pool
/// - `FlakyQueue`, which implements the same queue traits as Redpanda
/// - Memory event and session stores with the same traits as ClickHouse and PostgreSQL
pub struct TestContext {
    pub queue: FlakyQueue,
    pub events: Arc<MemoryEventStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub pool: Arc<ConsumerPool>,
    pub router: Router,
}

impl TestContext {
    pub fn new() -> Self {
        let queue = FlakyQueue::new();
        let events = Arc::new(MemoryEventStore::new());
        let sessions = Arc::new(MemorySessionStore::new());

        let processor = EventProcessor::new(events.clone(), Aggregator::new(sessions.clone()));

        // Short backoffs keep failure paths fast.
        let dispatch = DispatchConfig {
            attempts: 2,
            backoff_ms: 1,
            ..Default::default()
        };
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(queue.clone()),
            processor.clone(),
            dispatch,
        ));

        // One job at a time so session folds follow queue order.
        let pool_config = PoolConfig {
            concurrency: 1,
            job: JobOptions {
                backoff_ms: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let pool = Arc::new(ConsumerPool::new(
            Arc::new(queue.clone()),
            processor,
            pool_config,
        ));

        let geo = GeoLocator::new(&GeoConfig::disabled()).expect("Failed to create geo locator");
        let directory = Arc::new(StaticTenantDirectory::new(fixtures::tenants()));
        let enricher = Arc::new(Enricher::new(directory, geo));

        let state = AppState::new(enricher, dispatcher.clone(), TEST_SCRIPT);
        let router = router(state);

        Self {
            queue,
            events,
            sessions,
            dispatcher,
            pool,
            router,
        }
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.router.clone()).expect("Failed to create test server")
    }

    /// Wait until `n` events have left the background dispatch, either
    /// into the queue or into the fallback buffer.
    pub async fn wait_for_dispatch(&self, n: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.queue.job_count() + self.dispatcher.fallback().len() < n {
            assert!(
                tokio::time::Instant::now() < deadline,
                "Timed out waiting for {} dispatched events",
                n
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Run the consumer pool until the queue is empty.
    pub async fn process_all(&self) -> usize {
        let mut total = 0;
        loop {
            let processed = self.pool.run_once().await.expect("Consumer batch failed");
            if processed == 0 {
                return total;
            }
            total += processed;
        }
    }

    /// Dispatch-wait and consume in one step.
    pub async fn settle(&self, n: usize) -> usize {
        self.wait_for_dispatch(n).await;
        self.process_all().await
    }

    pub async fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions
            .get(&SessionKey::new(fixtures::TENANT_ID, session_id))
            .await
            .expect("Session lookup failed")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
