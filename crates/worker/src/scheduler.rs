//! Worker scheduler for background tasks.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::config::WorkerConfig;
use crate::consumer::ConsumerPool;
use crate::dispatch::Dispatcher;
use crate::retention::RetentionWorker;

/// Starts and owns the background tasks: consumer pool, fallback flusher,
/// retention sweep.
pub struct WorkerScheduler {
    config: WorkerConfig,
    pool: Arc<ConsumerPool>,
    dispatcher: Arc<Dispatcher>,
    retention: Arc<RetentionWorker>,
}

impl WorkerScheduler {
    pub fn new(
        config: WorkerConfig,
        pool: Arc<ConsumerPool>,
        dispatcher: Arc<Dispatcher>,
        retention: RetentionWorker,
    ) -> Self {
        Self {
            config,
            pool,
            dispatcher,
            retention: Arc::new(retention),
        }
    }

    /// Spawn all workers. They stop when `shutdown` flips to true.
    pub fn start(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        handles.push(tokio::spawn(self.pool.clone().run(shutdown.clone())));
        info!("Consumer pool started");

        handles.push(tokio::spawn(
            self.dispatcher.clone().run_flusher(shutdown.clone()),
        ));

        let retention = self.retention.clone();
        let period = self.config.retention_interval();
        let mut stop = shutdown;
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = retention.run().await {
                            error!("Retention worker error: {}", e);
                        }
                    }
                    _ = stop.changed() => break,
                }
            }
        }));

        info!("Background workers started");
        handles
    }
}
