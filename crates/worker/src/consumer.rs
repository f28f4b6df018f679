//! Consumer pool: fetch jobs from the durable queue, process them with
//! bounded concurrency and rate, commit once the batch is finished.
//!
//! Delivery is at-least-once: offsets are committed only after every job in
//! the fetched batch has completed or terminally failed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use engine_core::{Error, Job, JobSource, Result};
use parking_lot::Mutex;
use serde::Serialize;
use telemetry::metrics;
use tokio::sync::{broadcast, watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::PoolConfig;
use crate::processor::EventProcessor;
use crate::rate_limit::RateLimiter;
use crate::retry::retry;

const JOB_EVENT_CAPACITY: usize = 1024;

/// Job lifecycle notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobEvent {
    Started {
        job_id: Uuid,
    },
    Completed {
        job_id: Uuid,
        duration_ms: u64,
    },
    Retrying {
        job_id: Uuid,
        attempt: u32,
        error: String,
    },
    Failed {
        job_id: Uuid,
        attempts: u32,
        error: String,
    },
}

/// A finished job kept in the in-process history.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub event_id: Uuid,
    pub tenant_id: String,
    pub finished_at: DateTime<Utc>,
    pub error: Option<String>,
}

/// Bounded history of completed and failed jobs.
pub struct JobHistory {
    completed: Mutex<VecDeque<JobRecord>>,
    failed: Mutex<VecDeque<JobRecord>>,
    keep_completed: usize,
    keep_failed: usize,
}

fn push_bounded(records: &Mutex<VecDeque<JobRecord>>, record: JobRecord, keep: usize) {
    if keep == 0 {
        return;
    }
    let mut records = records.lock();
    if records.len() >= keep {
        records.pop_front();
    }
    records.push_back(record);
}

impl JobHistory {
    pub fn new(keep_completed: usize, keep_failed: usize) -> Self {
        Self {
            completed: Mutex::new(VecDeque::new()),
            failed: Mutex::new(VecDeque::new()),
            keep_completed,
            keep_failed,
        }
    }

    fn record_completed(&self, record: JobRecord) {
        push_bounded(&self.completed, record, self.keep_completed);
    }

    fn record_failed(&self, record: JobRecord) {
        push_bounded(&self.failed, record, self.keep_failed);
    }

    pub fn completed(&self) -> Vec<JobRecord> {
        self.completed.lock().iter().cloned().collect()
    }

    pub fn failed(&self) -> Vec<JobRecord> {
        self.failed.lock().iter().cloned().collect()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.lock().len()
    }
}

/// Worker pool draining a [`JobSource`].
pub struct ConsumerPool {
    source: Arc<dyn JobSource>,
    processor: EventProcessor,
    limiter: RateLimiter,
    permits: Arc<Semaphore>,
    events: broadcast::Sender<JobEvent>,
    history: JobHistory,
    config: PoolConfig,
}

impl ConsumerPool {
    pub fn new(source: Arc<dyn JobSource>, processor: EventProcessor, config: PoolConfig) -> Self {
        let (events, _) = broadcast::channel(JOB_EVENT_CAPACITY);
        Self {
            source,
            processor,
            limiter: RateLimiter::new(&config.rate_limit),
            permits: Arc::new(Semaphore::new(config.concurrency)),
            events,
            history: JobHistory::new(config.job.keep_completed, config.job.keep_failed),
            config,
        }
    }

    /// Receive job lifecycle notifications from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn history(&self) -> &JobHistory {
        &self.history
    }

    fn publish(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Main loop: fetch, process, commit, until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            concurrency = self.config.concurrency,
            batch_size = self.config.batch_size,
            max_jobs = self.config.rate_limit.max_jobs,
            window_ms = self.config.rate_limit.window_ms,
            "Consumer pool starting"
        );

        while !*shutdown.borrow() {
            let idle = match self.run_once().await {
                Ok(0) => true,
                Ok(count) => {
                    debug!(count, "Processed batch");
                    false
                }
                Err(e) => {
                    metrics().consumer_errors.inc();
                    error!("Batch processing error: {}", e);
                    self.source.reset().await;
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.idle_backoff()) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }

        info!("Consumer pool stopped");
    }

    /// Fetch one batch, run every job, then commit. Returns jobs processed.
    pub async fn run_once(self: &Arc<Self>) -> Result<usize> {
        let batch = self.source.fetch(self.config.batch_size).await?;

        if batch.undecodable > 0 {
            metrics().consumer_errors.inc_by(batch.undecodable as u64);
            warn!(count = batch.undecodable, "Skipped undecodable queue records");
        }
        if batch.is_empty() {
            return Ok(0);
        }

        let count = batch.jobs.len();
        let mut tasks = JoinSet::new();
        for job in batch.jobs {
            self.limiter.acquire().await;
            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| Error::internal("Consumer pool closed"))?;

            let pool = Arc::clone(self);
            tasks.spawn(async move {
                let _permit = permit;
                pool.run_job(job).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Job task panicked: {}", e);
            }
        }

        if !batch.checkpoint.is_empty() {
            self.source.commit(&batch.checkpoint).await?;
        }
        Ok(count)
    }

    async fn run_job(&self, job: Job) {
        let start = Instant::now();
        metrics().jobs_started.inc();
        metrics().jobs_in_flight.inc();
        self.publish(JobEvent::Started { job_id: job.id });

        let options = &self.config.job;
        let processor = &self.processor;
        let event = &job.event;
        let result = retry(
            options.attempts,
            options.backoff(),
            |attempt, e| {
                metrics().jobs_retried.inc();
                warn!(job_id = %job.id, attempt, error = %e, "Job failed, retrying");
                self.publish(JobEvent::Retrying {
                    job_id: job.id,
                    attempt,
                    error: e.to_string(),
                });
            },
            move || processor.process(event),
        )
        .await;

        metrics().jobs_in_flight.dec();
        let duration_ms = start.elapsed().as_millis() as u64;
        metrics().job_latency_ms.observe(duration_ms);

        let record = |error: Option<String>| JobRecord {
            job_id: job.id,
            event_id: job.event.id,
            tenant_id: job.event.tenant_id.clone(),
            finished_at: Utc::now(),
            error,
        };

        match result {
            Ok(()) => {
                metrics().jobs_completed.inc();
                self.history.record_completed(record(None));
                self.publish(JobEvent::Completed {
                    job_id: job.id,
                    duration_ms,
                });
            }
            Err(e) => {
                metrics().jobs_failed.inc();
                error!(
                    job_id = %job.id,
                    event_id = %job.event.id,
                    tenant_id = %job.event.tenant_id,
                    attempts = options.attempts,
                    error = %e,
                    "Job failed permanently"
                );
                self.history.record_failed(record(Some(e.to_string())));
                self.publish(JobEvent::Failed {
                    job_id: job.id,
                    attempts: options.attempts,
                    error: e.to_string(),
                });
            }
        }
    }
}
