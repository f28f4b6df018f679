//! Dispatch of enriched events to the durable queue, with an in-process
//! fallback buffer for when the queue is unreachable.
//!
//! Buffered events live only in memory and are lost on restart.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use engine_core::{Event, Job, JobQueue};
use parking_lot::Mutex;
use serde::Serialize;
use telemetry::metrics;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::DispatchConfig;
use crate::processor::EventProcessor;
use crate::retry::retry;

/// Where a dispatched event ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchOutcome {
    /// Durably accepted by the queue.
    Queued,
    /// Held in the fallback buffer for direct processing.
    Buffered,
    /// Fallback buffer full; the event is lost.
    Dropped,
}

/// Outcome counts for one dispatched batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub queued: usize,
    pub buffered: usize,
    pub dropped: usize,
}

impl DispatchSummary {
    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Queued => self.queued += 1,
            DispatchOutcome::Buffered => self.buffered += 1,
            DispatchOutcome::Dropped => self.dropped += 1,
        }
    }
}

/// Bounded FIFO of events waiting for direct processing.
pub struct FallbackBuffer {
    events: Mutex<VecDeque<Event>>,
    capacity: usize,
}

impl FallbackBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Appends unless full. A full buffer rejects the incoming event.
    pub fn push(&self, event: Event) -> bool {
        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            return false;
        }
        events.push_back(event);
        metrics().fallback_depth.set(events.len() as u64);
        true
    }

    /// Removes up to `max` events from the front.
    pub fn drain(&self, max: usize) -> Vec<Event> {
        let mut events = self.events.lock();
        let n = max.min(events.len());
        let drained: Vec<Event> = events.drain(..n).collect();
        metrics().fallback_depth.set(events.len() as u64);
        drained
    }

    /// Puts unprocessed events back at the front, preserving their order.
    /// May exceed capacity; these events were already accepted once.
    pub fn requeue_front(&self, remainder: Vec<Event>) {
        let mut events = self.events.lock();
        for event in remainder.into_iter().rev() {
            events.push_front(event);
        }
        metrics().fallback_depth.set(events.len() as u64);
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Submits jobs to the queue with bounded retry, falling back to the buffer.
pub struct Dispatcher {
    queue: Arc<dyn JobQueue>,
    processor: EventProcessor,
    fallback: FallbackBuffer,
    config: DispatchConfig,
    in_flight: Mutex<JoinSet<()>>,
}

impl Dispatcher {
    pub fn new(queue: Arc<dyn JobQueue>, processor: EventProcessor, config: DispatchConfig) -> Self {
        let fallback = FallbackBuffer::new(config.fallback_capacity);
        Self {
            queue,
            processor,
            fallback,
            config,
            in_flight: Mutex::new(JoinSet::new()),
        }
    }

    pub fn fallback(&self) -> &FallbackBuffer {
        &self.fallback
    }

    /// Dispatch one event.
    pub async fn dispatch(&self, event: Event) -> DispatchOutcome {
        let job = Job::new(event);
        let start = Instant::now();

        let queue = &self.queue;
        let job_ref = &job;
        let result = retry(
            self.config.attempts,
            self.config.backoff(),
            |attempt, e| {
                metrics().enqueue_retries.inc();
                warn!(job_id = %job_ref.id, attempt, error = %e, "Enqueue failed, retrying");
            },
            move || queue.enqueue(job_ref),
        )
        .await;

        match result {
            Ok(()) => {
                metrics().jobs_enqueued.inc();
                metrics()
                    .enqueue_latency_ms
                    .observe(start.elapsed().as_millis() as u64);
                debug!(job_id = %job.id, priority = job.priority.as_str(), "Job enqueued");
                DispatchOutcome::Queued
            }
            Err(e) => {
                metrics().enqueue_errors.inc();
                warn!(job_id = %job.id, error = %e, "Queue unavailable, using fallback buffer");
                self.buffer(job.event)
            }
        }
    }

    /// Dispatch a batch in order. Once the queue has failed, the rest of the
    /// batch goes straight to the fallback buffer.
    pub async fn dispatch_batch(&self, events: Vec<Event>) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let mut queue_down = false;

        for event in events {
            let outcome = if queue_down {
                self.buffer(event)
            } else {
                self.dispatch(event).await
            };
            queue_down = outcome != DispatchOutcome::Queued;
            summary.record(outcome);
        }

        if summary.buffered > 0 || summary.dropped > 0 {
            info!(
                queued = summary.queued,
                buffered = summary.buffered,
                dropped = summary.dropped,
                "Batch dispatched with fallback"
            );
        }
        summary
    }

    /// Dispatch a batch in the background. The task is tracked so shutdown
    /// can wait for it with [`Dispatcher::wait_dispatches`].
    pub fn spawn_batch(self: &Arc<Self>, events: Vec<Event>) {
        let dispatcher = Arc::clone(self);
        let mut in_flight = self.in_flight.lock();
        while let Some(done) = in_flight.try_join_next() {
            if let Err(e) = done {
                error!(error = %e, "Dispatch task failed");
            }
        }
        in_flight.spawn(async move {
            dispatcher.dispatch_batch(events).await;
        });
    }

    /// Number of background dispatches not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Wait for every background dispatch, including ones spawned while
    /// waiting. Call before signalling the flusher to stop so late
    /// fallbacks are still drained.
    pub async fn wait_dispatches(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.in_flight.lock());
            if tasks.is_empty() {
                return;
            }
            debug!(pending = tasks.len(), "Waiting for in-flight dispatches");
            while let Some(done) = tasks.join_next().await {
                if let Err(e) = done {
                    error!(error = %e, "Dispatch task failed");
                }
            }
        }
    }

    fn buffer(&self, event: Event) -> DispatchOutcome {
        let event_id = event.id;
        if self.fallback.push(event) {
            metrics().fallback_buffered.inc();
            DispatchOutcome::Buffered
        } else {
            metrics().fallback_dropped.inc();
            error!(
                event_id = %event_id,
                capacity = self.fallback.capacity(),
                "Fallback buffer full, dropping event"
            );
            DispatchOutcome::Dropped
        }
    }

    /// One drain pass: process up to `drain_batch` buffered events directly.
    /// On a failure the unprocessed remainder goes back to the front.
    pub async fn flush_fallback(&self) -> usize {
        let mut batch = self.fallback.drain(self.config.drain_batch);
        if batch.is_empty() {
            return 0;
        }

        let mut flushed = 0;
        let mut failed_at = None;
        for (i, event) in batch.iter().enumerate() {
            if let Err(e) = self.processor.process(event).await {
                warn!(
                    error = %e,
                    remaining = batch.len() - i,
                    "Fallback flush failed, requeueing remainder"
                );
                failed_at = Some(i);
                break;
            }
            flushed += 1;
        }
        if let Some(i) = failed_at {
            self.fallback.requeue_front(batch.split_off(i));
        }

        metrics().fallback_flushed.inc_by(flushed as u64);
        debug!(flushed, depth = self.fallback.len(), "Fallback buffer flushed");
        flushed
    }

    /// Flush until the buffer is empty or a pass makes no progress.
    pub async fn drain_fallback(&self) -> usize {
        let mut total = 0;
        loop {
            let flushed = self.flush_fallback().await;
            total += flushed;
            if flushed == 0 || self.fallback.is_empty() {
                return total;
            }
        }
    }

    /// Periodic flusher. Drains once more on shutdown.
    pub async fn run_flusher(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.drain_interval());
        info!(
            interval_ms = self.config.drain_interval_ms,
            drain_batch = self.config.drain_batch,
            "Fallback flusher started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_fallback().await;
                }
                _ = shutdown.changed() => break,
            }
        }

        let flushed = self.drain_fallback().await;
        let left = self.fallback.len();
        if left > 0 {
            error!(flushed, left, "Fallback buffer not fully drained at shutdown");
        } else {
            info!(flushed, "Fallback buffer drained at shutdown");
        }
    }
}
