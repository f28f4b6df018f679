//! In-process metrics collection.
//!
//! Counters are process-global atomics, read through [`Metrics::snapshot`]
//! by the health endpoint and periodic log lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    // Ingestion
    pub batches_received: Counter,
    pub events_received: Counter,
    pub events_accepted: Counter,
    pub events_skipped: Counter,
    pub events_truncated: Counter,
    pub tenant_rejections: Counter,

    // Enrichment lookups
    pub tenant_lookup_errors: Counter,
    pub geo_lookup_errors: Counter,

    // Dispatch
    pub jobs_enqueued: Counter,
    pub enqueue_retries: Counter,
    pub enqueue_errors: Counter,
    pub fallback_buffered: Counter,
    pub fallback_dropped: Counter,
    pub fallback_flushed: Counter,
    pub fallback_depth: Gauge,

    // Consumer pool
    pub jobs_started: Counter,
    pub jobs_completed: Counter,
    pub jobs_retried: Counter,
    pub jobs_failed: Counter,
    pub jobs_in_flight: Gauge,
    pub consumer_errors: Counter,

    // Storage
    pub events_persisted: Counter,
    pub event_store_errors: Counter,
    pub sessions_updated: Counter,
    pub session_store_errors: Counter,
    pub sessions_purged: Counter,

    // Latency histograms
    pub ingest_latency_ms: Histogram,
    pub enqueue_latency_ms: Histogram,
    pub job_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub batches_received: u64,
    pub events_received: u64,
    pub events_accepted: u64,
    pub events_skipped: u64,
    pub events_truncated: u64,
    pub jobs_enqueued: u64,
    pub enqueue_errors: u64,
    pub fallback_buffered: u64,
    pub fallback_dropped: u64,
    pub fallback_depth: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_in_flight: u64,
    pub events_persisted: u64,
    pub sessions_updated: u64,
    pub ingest_latency_mean_ms: f64,
    pub job_latency_mean_ms: f64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            batches_received: self.batches_received.get(),
            events_received: self.events_received.get(),
            events_accepted: self.events_accepted.get(),
            events_skipped: self.events_skipped.get(),
            events_truncated: self.events_truncated.get(),
            jobs_enqueued: self.jobs_enqueued.get(),
            enqueue_errors: self.enqueue_errors.get(),
            fallback_buffered: self.fallback_buffered.get(),
            fallback_dropped: self.fallback_dropped.get(),
            fallback_depth: self.fallback_depth.get(),
            jobs_completed: self.jobs_completed.get(),
            jobs_failed: self.jobs_failed.get(),
            jobs_in_flight: self.jobs_in_flight.get(),
            events_persisted: self.events_persisted.get(),
            sessions_updated: self.sessions_updated.get(),
            ingest_latency_mean_ms: self.ingest_latency_ms.mean(),
            job_latency_mean_ms: self.job_latency_ms.mean(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
