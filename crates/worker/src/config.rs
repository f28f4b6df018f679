//! Worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::retry::Backoff;

/// Dispatcher and fallback buffer settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchConfig {
    /// Enqueue attempts before an event falls back to the buffer.
    #[serde(default = "default_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub attempts: u32,

    /// Delay before the first retry; doubles on each further retry.
    #[serde(default = "default_backoff_ms")]
    #[validate(range(min = 1))]
    pub backoff_ms: u64,

    #[serde(default = "default_fallback_capacity")]
    #[validate(range(min = 1))]
    pub fallback_capacity: usize,

    /// Events drained from the fallback buffer per flush.
    #[serde(default = "default_drain_batch")]
    #[validate(range(min = 1))]
    pub drain_batch: usize,

    #[serde(default = "default_drain_interval_ms")]
    #[validate(range(min = 10))]
    pub drain_interval_ms: u64,
}

fn default_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    100
}

fn default_fallback_capacity() -> usize {
    10_000
}

fn default_drain_batch() -> usize {
    100
}

fn default_drain_interval_ms() -> u64 {
    1000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
            fallback_capacity: default_fallback_capacity(),
            drain_batch: default_drain_batch(),
            drain_interval_ms: default_drain_interval_ms(),
        }
    }
}

impl DispatchConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::exponential(Duration::from_millis(self.backoff_ms))
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}

/// Per-job retry and history options.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JobOptions {
    #[serde(default = "default_attempts")]
    #[validate(range(min = 1, max = 20))]
    pub attempts: u32,

    #[serde(default = "default_backoff_ms")]
    #[validate(range(min = 1))]
    pub backoff_ms: u64,

    /// Completed job records kept in the in-process history.
    #[serde(default = "default_keep_completed")]
    pub keep_completed: usize,

    /// Failed job records kept in the in-process history.
    #[serde(default = "default_keep_failed")]
    pub keep_failed: usize,
}

fn default_keep_completed() -> usize {
    100
}

fn default_keep_failed() -> usize {
    500
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff_ms: default_backoff_ms(),
            keep_completed: default_keep_completed(),
            keep_failed: default_keep_failed(),
        }
    }
}

impl JobOptions {
    pub fn backoff(&self) -> Backoff {
        Backoff::exponential(Duration::from_millis(self.backoff_ms))
    }
}

/// Token bucket limit: at most `max_jobs` per `window_ms`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_jobs")]
    #[validate(range(min = 1))]
    pub max_jobs: u32,

    #[serde(default = "default_window_ms")]
    #[validate(range(min = 1))]
    pub window_ms: u64,
}

fn default_max_jobs() -> u32 {
    1000
}

fn default_window_ms() -> u64 {
    1000
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_jobs: default_max_jobs(),
            window_ms: default_window_ms(),
        }
    }
}

/// Consumer pool settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PoolConfig {
    /// Jobs processed concurrently.
    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1, max = 1024))]
    pub concurrency: usize,

    /// Jobs fetched per batch.
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1))]
    pub batch_size: usize,

    /// Pause after an empty fetch or a source error.
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    #[serde(default)]
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    #[validate(nested)]
    pub job: JobOptions,
}

fn default_concurrency() -> usize {
    10
}

fn default_batch_size() -> usize {
    100
}

fn default_idle_backoff_ms() -> u64 {
    250
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            idle_backoff_ms: default_idle_backoff_ms(),
            rate_limit: RateLimitConfig::default(),
            job: JobOptions::default(),
        }
    }
}

impl PoolConfig {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

/// Background worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WorkerConfig {
    #[serde(default)]
    #[validate(nested)]
    pub pool: PoolConfig,

    #[serde(default)]
    #[validate(nested)]
    pub dispatch: DispatchConfig,

    /// Session retention sweep interval.
    #[serde(default = "default_retention_interval_secs")]
    #[validate(range(min = 1))]
    pub retention_interval_secs: u64,
}

fn default_retention_interval_secs() -> u64 {
    3600
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            dispatch: DispatchConfig::default(),
            retention_interval_secs: default_retention_interval_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.retention_interval_secs)
    }
}
