//! Background workers for the analytics pipeline.
//!
//! - Dispatcher: enqueue with retry, fallback buffer and its flusher
//! - Consumer pool: queue → persist raw event → aggregate session
//! - Retention: session sweep
//! - Scheduler: spawns the above and stops them on shutdown

pub mod aggregator;
pub mod config;
pub mod consumer;
pub mod dispatch;
pub mod processor;
pub mod rate_limit;
pub mod retention;
pub mod retry;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use aggregator::Aggregator;
pub use config::*;
pub use consumer::{ConsumerPool, JobEvent, JobHistory, JobRecord};
pub use dispatch::{DispatchOutcome, DispatchSummary, Dispatcher, FallbackBuffer};
pub use processor::EventProcessor;
pub use rate_limit::RateLimiter;
pub use retention::{RetentionReport, RetentionWorker};
pub use retry::{retry, Backoff};
pub use scheduler::WorkerScheduler;
