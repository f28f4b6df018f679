//! Mock implementations for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use engine_core::{Checkpoint, Error, Job, JobBatch, JobQueue, JobSource, MemoryQueue, Result};
use parking_lot::Mutex;

/// Queue that records every job it accepts and can be switched off.
///
/// Accepted jobs are forwarded to an inner [`MemoryQueue`], so the same
/// instance also serves as the consumer pool's [`JobSource`].
#[derive(Clone, Default)]
pub struct FlakyQueue {
    inner: Arc<MemoryQueue>,
    jobs: Arc<Mutex<Vec<Job>>>,
    down: Arc<AtomicBool>,
}

impl FlakyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every job accepted so far.
    pub fn captured_jobs(&self) -> Vec<Job> {
        self.jobs.lock().clone()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Jobs accepted but not yet fetched by a consumer.
    pub fn pending(&self) -> usize {
        self.inner.len()
    }

    /// Reject every enqueue while `down` is set.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobQueue for FlakyQueue {
    async fn enqueue(&self, job: &Job) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::queue("mock queue is down"));
        }
        self.inner.enqueue(job).await?;
        self.jobs.lock().push(job.clone());
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobSource for FlakyQueue {
    async fn fetch(&self, max: usize) -> Result<JobBatch> {
        self.inner.fetch(max).await
    }

    async fn commit(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.inner.commit(checkpoint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn test_flaky_queue_captures_jobs() {
        let queue = FlakyQueue::new();
        let job = Job::new(fixtures::event("T1", "S1", 1_000));

        queue.enqueue(&job).await.unwrap();
        assert_eq!(queue.job_count(), 1);
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.captured_jobs()[0].id, job.id);

        let batch = queue.fetch(10).await.unwrap();
        assert_eq!(batch.jobs.len(), 1);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_flaky_queue_failure_mode() {
        let queue = FlakyQueue::new();
        queue.set_down(true);

        let job = Job::new(fixtures::event("T1", "S1", 1_000));
        let err = queue.enqueue(&job).await.unwrap_err();
        assert!(err.is_transient());
        assert!(!queue.is_healthy());
        assert_eq!(queue.job_count(), 0);
    }
}
