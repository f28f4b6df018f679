//! Durable queue seams and the in-memory queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::job::{Job, Priority};

/// Producer side of the durable queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit one job. Errors mean the job was not durably accepted.
    async fn enqueue(&self, job: &Job) -> Result<()>;

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Position reached in one priority lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneOffset {
    pub lane: Priority,
    /// Next offset to read after this batch.
    pub next: i64,
}

/// What to commit once every job in a batch has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub lanes: Vec<LaneOffset>,
}

impl Checkpoint {
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

/// A fetched batch of jobs.
#[derive(Debug, Default)]
pub struct JobBatch {
    pub jobs: Vec<Job>,
    pub checkpoint: Checkpoint,
    /// Records that could not be decoded into jobs.
    pub undecodable: usize,
}

impl JobBatch {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty() && self.undecodable == 0
    }
}

/// Consumer side of the durable queue.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Fetch up to `max` jobs, high priority first.
    async fn fetch(&self, max: usize) -> Result<JobBatch>;

    /// Acknowledge everything up to the checkpoint.
    async fn commit(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Drop cached connections after repeated fetch failures.
    async fn reset(&self) {}
}

#[derive(Default)]
struct Lanes {
    high: VecDeque<Job>,
    normal: VecDeque<Job>,
}

/// In-process queue with two priority lanes.
///
/// Jobs are removed on fetch, so commit is a no-op. Availability can be
/// toggled to exercise the dispatcher's fallback path.
pub struct MemoryQueue {
    lanes: Mutex<Lanes>,
    available: AtomicBool,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(Lanes::default()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        let lanes = self.lanes.lock();
        lanes.high.len() + lanes.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: &Job) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::queue("memory queue unavailable"));
        }
        let mut lanes = self.lanes.lock();
        match job.priority {
            Priority::High => lanes.high.push_back(job.clone()),
            Priority::Normal => lanes.normal.push_back(job.clone()),
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobSource for MemoryQueue {
    async fn fetch(&self, max: usize) -> Result<JobBatch> {
        let mut lanes = self.lanes.lock();
        let mut jobs = Vec::with_capacity(max.min(lanes.high.len() + lanes.normal.len()));
        while jobs.len() < max {
            match lanes.high.pop_front().or_else(|| lanes.normal.pop_front()) {
                Some(job) => jobs.push(job),
                None => break,
            }
        }
        Ok(JobBatch {
            jobs,
            ..Default::default()
        })
    }

    async fn commit(&self, _checkpoint: &Checkpoint) -> Result<()> {
        Ok(())
    }
}
