//! Job consumer over Redpanda lane topics.
//!
//! Uses rskafka with:
//! - Manual offset management per lane for at-least-once delivery
//! - The priority lane drained before the standard lane on every fetch
//! - JSON deserialization of `Job` records; undecodable records are skipped

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use engine_core::{Checkpoint, Error, Job, JobBatch, JobSource, LaneOffset, Priority, Result};
use rskafka::client::partition::{OffsetAt, PartitionClient};
use rskafka::record::RecordAndOffset;
use telemetry::metrics;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::client::{connect, lane_partition};
use crate::config::{RedpandaConfig, StartOffset};
use crate::topics::{lane_topic, LANES};

/// Read position in one lane topic.
struct Lane {
    priority: Priority,
    topic: String,
    partition: RwLock<Option<Arc<PartitionClient>>>,
    /// Next offset to read
    offset: AtomicI64,
    initialized: AtomicBool,
}

impl Lane {
    fn new(prefix: &str, priority: Priority) -> Self {
        Self {
            priority,
            topic: lane_topic(prefix, priority),
            partition: RwLock::new(None),
            offset: AtomicI64::new(-1),
            initialized: AtomicBool::new(false),
        }
    }
}

/// Job source reading both lane topics.
pub struct RedpandaJobSource {
    config: RedpandaConfig,
    lanes: Vec<Lane>,
}

impl RedpandaJobSource {
    pub fn new(config: RedpandaConfig) -> Self {
        info!(
            prefix = %config.topic_prefix,
            brokers = %config.broker_string(),
            start = ?config.consumer.start_offset,
            "Creating Redpanda job source"
        );
        let lanes = LANES
            .iter()
            .map(|&priority| Lane::new(&config.topic_prefix, priority))
            .collect();
        Self { config, lanes }
    }

    async fn ensure_connected(&self, lane: &Lane) -> Result<Arc<PartitionClient>> {
        {
            let partition = lane.partition.read().await;
            if let Some(ref p) = *partition {
                return Ok(p.clone());
            }
        }

        let client = connect(&self.config).await?;
        let partition = lane_partition(&client, &lane.topic).await?;

        if !lane.initialized.load(Ordering::SeqCst) {
            let at = match self.config.consumer.start_offset {
                StartOffset::Earliest => OffsetAt::Earliest,
                StartOffset::Latest => OffsetAt::Latest,
            };
            let offset = partition
                .get_offset(at)
                .await
                .map_err(|e| Error::queue(format!("Failed to get offset: {}", e)))?;

            lane.offset.store(offset, Ordering::SeqCst);
            lane.initialized.store(true, Ordering::SeqCst);

            info!(topic = %lane.topic, offset, "Lane initialized at offset");
        }

        *lane.partition.write().await = Some(partition.clone());
        Ok(partition)
    }

    /// Reads up to `max` jobs from one lane, starting at its committed offset.
    async fn fetch_lane(&self, lane: &Lane, max: usize, wait_ms: i32) -> Result<(Vec<Job>, usize, Option<i64>)> {
        let partition = self.ensure_connected(lane).await?;
        let current = lane.offset.load(Ordering::SeqCst);

        let (records, _high_watermark) = partition
            .fetch_records(current, 1..self.config.consumer.fetch_max_bytes, wait_ms)
            .await
            .map_err(|e| {
                error!(topic = %lane.topic, "Fetch error: {}", e);
                Error::queue(format!("Failed to fetch records: {}", e))
            })?;

        let (jobs, undecodable, next) = decode_records(records, max);
        if undecodable > 0 {
            warn!(topic = %lane.topic, count = undecodable, "Skipped undecodable records");
        }
        Ok((jobs, undecodable, next))
    }
}

/// Decodes records in offset order, stopping after `max` jobs.
///
/// Returns the jobs, the number of undecodable records passed over, and the
/// next offset to read.
fn decode_records(mut records: Vec<RecordAndOffset>, max: usize) -> (Vec<Job>, usize, Option<i64>) {
    records.sort_by_key(|r| r.offset);

    let mut jobs = Vec::with_capacity(max.min(records.len()));
    let mut undecodable = 0;
    let mut next = None;

    for record in records {
        if jobs.len() >= max {
            break;
        }
        next = Some(record.offset + 1);

        let decoded = record
            .record
            .value
            .as_deref()
            .map(serde_json::from_slice::<Job>);
        match decoded {
            Some(Ok(job)) => jobs.push(job),
            Some(Err(e)) => {
                undecodable += 1;
                debug!(offset = record.offset, error = %e, "Failed to deserialize job");
            }
            None => undecodable += 1,
        }
    }

    (jobs, undecodable, next)
}

#[async_trait]
impl JobSource for RedpandaJobSource {
    async fn fetch(&self, max: usize) -> Result<JobBatch> {
        let mut batch = JobBatch::default();
        let wait_ms = i32::try_from(self.config.consumer.fetch_wait_ms).unwrap_or(i32::MAX);

        for lane in &self.lanes {
            let remaining = max.saturating_sub(batch.jobs.len());
            if remaining == 0 {
                break;
            }
            // Only block on the last lane; earlier lanes are polled.
            let wait = if lane.priority == Priority::High { 0 } else { wait_ms };

            let (jobs, undecodable, next) = self.fetch_lane(lane, remaining, wait).await?;
            batch.jobs.extend(jobs);
            batch.undecodable += undecodable;
            if let Some(next) = next {
                batch.checkpoint.lanes.push(LaneOffset {
                    lane: lane.priority,
                    next,
                });
            }
        }

        if batch.undecodable > 0 {
            metrics().consumer_errors.inc_by(batch.undecodable as u64);
        }
        Ok(batch)
    }

    async fn commit(&self, checkpoint: &Checkpoint) -> Result<()> {
        for position in &checkpoint.lanes {
            if let Some(lane) = self.lanes.iter().find(|l| l.priority == position.lane) {
                let prev = lane.offset.swap(position.next, Ordering::SeqCst);
                debug!(
                    topic = %lane.topic,
                    prev_offset = prev,
                    new_offset = position.next,
                    "Committed offset"
                );
            }
        }
        Ok(())
    }

    async fn reset(&self) {
        for lane in &self.lanes {
            *lane.partition.write().await = None;
        }
        info!("Consumer connections reset");
    }
}
