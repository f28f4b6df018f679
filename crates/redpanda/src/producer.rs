//! Job producer over Redpanda lane topics.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use engine_core::{Error, Job, JobQueue, Priority, Result};
use rskafka::client::{partition::PartitionClient, Client};
use rskafka::record::Record;
use telemetry::{health, metrics};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::client::{compression, connect, lane_partition};
use crate::config::RedpandaConfig;
use crate::topics::lane_topic;

/// Header carrying the priority hint.
const PRIORITY_HEADER: &str = "priority";

/// Durable job queue backed by two Redpanda topics.
pub struct RedpandaQueue {
    config: RedpandaConfig,
    client: RwLock<Option<Arc<Client>>>,
    /// Cached partition clients per lane topic
    partitions: RwLock<BTreeMap<String, Arc<PartitionClient>>>,
}

impl RedpandaQueue {
    pub fn new(config: RedpandaConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
            partitions: RwLock::new(BTreeMap::new()),
        }
    }

    async fn get_partition(&self, topic: &str) -> Result<Arc<PartitionClient>> {
        {
            let partitions = self.partitions.read().await;
            if let Some(partition) = partitions.get(topic) {
                return Ok(partition.clone());
            }
        }

        let client = {
            let mut guard = self.client.write().await;
            match guard.as_ref() {
                Some(client) => client.clone(),
                None => {
                    let client = Arc::new(connect(&self.config).await?);
                    *guard = Some(client.clone());
                    client
                }
            }
        };

        let partition = lane_partition(&client, topic).await?;
        self.partitions
            .write()
            .await
            .insert(topic.to_string(), partition.clone());
        Ok(partition)
    }

    /// Drops cached connections so the next send reconnects.
    async fn reset(&self) {
        *self.client.write().await = None;
        self.partitions.write().await.clear();
    }

    fn encode(job: &Job) -> Result<Record> {
        let payload = serde_json::to_vec(job)?;
        let mut headers = BTreeMap::new();
        headers.insert(
            PRIORITY_HEADER.to_string(),
            job.priority.as_str().as_bytes().to_vec(),
        );

        Ok(Record {
            key: Some(job.partition_key().into_bytes()),
            value: Some(payload),
            headers,
            timestamp: Utc::now(),
        })
    }

    pub fn topic_for(&self, lane: Priority) -> String {
        lane_topic(&self.config.topic_prefix, lane)
    }
}

#[async_trait]
impl JobQueue for RedpandaQueue {
    async fn enqueue(&self, job: &Job) -> Result<()> {
        let topic = self.topic_for(job.priority);
        let record = Self::encode(job)?;
        let start = Instant::now();

        let partition = self.get_partition(&topic).await.inspect_err(|e| {
            health().queue.set_unhealthy(e.to_string());
        })?;

        if let Err(e) = partition
            .produce(vec![record], compression(&self.config.compression))
            .await
        {
            warn!(topic = %topic, job_id = %job.id, error = %e, "Failed to produce job");
            health().queue.set_unhealthy(e.to_string());
            self.reset().await;
            return Err(Error::queue(format!("Failed to produce: {}", e)));
        }

        health().queue.set_healthy();
        let elapsed = start.elapsed();
        metrics()
            .enqueue_latency_ms
            .observe(elapsed.as_millis() as u64);
        debug!(
            topic = %topic,
            job_id = %job.id,
            latency_ms = %elapsed.as_millis(),
            "Job produced"
        );
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        health().queue.is_healthy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{CanonicalEvent, Event, EventData, Tenant, UserSnapshot};

    fn job(data: EventData) -> Job {
        let now = Utc::now();
        Job::new(Event::enriched(
            CanonicalEvent {
                tracking_id: "T1".to_string(),
                session_id: "S1".to_string(),
                client_id: None,
                timestamp: now,
                received_at: now,
                data,
            },
            &Tenant::new("P1", "T1"),
            UserSnapshot::default(),
        ))
    }

    #[test]
    fn test_record_encoding() {
        let job = job(EventData::Unload);
        let record = RedpandaQueue::encode(&job).unwrap();

        assert_eq!(record.key.as_deref(), Some("P1:S1".as_bytes()));
        assert_eq!(
            record.headers.get(PRIORITY_HEADER).map(Vec::as_slice),
            Some("high".as_bytes())
        );
        let decoded: Job = serde_json::from_slice(record.value.as_deref().unwrap()).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn test_lane_routing() {
        let queue = RedpandaQueue::new(RedpandaConfig::default());
        assert_eq!(queue.topic_for(Priority::High), "jobs_priority");
        assert_eq!(queue.topic_for(Priority::Normal), "jobs_standard");
    }
}
