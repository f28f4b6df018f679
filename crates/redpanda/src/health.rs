//! Redpanda health checks and topic bootstrap.

use std::collections::HashSet;

use engine_core::{Error, Result};
use tracing::{debug, error, info};

use crate::client::connect;
use crate::config::RedpandaConfig;
use crate::topics::{lane_topic_configs, TopicConfig};

/// Topic creation timeout.
const CREATE_TOPIC_TIMEOUT_MS: i32 = 5_000;

/// Check Redpanda connection health.
pub async fn check_connection(config: &RedpandaConfig) -> bool {
    let client = match connect(config).await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Redpanda connection check failed");
            return false;
        }
    };

    match client.list_topics().await {
        Ok(topics) => {
            debug!(topics = topics.len(), "Redpanda connection healthy");
            true
        }
        Err(e) => {
            error!("Failed to list Redpanda topics: {}", e);
            false
        }
    }
}

/// Creates lane topics that do not exist yet. Returns the names created.
pub async fn ensure_lane_topics(config: &RedpandaConfig) -> Result<Vec<String>> {
    let client = connect(config).await?;
    let existing: HashSet<String> = client
        .list_topics()
        .await
        .map_err(|e| Error::queue(format!("Failed to list topics: {}", e)))?
        .into_iter()
        .map(|t| t.name)
        .collect();

    let missing: Vec<TopicConfig> = lane_topic_configs(&config.topic_prefix, config.replication_factor)
        .into_iter()
        .filter(|t| !existing.contains(&t.name))
        .collect();
    if missing.is_empty() {
        return Ok(Vec::new());
    }

    let controller = client
        .controller_client()
        .map_err(|e| Error::queue(format!("Failed to get controller client: {}", e)))?;

    let mut created = Vec::with_capacity(missing.len());
    for topic in missing {
        controller
            .create_topic(
                topic.name.clone(),
                topic.partitions,
                topic.replication_factor,
                CREATE_TOPIC_TIMEOUT_MS,
            )
            .await
            .map_err(|e| Error::queue(format!("Failed to create topic {}: {}", topic.name, e)))?;
        info!(topic = %topic.name, partitions = topic.partitions, "Created lane topic");
        created.push(topic.name);
    }

    Ok(created)
}
