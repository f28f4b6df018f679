//! Priority lane topics.
//!
//! The priority hint on a job is realised as two topics. The consumer drains
//! the priority lane before the standard lane on every fetch.

use engine_core::Priority;

/// Topic suffix per lane.
pub mod suffix {
    pub const PRIORITY: &str = "priority";
    pub const STANDARD: &str = "standard";
}

/// Topic name for a lane.
pub fn lane_topic(prefix: &str, lane: Priority) -> String {
    let suffix = match lane {
        Priority::High => suffix::PRIORITY,
        Priority::Normal => suffix::STANDARD,
    };
    format!("{}_{}", prefix, suffix)
}

/// Lanes in drain order.
pub const LANES: [Priority; 2] = [Priority::High, Priority::Normal];

/// Topic configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i16,
}

impl TopicConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: 1,
            replication_factor: 1,
        }
    }

    pub fn with_replication(mut self, factor: i16) -> Self {
        self.replication_factor = factor;
        self
    }
}

/// Configurations for both lane topics.
///
/// One partition per lane keeps a session's events in arrival order.
pub fn lane_topic_configs(prefix: &str, replication_factor: i16) -> Vec<TopicConfig> {
    LANES
        .iter()
        .map(|&lane| TopicConfig::new(lane_topic(prefix, lane)).with_replication(replication_factor))
        .collect()
}
