//! Redpanda configuration.

use serde::{Deserialize, Serialize};

/// Connection and producer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,
    /// Lane topics are `<prefix>_priority` and `<prefix>_standard`
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    /// SASL/SCRAM username; enables TLS when set with a password
    #[serde(default)]
    pub sasl_username: Option<String>,
    #[serde(default)]
    pub sasl_password: Option<String>,
    /// Compression type (none, gzip, snappy, lz4, zstd)
    #[serde(default = "default_compression")]
    pub compression: String,
    /// Replication factor used when creating missing topics
    #[serde(default = "default_replication_factor")]
    pub replication_factor: i16,
    #[serde(default)]
    pub consumer: ConsumerConfig,
}

fn default_brokers() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}

fn default_topic_prefix() -> String {
    "jobs".to_string()
}

fn default_compression() -> String {
    "lz4".to_string()
}

fn default_replication_factor() -> i16 {
    1
}

impl Default for RedpandaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            topic_prefix: default_topic_prefix(),
            sasl_username: None,
            sasl_password: None,
            compression: default_compression(),
            replication_factor: default_replication_factor(),
            consumer: ConsumerConfig::default(),
        }
    }
}

impl RedpandaConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }

    /// Username and password when both are configured.
    pub fn sasl_credentials(&self) -> Option<(&str, &str)> {
        match (&self.sasl_username, &self.sasl_password) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

/// Where a lane starts reading when the process starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StartOffset {
    Earliest,
    #[default]
    Latest,
}

/// Consumer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Maximum time a fetch waits for records, in milliseconds
    #[serde(default = "default_fetch_wait_ms")]
    pub fetch_wait_ms: u64,
    /// Upper bound on bytes per fetch
    #[serde(default = "default_fetch_max_bytes")]
    pub fetch_max_bytes: i32,
    #[serde(default)]
    pub start_offset: StartOffset,
}

fn default_fetch_wait_ms() -> u64 {
    500
}

fn default_fetch_max_bytes() -> i32 {
    4 * 1024 * 1024
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            fetch_wait_ms: default_fetch_wait_ms(),
            fetch_max_bytes: default_fetch_max_bytes(),
            start_offset: StartOffset::default(),
        }
    }
}
