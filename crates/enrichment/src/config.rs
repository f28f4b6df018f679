//! Enrichment configuration.

use engine_core::Tenant;
use serde::{Deserialize, Serialize};

/// Tenant directory and lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Base URL of the tenant directory. Empty or "static" uses `tenants`.
    #[serde(default)]
    pub directory_url: String,
    /// Directory request timeout in milliseconds
    #[serde(default = "default_directory_timeout_ms")]
    pub directory_timeout_ms: u64,
    /// Directory cache TTL in seconds
    #[serde(default = "default_directory_cache_ttl_secs")]
    pub directory_cache_ttl_secs: u64,
    /// Tenants served when no directory URL is configured
    #[serde(default)]
    pub tenants: Vec<Tenant>,
    #[serde(default)]
    pub geo: GeoConfig,
}

fn default_directory_timeout_ms() -> u64 {
    2000
}

fn default_directory_cache_ttl_secs() -> u64 {
    30
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            directory_url: String::new(),
            directory_timeout_ms: default_directory_timeout_ms(),
            directory_cache_ttl_secs: default_directory_cache_ttl_secs(),
            tenants: Vec::new(),
            geo: GeoConfig::default(),
        }
    }
}

impl EnrichmentConfig {
    pub fn uses_static_directory(&self) -> bool {
        self.directory_url.is_empty() || self.directory_url == "static"
    }
}

/// IP geolocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// ip-api compatible endpoint; the IP is appended as a path segment
    #[serde(default = "default_geo_url")]
    pub base_url: String,
    #[serde(default = "default_geo_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_geo_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_geo_cache_capacity")]
    pub cache_capacity: u64,
}

fn default_true() -> bool {
    true
}

fn default_geo_url() -> String {
    "http://ip-api.com/json".to_string()
}

fn default_geo_timeout_ms() -> u64 {
    1500
}

fn default_geo_cache_ttl_secs() -> u64 {
    3600
}

fn default_geo_cache_capacity() -> u64 {
    50_000
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            base_url: default_geo_url(),
            timeout_ms: default_geo_timeout_ms(),
            cache_ttl_secs: default_geo_cache_ttl_secs(),
            cache_capacity: default_geo_cache_capacity(),
        }
    }
}

impl GeoConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
