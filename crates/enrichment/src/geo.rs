//! Coarse IP geolocation over HTTP.

use std::net::IpAddr;
use std::time::Duration;

use engine_core::{Error, GeoInfo, Result};
use moka::future::Cache;
use serde::Deserialize;
use telemetry::metrics;
use tracing::debug;

use crate::config::GeoConfig;

/// ip-api style response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeoResponse {
    status: String,
    country: Option<String>,
    region_name: Option<String>,
    city: Option<String>,
    message: Option<String>,
}

/// Resolves client IPs to country, region and city.
///
/// Never fails: local addresses map to `Local`, and any lookup problem
/// (timeout, non-2xx, bad body, `fail` status) maps to `Unknown`.
#[derive(Clone)]
pub struct GeoLocator {
    base_url: String,
    enabled: bool,
    http_client: reqwest::Client,
    cache: Cache<IpAddr, GeoInfo>,
}

impl GeoLocator {
    pub fn new(config: &GeoConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            enabled: config.enabled,
            http_client,
            cache: Cache::builder()
                .max_capacity(config.cache_capacity)
                .time_to_live(Duration::from_secs(config.cache_ttl_secs))
                .build(),
        })
    }

    pub async fn locate(&self, ip: Option<&str>) -> GeoInfo {
        let Some(ip) = ip.and_then(|raw| raw.trim().parse::<IpAddr>().ok()) else {
            return GeoInfo::unknown();
        };
        if is_local(&ip) {
            return GeoInfo::local();
        }
        if !self.enabled {
            return GeoInfo::unknown();
        }

        if let Some(cached) = self.cache.get(&ip).await {
            return cached;
        }

        match self.remote_locate(ip).await {
            Ok(geo) => {
                self.cache.insert(ip, geo.clone()).await;
                geo
            }
            Err(e) => {
                metrics().geo_lookup_errors.inc();
                debug!(ip = %ip, error = %e, "Geo lookup failed");
                GeoInfo::unknown()
            }
        }
    }

    async fn remote_locate(&self, ip: IpAddr) -> Result<GeoInfo> {
        let url = format!(
            "{}/{}?fields=status,message,country,regionName,city",
            self.base_url, ip
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::lookup(format!("geo service unavailable: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::lookup(format!(
                "geo service returned {}",
                response.status()
            )));
        }

        let body: GeoResponse = response
            .json()
            .await
            .map_err(|e| Error::lookup(format!("invalid geo response: {}", e)))?;

        if body.status != "success" {
            return Err(Error::lookup(format!(
                "geo lookup status {}: {}",
                body.status,
                body.message.unwrap_or_default()
            )));
        }

        Ok(GeoInfo {
            country: body
                .country
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| GeoInfo::unknown().country),
            region: body.region_name.filter(|r| !r.is_empty()),
            city: body.city.filter(|c| !c.is_empty()),
        })
    }
}

/// Loopback, private, link-local and unspecified addresses.
pub fn is_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_local(&IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local
                || (first & 0xffc0) == 0xfe80 // link-local
        }
    }
}
