//! Turns sanitized records into enriched events.

use std::sync::Arc;
use std::time::Duration;

use engine_core::{is_valid_tracking_id, CanonicalEvent, Event, Result, Tenant, UserSnapshot};
use telemetry::metrics;
use tracing::{debug, warn};

use crate::config::EnrichmentConfig;
use crate::device::DeviceParser;
use crate::directory::{HttpTenantDirectory, StaticTenantDirectory, TenantDirectory};
use crate::geo::GeoLocator;

/// Client details shared by every record in one request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Resolves tenants and attaches the client snapshot.
pub struct Enricher {
    directory: Arc<dyn TenantDirectory>,
    devices: DeviceParser,
    geo: GeoLocator,
}

impl Enricher {
    pub fn new(directory: Arc<dyn TenantDirectory>, geo: GeoLocator) -> Self {
        Self {
            directory,
            devices: DeviceParser::new(),
            geo,
        }
    }

    /// Builds the directory and geo clients from config.
    pub fn from_config(config: &EnrichmentConfig) -> Result<Self> {
        let directory: Arc<dyn TenantDirectory> = if config.uses_static_directory() {
            Arc::new(StaticTenantDirectory::new(config.tenants.iter().cloned()))
        } else {
            Arc::new(HttpTenantDirectory::new(
                config.directory_url.clone(),
                Duration::from_millis(config.directory_timeout_ms),
                Duration::from_secs(config.directory_cache_ttl_secs),
            )?)
        };
        Ok(Self::new(directory, GeoLocator::new(&config.geo)?))
    }

    /// The active tenant for a tracking id.
    ///
    /// Unknown, inactive and unreachable all resolve to `None`.
    pub async fn resolve_tenant(&self, tracking_id: &str) -> Option<Tenant> {
        if !is_valid_tracking_id(tracking_id) {
            return None;
        }
        match self.directory.lookup(tracking_id).await {
            Ok(Some(tenant)) if tenant.active => Some(tenant),
            Ok(Some(_)) => {
                debug!(tracking_id, "Tenant inactive");
                None
            }
            Ok(None) => {
                debug!(tracking_id, "Tenant not found");
                None
            }
            Err(e) => {
                metrics().tenant_lookup_errors.inc();
                warn!(tracking_id, error = %e, "Tenant lookup failed, treating as not found");
                None
            }
        }
    }

    /// Device and geo for the request. Never fails.
    pub async fn snapshot(&self, ctx: &RequestContext) -> UserSnapshot {
        let device = self.devices.parse(ctx.user_agent.as_deref());
        let geo = self.geo.locate(ctx.ip.as_deref()).await;
        UserSnapshot::new(ctx.ip.clone(), ctx.user_agent.clone(), device, geo)
    }

    pub fn enrich(&self, canonical: CanonicalEvent, tenant: &Tenant, user: &UserSnapshot) -> Event {
        Event::enriched(canonical, tenant, user.clone())
    }
}
