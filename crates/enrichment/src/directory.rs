//! Tenant directory clients.
//!
//! The directory is owned by an external service. The pipeline only reads
//! it, by public tracking id.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use engine_core::{Error, Result, Tenant};
use moka::future::Cache;
use parking_lot::RwLock;
use reqwest::StatusCode;
use tracing::{debug, warn};
use validator::Validate;

/// Maximum cached directory entries.
const DIRECTORY_CACHE_MAX_CAPACITY: u64 = 10_000;

/// Read access to tenants by tracking id.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// `Ok(None)` when no tenant has this tracking id. Errors mean the
    /// directory itself could not answer.
    async fn lookup(&self, tracking_id: &str) -> Result<Option<Tenant>>;
}

/// Directory client over HTTP.
///
/// Calls `GET {base_url}/internal/tenants/{tracking_id}` and caches answers,
/// including "not found", for the configured TTL.
#[derive(Clone)]
pub struct HttpTenantDirectory {
    base_url: String,
    http_client: reqwest::Client,
    cache: Cache<String, Option<Tenant>>,
}

impl HttpTenantDirectory {
    pub fn new(base_url: impl Into<String>, timeout: Duration, cache_ttl: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            cache: Cache::builder()
                .max_capacity(DIRECTORY_CACHE_MAX_CAPACITY)
                .time_to_live(cache_ttl)
                .build(),
        })
    }

    /// Drop the cached answer for a tracking id.
    pub async fn invalidate(&self, tracking_id: &str) {
        self.cache.invalidate(tracking_id).await;
    }

    async fn remote_lookup(&self, tracking_id: &str) -> Result<Option<Tenant>> {
        let url = format!("{}/internal/tenants/{}", self.base_url, tracking_id);

        debug!(url = %url, "Calling tenant directory");

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            warn!(error = %e, "Tenant directory request failed");
            Error::lookup(format!("Tenant directory unavailable: {}", e))
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                warn!(status = %status, "Tenant directory returned error");
                return Err(Error::lookup(format!("Tenant directory returned {}", status)));
            }
            _ => {}
        }

        let tenant: Tenant = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse tenant response");
            Error::lookup(format!("Invalid tenant response: {}", e))
        })?;
        tenant
            .validate()
            .map_err(|e| Error::lookup(format!("Invalid tenant record: {}", e)))?;

        Ok(Some(tenant))
    }
}

#[async_trait]
impl TenantDirectory for HttpTenantDirectory {
    async fn lookup(&self, tracking_id: &str) -> Result<Option<Tenant>> {
        if let Some(cached) = self.cache.get(tracking_id).await {
            debug!(tracking_id, "Tenant cache hit");
            return Ok(cached);
        }

        let tenant = self.remote_lookup(tracking_id).await?;
        self.cache
            .insert(tracking_id.to_string(), tenant.clone())
            .await;
        Ok(tenant)
    }
}

/// Fixed set of tenants, for development and tests.
#[derive(Default)]
pub struct StaticTenantDirectory {
    tenants: RwLock<HashMap<String, Tenant>>,
}

impl StaticTenantDirectory {
    pub fn new(tenants: impl IntoIterator<Item = Tenant>) -> Self {
        let directory = Self::default();
        for tenant in tenants {
            directory.upsert(tenant);
        }
        directory
    }

    pub fn upsert(&self, tenant: Tenant) {
        self.tenants.write().insert(tenant.tracking_id.clone(), tenant);
    }
}

#[async_trait]
impl TenantDirectory for StaticTenantDirectory {
    async fn lookup(&self, tracking_id: &str) -> Result<Option<Tenant>> {
        Ok(self.tenants.read().get(tracking_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode as AxumStatus, routing::get, Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn spawn_directory(calls: Arc<AtomicUsize>) -> String {
        let app = Router::new().route(
            "/internal/tenants/:id",
            get(move |Path(id): Path<String>| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    match id.as_str() {
                        "T1" => Ok(Json(json!({ "id": "P1", "trackingId": "T1", "active": true }))),
                        "T2" => Ok(Json(json!({ "id": "P2", "trackingId": "T2", "active": false }))),
                        "broken" => Err(AxumStatus::INTERNAL_SERVER_ERROR),
                        _ => Err(AxumStatus::NOT_FOUND),
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn directory(base_url: String) -> HttpTenantDirectory {
        HttpTenantDirectory::new(base_url, Duration::from_secs(2), Duration::from_secs(30)).unwrap()
    }

    #[tokio::test]
    async fn test_lookup_found_and_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let directory = directory(spawn_directory(calls.clone()).await);

        let tenant = directory.lookup("T1").await.unwrap().unwrap();
        assert_eq!(tenant.id, "P1");
        assert!(tenant.active);

        directory.lookup("T1").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        directory.invalidate("T1").await;
        directory.lookup("T1").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lookup_inactive_and_missing() {
        let directory = directory(spawn_directory(Arc::new(AtomicUsize::new(0))).await);

        let inactive = directory.lookup("T2").await.unwrap().unwrap();
        assert!(!inactive.active);
        assert!(directory.lookup("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_lookup_error() {
        let directory = directory(spawn_directory(Arc::new(AtomicUsize::new(0))).await);
        let err = directory.lookup("broken").await.unwrap_err();
        assert!(matches!(err, Error::Lookup(_)));
    }

    #[tokio::test]
    async fn test_static_directory() {
        let directory = StaticTenantDirectory::new([Tenant::new("P1", "T1")]);
        assert!(directory.lookup("T1").await.unwrap().is_some());
        assert!(directory.lookup("T9").await.unwrap().is_none());

        directory.upsert(Tenant::new("P1", "T1").deactivated());
        assert!(!directory.lookup("T1").await.unwrap().unwrap().active);
    }
}
