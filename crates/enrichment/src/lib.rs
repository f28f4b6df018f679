//! Enrichment: tenant resolution, user agent classification and IP
//! geolocation for accepted records.

pub mod config;
pub mod device;
pub mod directory;
pub mod enricher;
pub mod geo;

pub use config::{EnrichmentConfig, GeoConfig};
pub use device::DeviceParser;
pub use directory::{HttpTenantDirectory, StaticTenantDirectory, TenantDirectory};
pub use enricher::{Enricher, RequestContext};
pub use geo::GeoLocator;
