//! Tenant types as seen by the pipeline.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Public tracking ids are short opaque tokens.
static TRACKING_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.:-]{1,128}$").expect("valid regex"));

/// A tenant/project, owned by an external directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Tenant {
    /// Project id
    #[validate(length(min = 1, max = 128))]
    pub id: String,
    /// Public id embedded in client pages
    #[serde(alias = "trackingId")]
    #[validate(length(min = 1, max = 128))]
    pub tracking_id: String,
    /// Whether the tenant may ingest events
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Tenant {
    /// Creates an active tenant.
    pub fn new(id: impl Into<String>, tracking_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tracking_id: tracking_id.into(),
            active: true,
        }
    }

    /// Marks the tenant inactive.
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Whether a string could be a tracking id at all.
///
/// Used to short-circuit directory lookups for garbage input.
pub fn is_valid_tracking_id(id: &str) -> bool {
    TRACKING_ID_PATTERN.is_match(id)
}
