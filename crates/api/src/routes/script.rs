//! Tracking script delivery.

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use engine_core::{Error, TenantErrorCode};
use serde::Deserialize;
use tracing::debug;

use crate::response::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScriptQuery {
    pub id: Option<String>,
}

/// GET /script.js?id=<trackingId> - Serves the tracking script to active tenants.
pub async fn script_handler(
    State(state): State<AppState>,
    Query(query): Query<ScriptQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tracking_id = query
        .id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::tenant(TenantErrorCode::MissingId, "Missing tracking id"))?;

    if state.enricher.resolve_tenant(tracking_id).await.is_none() {
        return Err(Error::tenant(TenantErrorCode::NotFound, "Unknown or inactive tracking id").into());
    }

    debug!(tracking_id, "Serving tracking script");
    Ok((
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=300"),
        ],
        state.script.clone(),
    ))
}
