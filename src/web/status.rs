//! Health handler.

use axum::extract::State;
use axum::response::Response;
use serde::Serialize;
use tracing::trace;

use crate::state::AppState;
use crate::web::routes::{cache, with_cache_control};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    commit: &'static str,
    uptime_secs: u64,
    /// Seconds until the upstream may be called again; absent when not blocked.
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream_blocked_secs: Option<u64>,
    cached_entries: usize,
    in_flight: usize,
    durable_cache: bool,
    timestamp: String,
}

/// Health check endpoint. Always 200; a blocked upstream is reported, not failed.
pub(super) async fn health(State(state): State<AppState>) -> Response {
    trace!("health check requested");
    let fetcher = state.catalog.fetcher();
    let blocked = state.catalog.api().blocked_for();

    let body = HealthResponse {
        status: if blocked.is_some() { "degraded" } else { "healthy" },
        version: env!("CARGO_PKG_VERSION"),
        commit: env!("GIT_COMMIT_SHORT"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        upstream_blocked_secs: blocked.map(|d| d.as_secs().max(1)),
        cached_entries: fetcher.cached_len(),
        in_flight: fetcher.in_flight(),
        durable_cache: fetcher.has_durable(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    with_cache_control(body, cache::NONE)
}
