//! Search handlers.
//!
//! All searches are best-effort: while the upstream is blocked they answer
//! 200 with empty results and `"fallback": true` rather than an error.

use axum::extract::{Query, State};
use axum::response::Response;
use serde::Deserialize;

use crate::cache::FetchResult;
use crate::state::AppState;
use crate::web::error::ApiError;
use crate::web::routes::{cache, fallback_response};

const MAX_LIMIT: u32 = 50;

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl SearchParams {
    /// The trimmed query, page and limit clamped to sane bounds.
    fn validated(&self) -> Result<(&str, u32, u32), ApiError> {
        let q = self.q.as_deref().map(str::trim).unwrap_or_default();
        if q.is_empty() {
            return Err(ApiError::missing_query());
        }
        Ok((q, self.page.max(1), self.limit.clamp(1, MAX_LIMIT)))
    }
}

fn respond(result: FetchResult) -> Result<Response, ApiError> {
    match result? {
        Some(fetched) => Ok(fallback_response(&fetched, cache::SEARCH)),
        // Only reachable for queries that normalize to nothing, e.g. "&amp;"
        None => Err(ApiError::missing_query()),
    }
}

/// `GET /search?q={query}&page=1&limit=10`
pub(super) async fn search_all(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let (q, page, limit) = params.validated()?;
    respond(state.catalog.search_all(q, page, limit).await)
}

/// `GET /search/songs?q={query}&page=1&limit=10`
pub(super) async fn search_songs(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let (q, page, limit) = params.validated()?;
    respond(state.catalog.search_songs(q, page, limit).await)
}

/// `GET /search/albums?q={query}&page=1&limit=10`
pub(super) async fn search_albums(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let (q, page, limit) = params.validated()?;
    respond(state.catalog.search_albums(q, page, limit).await)
}

/// `GET /search/artists?q={query}&page=1&limit=10`
pub(super) async fn search_artists(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let (q, page, limit) = params.validated()?;
    respond(state.catalog.search_artists(q, page, limit).await)
}

/// `GET /search/playlists?q={query}&page=1&limit=10`
pub(super) async fn search_playlists(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let (q, page, limit) = params.validated()?;
    respond(state.catalog.search_playlists(q, page, limit).await)
}
