//! Web API router construction and shared response utilities.

use axum::{
    Router,
    http::{HeaderValue, header},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::Serialize;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::cache::Fetched;
use crate::cache::payload::PayloadBody;
use crate::state::AppState;
use crate::web::{lookup, search, status};

/// Cache-Control presets for public endpoints.
pub mod cache {
    /// Search results. Shared caches keep them for half the ten minute server-side TTL.
    pub const SEARCH: &str = "public, max-age=60, s-maxage=300, stale-while-revalidate=120";
    /// Song, album, artist and playlist detail.
    pub const DETAIL: &str = "public, max-age=300, s-maxage=3600, stale-while-revalidate=300";
    /// Fallback answers served while the upstream is blocked.
    pub const DEGRADED: &str = "no-store";
    pub const NONE: &str = "private, no-store, must-revalidate";
}

/// Every request gets a response within this time, even if the upstream queue is long.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wraps a JSON response with a `Cache-Control` header.
pub fn with_cache_control<T: Serialize>(value: T, header: &'static str) -> Response {
    let mut response = Json(value).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(header));
    response
}

#[derive(Serialize)]
struct WithFallback<'a> {
    #[serde(flatten)]
    body: PayloadBody<'a>,
    fallback: bool,
}

/// A fetched list body plus `"fallback"`, which is true when the upstream was
/// unavailable and the body is an empty placeholder.
pub fn fallback_response(fetched: &Fetched, header: &'static str) -> Response {
    let fallback = fetched.is_degraded();
    let body = WithFallback {
        body: fetched.payload.body(),
        fallback,
    };
    with_cache_control(body, if fallback { cache::DEGRADED } else { header })
}

/// A fetched body as-is.
pub fn payload_response(fetched: &Fetched, header: &'static str) -> Response {
    let header = if fetched.is_degraded() { cache::DEGRADED } else { header };
    with_cache_control(fetched.payload.body(), header)
}

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(status::health))
        .route("/search", get(search::search_all))
        .route("/search/songs", get(search::search_songs))
        .route("/search/albums", get(search::search_albums))
        .route("/search/artists", get(search::search_artists))
        .route("/search/playlists", get(search::search_playlists))
        .route("/songs", get(lookup::get_songs))
        .route("/song/{id}", get(lookup::get_song))
        .route("/song/{id}/suggestions", get(lookup::get_song_suggestions))
        .route("/album/{id}", get(lookup::get_album))
        .route("/artist/{id}", get(lookup::get_artist))
        .route("/artist/{id}/songs", get(lookup::get_artist_songs))
        .route("/artist/{id}/albums", get(lookup::get_artist_albums))
        .route("/playlist/{id}", get(lookup::get_playlist))
        .with_state(app_state)
        .layer((
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
            CorsLayer::permissive(),
            CompressionLayer::new()
                .zstd(true)
                .br(true)
                .gzip(true)
                .quality(tower_http::CompressionLevel::Fastest),
            TimeoutLayer::new(REQUEST_TIMEOUT),
        ))
}
