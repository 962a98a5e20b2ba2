//! Song, album, artist and playlist handlers.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::cache::{FetchResult, Payload};
use crate::saavn::models::Song;
use crate::state::AppState;
use crate::web::error::ApiError;
use crate::web::routes::{cache, payload_response, with_cache_control};

/// Most ids accepted by one `/songs` request.
const MAX_BULK_IDS: usize = 50;

fn default_suggestion_limit() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub struct SuggestionParams {
    #[serde(default = "default_suggestion_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct BulkParams {
    pub ids: Option<String>,
}

/// Artist listings are zero-based upstream.
#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: u32,
}

#[derive(Serialize)]
pub struct SongsResponse<'a> {
    pub results: &'a [Song],
    pub fallback: bool,
}

fn respond(result: FetchResult, what: &str, id: &str) -> Result<Response, ApiError> {
    match result? {
        Some(fetched) => Ok(payload_response(&fetched, cache::DETAIL)),
        None => Err(ApiError::not_found(what, id)),
    }
}

/// Comma separated ids, trimmed, blanks dropped.
fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect()
}

/// `GET /song/{id}`
pub(super) async fn get_song(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    respond(state.catalog.song(&id).await, "Song", &id)
}

/// `GET /song/{id}/suggestions?limit=10`
pub(super) async fn get_song_suggestions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<SuggestionParams>,
) -> Result<Response, ApiError> {
    let limit = params.limit.clamp(1, 20);
    let fetched = state.catalog.song_suggestions(&id).await?;

    let (songs, fallback) = match fetched.as_ref() {
        Some(f) => match f.payload.as_ref() {
            Payload::SongList(songs) => (songs.as_slice(), f.is_degraded()),
            _ => (&[] as &[Song], f.is_degraded()),
        },
        None => (&[] as &[Song], false),
    };
    let body = SongsResponse {
        results: &songs[..songs.len().min(limit)],
        fallback,
    };
    Ok(with_cache_control(
        body,
        if fallback { cache::DEGRADED } else { cache::DETAIL },
    ))
}

/// `GET /songs?ids=a,b,c`
pub(super) async fn get_songs(
    State(state): State<AppState>,
    Query(params): Query<BulkParams>,
) -> Result<Response, ApiError> {
    let ids = params.ids.as_deref().map(split_ids).unwrap_or_default();
    if ids.is_empty() {
        return Err(ApiError::bad_request("ids is required"));
    }
    if ids.len() > MAX_BULK_IDS {
        return Err(ApiError::bad_request(format!(
            "At most {MAX_BULK_IDS} ids per request"
        )));
    }

    let batch = state.catalog.songs(&ids).await?;
    let body = SongsResponse {
        results: &batch.songs,
        fallback: batch.fallback,
    };
    Ok(with_cache_control(
        body,
        if batch.fallback { cache::DEGRADED } else { cache::DETAIL },
    ))
}

/// `GET /album/{id}`
pub(super) async fn get_album(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    respond(state.catalog.album(&id).await, "Album", &id)
}

/// `GET /artist/{id}`
pub(super) async fn get_artist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    respond(state.catalog.artist(&id).await, "Artist", &id)
}

/// `GET /artist/{id}/songs?page=0`
pub(super) async fn get_artist_songs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    respond(state.catalog.artist_songs(&id, params.page).await, "Artist", &id)
}

/// `GET /artist/{id}/albums?page=0`
pub(super) async fn get_artist_albums(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Response, ApiError> {
    respond(state.catalog.artist_albums(&id, params.page).await, "Artist", &id)
}

/// `GET /playlist/{id}`
pub(super) async fn get_playlist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    respond(state.catalog.playlist(&id).await, "Playlist", &id)
}
