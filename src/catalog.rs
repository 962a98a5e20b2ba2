//! Saavn endpoints as cached, ranked lookups.
//!
//! Searches are best-effort: while the upstream is refusing calls they answer
//! with an empty, uncached result marked as degraded. Lookups by id are
//! strict and surface the refusal, so callers can tell "not found" apart from
//! "try again later".

use crate::cache::{CacheKey, CachedFetcher, FetchResult, Namespace, Payload, Produced, TRENDING_TTL};
use crate::rank::normalize::normalize_text;
use crate::rank::{rank_albums, rank_similar, rank_songs};
use crate::saavn::models::{GlobalSearch, Page, Song};
use crate::saavn::{SaavnApi, SaavnApiError};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Songs pre-warmed at startup so the home screen survives a rate-limit block.
pub const TRENDING_SONG_IDS: [&str; 7] = [
    "fBGE4hKU", "e4i4TdLr", "wFRQqJeJ", "u2D2mHdO", "oqbXmtgZ", "nXKbc8rl", "4tpEcBbk",
];

/// Clients send this literal when a song has no resolvable artist.
const PLACEHOLDER_ID: &str = "Unknown Artist";

/// Suggestions are fetched and cached at this size; callers truncate.
const SUGGESTION_LIMIT: u32 = 20;

fn is_lookup_id(id: &str) -> bool {
    let id = id.trim();
    !id.is_empty() && id != PLACEHOLDER_ID
}

/// Search producers: unavailability becomes an empty degraded result.
fn best_effort(
    what: &str,
    result: Result<Option<Payload>, SaavnApiError>,
    empty: Payload,
) -> Result<Produced, SaavnApiError> {
    match result {
        Ok(Some(payload)) => Ok(Produced::Fresh(payload)),
        Ok(None) => Ok(Produced::Fresh(empty)),
        Err(e) if e.is_unavailable() => {
            warn!(what, error = %e, "Saavn unavailable, serving empty fallback");
            Ok(Produced::Degraded(empty))
        }
        Err(e) => Err(e),
    }
}

/// Lookup producers: an upstream 404 is a miss, everything else propagates.
fn strict(result: Result<Option<Payload>, SaavnApiError>) -> Result<Produced, SaavnApiError> {
    match result {
        Ok(Some(payload)) => Ok(Produced::Fresh(payload)),
        Ok(None) => Ok(Produced::Missing),
        Err(e) if e.is_not_found() => Ok(Produced::Missing),
        Err(e) => Err(e),
    }
}

/// Result of a multi-id song lookup.
#[derive(Debug, Clone, Default)]
pub struct SongBatch {
    pub songs: Vec<Song>,
    /// Some ids were skipped because the upstream was unavailable.
    pub fallback: bool,
}

#[derive(Clone)]
pub struct Catalog {
    api: Arc<SaavnApi>,
    fetcher: CachedFetcher,
}

impl Catalog {
    pub fn new(api: Arc<SaavnApi>, fetcher: CachedFetcher) -> Self {
        Self { api, fetcher }
    }

    pub fn api(&self) -> &SaavnApi {
        &self.api
    }

    pub fn fetcher(&self) -> &CachedFetcher {
        &self.fetcher
    }

    async fn search<F, Fut>(
        &self,
        namespace: Namespace,
        query: &str,
        page: u32,
        limit: u32,
        empty: Payload,
        produce: F,
    ) -> FetchResult
    where
        F: FnOnce(Arc<SaavnApi>, String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<Payload>, SaavnApiError>> + Send + 'static,
    {
        if normalize_text(query).is_empty() {
            return Ok(None);
        }
        let key = CacheKey::search(namespace, query, page, limit);
        let api = self.api.clone();
        let query = query.trim().to_owned();

        self.fetcher
            .fetch(&key, key.ttl(), true, move || async move {
                let result = produce(api, query.clone()).await;
                best_effort(&query, result, empty)
            })
            .await
    }

    async fn lookup<F, Fut>(&self, key: CacheKey, id: &str, produce: F) -> FetchResult
    where
        F: FnOnce(Arc<SaavnApi>, String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<Payload>, SaavnApiError>> + Send + 'static,
    {
        if !is_lookup_id(id) {
            debug!(id, "Skipping lookup of placeholder id");
            return Ok(None);
        }
        let api = self.api.clone();
        let id = id.trim().to_owned();

        self.fetcher
            .fetch(&key, key.ttl(), false, move || async move {
                strict(produce(api, id).await)
            })
            .await
    }

    /// Top hits across songs, albums, artists and playlists.
    pub async fn search_all(&self, query: &str, page: u32, limit: u32) -> FetchResult {
        let empty = Payload::SearchAll(GlobalSearch::default());
        self.search(Namespace::Search, query, page, limit, empty, move |api, q| async move {
            let found = api.search_all(&q, page, limit).await?;
            Ok(found.map(|mut search| {
                search.songs = rank_songs(&q, search.songs);
                search.albums = rank_albums(&q, search.albums);
                Payload::SearchAll(search)
            }))
        })
        .await
    }

    pub async fn search_songs(&self, query: &str, page: u32, limit: u32) -> FetchResult {
        let empty = Payload::Songs(Page::default());
        self.search(Namespace::SearchSongs, query, page, limit, empty, move |api, q| async move {
            let found = api.search_songs(&q, page, limit).await?;
            Ok(found.map(|p| Payload::Songs(p.map_results(|songs| rank_songs(&q, songs)))))
        })
        .await
    }

    pub async fn search_albums(&self, query: &str, page: u32, limit: u32) -> FetchResult {
        let empty = Payload::Albums(Page::default());
        self.search(Namespace::SearchAlbums, query, page, limit, empty, move |api, q| async move {
            let found = api.search_albums(&q, page, limit).await?;
            Ok(found.map(|p| Payload::Albums(p.map_results(|albums| rank_albums(&q, albums)))))
        })
        .await
    }

    /// Artist results keep upstream order; Saavn already ranks by popularity.
    pub async fn search_artists(&self, query: &str, page: u32, limit: u32) -> FetchResult {
        let empty = Payload::Artists(Page::default());
        self.search(Namespace::SearchArtists, query, page, limit, empty, move |api, q| async move {
            Ok(api.search_artists(&q, page, limit).await?.map(Payload::Artists))
        })
        .await
    }

    pub async fn search_playlists(&self, query: &str, page: u32, limit: u32) -> FetchResult {
        let empty = Payload::Playlists(Page::default());
        self.search(Namespace::SearchPlaylists, query, page, limit, empty, move |api, q| async move {
            Ok(api.search_playlists(&q, page, limit).await?.map(Payload::Playlists))
        })
        .await
    }

    pub async fn song(&self, id: &str) -> FetchResult {
        let key = CacheKey::entity(Namespace::Song, id);
        self.lookup(key, id, |api, id| async move {
            Ok(api.song(&id).await?.map(Payload::Song))
        })
        .await
    }

    pub async fn album(&self, id: &str) -> FetchResult {
        let key = CacheKey::entity(Namespace::Album, id);
        self.lookup(key, id, |api, id| async move {
            Ok(api.album(&id).await?.map(Payload::Album))
        })
        .await
    }

    pub async fn artist(&self, id: &str) -> FetchResult {
        let key = CacheKey::entity(Namespace::Artist, id);
        self.lookup(key, id, |api, id| async move {
            Ok(api.artist(&id).await?.map(Payload::Artist))
        })
        .await
    }

    pub async fn artist_songs(&self, id: &str, page: u32) -> FetchResult {
        let key = CacheKey::new(Namespace::ArtistSongs, [id.trim().to_owned(), page.to_string()]);
        self.lookup(key, id, move |api, id| async move {
            Ok(api.artist_songs(&id, page).await?.map(Payload::Songs))
        })
        .await
    }

    pub async fn artist_albums(&self, id: &str, page: u32) -> FetchResult {
        let key = CacheKey::new(Namespace::ArtistAlbums, [id.trim().to_owned(), page.to_string()]);
        self.lookup(key, id, move |api, id| async move {
            Ok(api.artist_albums(&id, page).await?.map(Payload::Albums))
        })
        .await
    }

    pub async fn playlist(&self, id: &str) -> FetchResult {
        let key = CacheKey::entity(Namespace::Playlist, id);
        self.lookup(key, id, |api, id| async move {
            Ok(api.playlist(&id).await?.map(Payload::Playlist))
        })
        .await
    }

    /// Songs similar to `id`, same-language and same-artist tracks first.
    ///
    /// The seed song is only read from cache; it is usually there because the
    /// client just opened it.
    pub async fn song_suggestions(&self, id: &str) -> FetchResult {
        if !is_lookup_id(id) {
            return Ok(None);
        }
        let key = CacheKey::entity(Namespace::Suggestions, id);
        let seed_key = CacheKey::entity(Namespace::Song, id);
        let api = self.api.clone();
        let fetcher = self.fetcher.clone();
        let id = id.trim().to_owned();

        self.fetcher
            .fetch(&key, key.ttl(), false, move || async move {
                let result = api.song_suggestions(&id, SUGGESTION_LIMIT).await.map(|found| {
                    found.map(|songs| {
                        let seed = fetcher.cached(&seed_key);
                        let (language, artist) = match seed.as_deref() {
                            Some(Payload::Song(seed)) => {
                                (seed.language.clone(), seed.artists.first().cloned())
                            }
                            _ => (None, None),
                        };
                        Payload::SongList(rank_similar(songs, language.as_deref(), artist.as_deref()))
                    })
                });
                best_effort(&id, result, Payload::SongList(Vec::new()))
            })
            .await
    }

    /// Look up several songs at once.
    ///
    /// Ids already cached are answered locally; the rest go out in one bulk
    /// call and each returned song is cached under its own `song:<id>` key.
    /// The batch itself is never cached.
    pub async fn songs(&self, ids: &[String]) -> Result<SongBatch, SaavnApiError> {
        self.songs_with_ttl(ids, Namespace::Song.ttl()).await
    }

    async fn songs_with_ttl(&self, ids: &[String], ttl: Duration) -> Result<SongBatch, SaavnApiError> {
        let mut seen = HashSet::new();
        let ids: Vec<&str> = ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| is_lookup_id(id) && seen.insert(*id))
            .collect();

        let mut found: HashMap<String, Song> = HashMap::new();
        let mut uncached = Vec::new();
        for id in &ids {
            match self.fetcher.cached(&CacheKey::entity(Namespace::Song, id)).as_deref() {
                Some(Payload::Song(song)) => {
                    found.insert((*id).to_owned(), song.clone());
                }
                _ => uncached.push((*id).to_owned()),
            }
        }

        let mut fallback = false;
        if !uncached.is_empty() {
            match self.api.songs_bulk(&uncached).await {
                Ok(songs) => {
                    for song in songs {
                        let key = CacheKey::entity(Namespace::Song, &song.id);
                        self.fetcher.prime(&key, Payload::Song(song.clone()), ttl);
                        found.insert(song.id.clone(), song);
                    }
                }
                Err(e) if e.is_unavailable() => {
                    warn!(requested = uncached.len(), error = %e, "Bulk song lookup unavailable, returning cached songs only");
                    fallback = true;
                }
                Err(e) => return Err(e),
            }
        }

        let mut songs: Vec<Song> = ids.iter().filter_map(|id| found.remove(*id)).collect();
        // Upstream occasionally answers with a different id than requested
        let mut extra: Vec<Song> = found.into_values().collect();
        extra.sort_by(|a, b| a.id.cmp(&b.id));
        songs.extend(extra);

        Ok(SongBatch { songs, fallback })
    }

    /// Cache the trending songs for a day. Returns how many were loaded.
    pub async fn preload_trending(&self) -> Result<usize, SaavnApiError> {
        let ids: Vec<String> = TRENDING_SONG_IDS.iter().map(|id| (*id).to_owned()).collect();
        let batch = self.songs_with_ttl(&ids, TRENDING_TTL).await?;
        if batch.fallback {
            warn!("Trending preload incomplete, Saavn unavailable");
        } else {
            info!(loaded = batch.songs.len(), requested = ids.len(), "Preloaded trending songs");
        }
        Ok(batch.songs.len())
    }
}
