//! Serialized Saavn API client with retry and circuit breaker.
//!
//! The public Saavn wrapper sits behind Cloudflare, which answers bursts with
//! a 429 and a long block. Every request therefore goes through one worker
//! task: callers enqueue a job and await its reply, the worker runs jobs one
//! at a time in arrival order, retrying transient failures with exponential
//! backoff. A 429 trips the [`CircuitBreaker`] and every call fails fast until
//! the cooldown has passed.

use crate::saavn::breaker::CircuitBreaker;
use crate::saavn::errors::SaavnApiError;
use crate::saavn::json::parse_envelope;
use crate::saavn::models::{
    Album, Artist, ArtistSummary, GlobalSearch, Page, Playlist, PlaylistSummary, Song,
};
use crate::saavn::raw::{
    OneOrMany, RawAlbum, RawArtist, RawArtistAlbums, RawArtistSongs, RawArtistSummary,
    RawGlobalSearch, RawPage, RawPlaylist, RawSong,
};
use crate::saavn::transport::{HttpTransport, QueryParams, Transport, TransportError};
use crate::utils::{fmt_duration, log_if_slow};
use rand::Rng;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Upstream calls slower than this are logged.
const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(3);

/// Retry, breaker and pacing knobs for [`SaavnApi`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries per request, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// How long a 429 blocks all calls.
    pub cooldown: Duration,
    /// Minimum gap between two requests leaving the worker. Zero disables pacing.
    pub min_spacing: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            cooldown: Duration::from_secs(60),
            min_spacing: Duration::ZERO,
        }
    }
}

/// `/api/{resource}/{id}{suffix}` with `id` escaped as a single path segment.
///
/// `None` for ids that would resolve as a dot segment or be empty.
fn entity_path(resource: &str, id: &str, suffix: &str) -> Option<String> {
    if id.is_empty() || id.chars().all(|c| c == '.') {
        return None;
    }
    Some(format!("/api/{resource}/{}{suffix}", urlencoding::encode(id)))
}

/// Delay before retry number `attempt + 1`: `2^attempt * base + jitter`.
pub fn backoff_delay(attempt: u32, base: Duration, jitter: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    base.saturating_mul(factor).saturating_add(jitter)
}

/// Uniform jitter in `[0, base)`.
pub fn random_jitter(base: Duration) -> Duration {
    let nanos = u64::try_from(base.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::rng().random_range(0..nanos))
}

struct Job {
    path: String,
    query: QueryParams,
    reply: oneshot::Sender<Result<String, SaavnApiError>>,
}

/// Handle to the request worker. Cheap to share behind an `Arc`.
pub struct SaavnApi {
    jobs: mpsc::UnboundedSender<Job>,
    breaker: Arc<CircuitBreaker>,
}

impl SaavnApi {
    /// Build a client over HTTP. Must be called inside a tokio runtime.
    pub fn new_with_config(
        base_url: &str,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(base_url, timeout)?;
        Ok(Self::with_transport(Arc::new(transport), policy))
    }

    /// Build a client over any transport and spawn its worker.
    pub fn with_transport(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(policy.cooldown));
        let (jobs, rx) = mpsc::unbounded_channel();

        let worker = Worker {
            transport,
            breaker: breaker.clone(),
            policy,
            last_sent: None,
        };
        tokio::spawn(worker.run(rx));

        Self { jobs, breaker }
    }

    /// Remaining breaker cooldown, if calls are currently blocked.
    pub fn blocked_for(&self) -> Option<Duration> {
        self.breaker.remaining()
    }

    /// Queue a GET and wait for its body.
    ///
    /// Fails with [`SaavnApiError::CircuitOpen`] without queueing while the
    /// breaker is open. Dropping the returned future does not cancel a request
    /// that has already been queued.
    pub async fn request(&self, path: &str, query: QueryParams) -> Result<String, SaavnApiError> {
        if let Err(retry_after) = self.breaker.check() {
            trace!(path, retry_after = fmt_duration(retry_after), "Circuit open, not queueing");
            return Err(SaavnApiError::CircuitOpen { retry_after });
        }

        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job {
                path: path.to_owned(),
                query,
                reply,
            })
            .map_err(|_| SaavnApiError::WorkerGone)?;

        rx.await.map_err(|_| SaavnApiError::WorkerGone)?
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        path: &str,
        query: QueryParams,
    ) -> Result<Option<R>, SaavnApiError> {
        let body = self.request(path, query).await?;
        parse_envelope::<R>(&body).map_err(|source| SaavnApiError::ParseFailed {
            path: path.to_owned(),
            source,
        })
    }

    fn search_params(query: &str, page: u32, limit: u32) -> QueryParams {
        vec![
            ("query", query.to_owned()),
            ("page", page.to_string()),
            ("limit", limit.to_string()),
        ]
    }

    /// `/api/search`: top hits across every entity type.
    pub async fn search_all(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> Result<Option<GlobalSearch>, SaavnApiError> {
        let raw: Option<RawGlobalSearch> = self
            .get_json("/api/search", Self::search_params(query, page, limit))
            .await?;
        Ok(raw.map(GlobalSearch::from))
    }

    pub async fn search_songs(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> Result<Option<Page<Song>>, SaavnApiError> {
        let raw: Option<RawPage<RawSong>> = self
            .get_json("/api/search/songs", Self::search_params(query, page, limit))
            .await?;
        Ok(raw.map(Page::from))
    }

    pub async fn search_albums(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> Result<Option<Page<Album>>, SaavnApiError> {
        let raw: Option<RawPage<RawAlbum>> = self
            .get_json("/api/search/albums", Self::search_params(query, page, limit))
            .await?;
        Ok(raw.map(Page::from))
    }

    pub async fn search_artists(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> Result<Option<Page<ArtistSummary>>, SaavnApiError> {
        let raw: Option<RawPage<RawArtistSummary>> = self
            .get_json("/api/search/artists", Self::search_params(query, page, limit))
            .await?;
        Ok(raw.map(Page::from))
    }

    pub async fn search_playlists(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> Result<Option<Page<PlaylistSummary>>, SaavnApiError> {
        let raw: Option<RawPage<RawPlaylist>> = self
            .get_json("/api/search/playlists", Self::search_params(query, page, limit))
            .await?;
        Ok(raw.map(Page::from))
    }

    /// `/api/songs/{id}`. The API answers with a one-element array.
    pub async fn song(&self, id: &str) -> Result<Option<Song>, SaavnApiError> {
        let Some(path) = entity_path("songs", id, "") else {
            return Ok(None);
        };
        let raw: Option<OneOrMany<RawSong>> = self.get_json(&path, Vec::new()).await?;
        Ok(raw.and_then(|songs| songs.into_vec().into_iter().next().map(Song::from)))
    }

    /// `/api/songs?ids=a,b,c`. Unknown ids are silently absent from the result.
    pub async fn songs_bulk(&self, ids: &[String]) -> Result<Vec<Song>, SaavnApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Option<OneOrMany<RawSong>> = self
            .get_json("/api/songs", vec![("ids", ids.join(","))])
            .await?;
        let songs: Vec<Song> = raw
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .map(Song::from)
            .collect();
        debug!(requested = ids.len(), returned = songs.len(), "Bulk song lookup");
        Ok(songs)
    }

    pub async fn song_suggestions(&self, id: &str, limit: u32) -> Result<Option<Vec<Song>>, SaavnApiError> {
        let Some(path) = entity_path("songs", id, "/suggestions") else {
            return Ok(None);
        };
        let raw: Option<OneOrMany<RawSong>> = self
            .get_json(&path, vec![("limit", limit.to_string())])
            .await?;
        Ok(raw.map(|songs| songs.into_vec().into_iter().map(Song::from).collect()))
    }

    pub async fn artist(&self, id: &str) -> Result<Option<Artist>, SaavnApiError> {
        let Some(path) = entity_path("artists", id, "") else {
            return Ok(None);
        };
        let raw: Option<RawArtist> = self.get_json(&path, Vec::new()).await?;
        Ok(raw.map(Artist::from))
    }

    pub async fn artist_songs(&self, id: &str, page: u32) -> Result<Option<Page<Song>>, SaavnApiError> {
        let Some(path) = entity_path("artists", id, "/songs") else {
            return Ok(None);
        };
        let raw: Option<RawArtistSongs> = self
            .get_json(&path, vec![("page", page.to_string())])
            .await?;
        Ok(raw.map(|r| {
            Page::from_results(r.songs.into_iter().map(Song::from).collect())
                .with_total(r.total.and_then(|t| t.as_u64()))
        }))
    }

    pub async fn artist_albums(&self, id: &str, page: u32) -> Result<Option<Page<Album>>, SaavnApiError> {
        let Some(path) = entity_path("artists", id, "/albums") else {
            return Ok(None);
        };
        let raw: Option<RawArtistAlbums> = self
            .get_json(&path, vec![("page", page.to_string())])
            .await?;
        Ok(raw.map(|r| {
            Page::from_results(r.albums.into_iter().map(Album::from).collect())
                .with_total(r.total.and_then(|t| t.as_u64()))
        }))
    }

    /// `/api/albums?id=`; the path form is not served by every deployment.
    pub async fn album(&self, id: &str) -> Result<Option<Album>, SaavnApiError> {
        let raw: Option<RawAlbum> = self
            .get_json("/api/albums", vec![("id", id.to_owned())])
            .await?;
        Ok(raw.map(Album::from))
    }

    pub async fn playlist(&self, id: &str) -> Result<Option<Playlist>, SaavnApiError> {
        let raw: Option<RawPlaylist> = self
            .get_json("/api/playlists", vec![("id", id.to_owned())])
            .await?;
        Ok(raw.map(Playlist::from))
    }
}

/// Owns the transport; the only place network I/O happens.
struct Worker {
    transport: Arc<dyn Transport>,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
    /// When the previous attempt left, for `min_spacing`.
    last_sent: Option<Instant>,
}

impl Worker {
    async fn run(mut self, mut jobs: mpsc::UnboundedReceiver<Job>) {
        debug!("Saavn request worker started");
        while let Some(job) = jobs.recv().await {
            let result = self.execute(&job.path, &job.query).await;
            if job.reply.send(result).is_err() {
                trace!(path = %job.path, "Caller went away before the reply");
            }
        }
        debug!("Saavn request worker stopped");
    }

    /// Holds the next attempt until `min_spacing` has passed since the last one.
    async fn pace(&mut self) {
        if self.policy.min_spacing.is_zero() {
            return;
        }
        if let Some(last) = self.last_sent {
            tokio::time::sleep_until(last + self.policy.min_spacing).await;
        }
        self.last_sent = Some(Instant::now());
    }

    async fn execute(&mut self, path: &str, query: &QueryParams) -> Result<String, SaavnApiError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            // The breaker may have tripped while this job sat in the queue
            if let Err(retry_after) = self.breaker.check() {
                return Err(SaavnApiError::CircuitOpen { retry_after });
            }
            self.pace().await;

            let start = Instant::now();
            let outcome = self.transport.get(path, query).await;
            log_if_slow(start, SLOW_REQUEST_THRESHOLD, path);

            let failure = match outcome {
                Ok(resp) if resp.is_success() => {
                    trace!(path, status = resp.status, bytes = resp.body.len(), "Saavn request succeeded");
                    return Ok(resp.body);
                }
                Ok(resp) if resp.status == 429 => {
                    self.breaker.trip();
                    let cooldown = self.breaker.cooldown();
                    warn!(
                        path,
                        cooldown = fmt_duration(cooldown),
                        "Saavn rate limited, blocking all calls"
                    );
                    return Err(SaavnApiError::RateLimited { cooldown });
                }
                Ok(resp) if (400..500).contains(&resp.status) => {
                    debug!(path, status = resp.status, "Saavn rejected request");
                    return Err(SaavnApiError::Upstream {
                        status: Some(resp.status),
                        message: format!("{path} returned HTTP {}", resp.status),
                    });
                }
                Ok(resp) => SaavnApiError::Upstream {
                    status: Some(resp.status),
                    message: format!("{path} returned HTTP {}", resp.status),
                },
                Err(TransportError::Timeout) => SaavnApiError::Timeout,
                Err(TransportError::Network(message)) => SaavnApiError::Upstream {
                    status: None,
                    message,
                },
            };

            attempt += 1;
            if attempt >= max_attempts {
                warn!(path, attempts = attempt, error = %failure, "Saavn request failed, giving up");
                return Err(failure);
            }

            let delay = backoff_delay(
                attempt - 1,
                self.policy.base_delay,
                random_jitter(self.policy.base_delay),
            );
            warn!(
                path,
                attempt,
                max_attempts,
                retry_in = fmt_duration(delay),
                error = %failure,
                "Saavn request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
