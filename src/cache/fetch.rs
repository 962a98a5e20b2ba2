//! Cached fetch with request coalescing.
//!
//! [`CachedFetcher::fetch`] is the single entry point every upstream-backed
//! value goes through. For a key it consults, in order:
//!
//! 1. an in-flight fetch of the same key, whose outcome is shared,
//! 2. the in-process [`TtlCache`],
//! 3. the durable tier, when the caller asks for it,
//! 4. the producer.
//!
//! Steps 3 and 4 run in a spawned task that owns the pending entry, so a
//! caller dropping its future neither cancels the work nor strands the other
//! waiters. The entry is removed when the task settles, success or failure.

use crate::cache::durable::{DurableRecord, DurableStore};
use crate::cache::key::CacheKey;
use crate::cache::payload::Payload;
use crate::cache::ttl::TtlCache;
use crate::cache::writer::DurableWriter;
use crate::saavn::SaavnApiError;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

/// What a producer made of one upstream call.
#[derive(Debug)]
pub enum Produced {
    /// Usable upstream data. Cached when it has results.
    Fresh(Payload),
    /// Placeholder served while the upstream is unavailable. Never cached.
    Degraded(Payload),
    /// Nothing to return, e.g. an unknown id. Never cached.
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Memory,
    Durable,
    Upstream,
    Degraded,
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub payload: Arc<Payload>,
    pub source: FetchSource,
}

impl Fetched {
    pub fn is_degraded(&self) -> bool {
        self.source == FetchSource::Degraded
    }
}

/// Cloneable so every coalesced caller can receive the same failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Upstream(Arc<SaavnApiError>),
    #[error("fetch for {key} ended without a result")]
    Aborted { key: String },
}

impl From<SaavnApiError> for FetchError {
    fn from(err: SaavnApiError) -> Self {
        Self::Upstream(Arc::new(err))
    }
}

impl FetchError {
    pub fn upstream(&self) -> Option<&SaavnApiError> {
        match self {
            Self::Upstream(err) => Some(err),
            Self::Aborted { .. } => None,
        }
    }
}

pub type FetchResult = Result<Option<Fetched>, FetchError>;

type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;
type PendingMap = DashMap<String, (u64, SharedFetch)>;

#[derive(Clone)]
struct DurableTier {
    store: Arc<dyn DurableStore>,
    writer: DurableWriter,
}

impl DurableTier {
    /// A live record with results, with its remaining lifetime.
    async fn lookup(&self, key: &CacheKey) -> Option<(Payload, Duration)> {
        match self.store.get(&key.sanitized()).await {
            Ok(Some(record)) if record.has_results => match record.remaining(Utc::now()) {
                Some(left) => Some((record.payload, left)),
                None => {
                    trace!(key = %key, "Durable record expired");
                    None
                }
            },
            Ok(_) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Durable lookup failed, treating as miss");
                None
            }
        }
    }

    fn persist(&self, key: &CacheKey, payload: &Payload, ttl: Duration) {
        let record = DurableRecord::new(payload.clone(), ttl, Utc::now());
        let has_results = record.has_results;
        self.writer.put(key.sanitized(), record);
        if !has_results && let Some(query) = key.search_query() {
            self.writer.record_missing(query.to_owned());
        }
    }
}

/// Removes the pending entry when the producing task ends, however it ends.
struct PendingGuard {
    pending: Arc<PendingMap>,
    key: String,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.remove_if(&self.key, |_, (id, _)| *id == self.id);
    }
}

#[derive(Clone)]
pub struct CachedFetcher {
    memory: TtlCache<Payload>,
    durable: Option<DurableTier>,
    pending: Arc<PendingMap>,
    next_id: Arc<AtomicU64>,
}

impl CachedFetcher {
    pub fn new(memory: TtlCache<Payload>) -> Self {
        Self {
            memory,
            durable: None,
            pending: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enable the durable tier for fetches that ask for it.
    pub fn with_durable(mut self, store: Arc<dyn DurableStore>, writer: DurableWriter) -> Self {
        self.durable = Some(DurableTier { store, writer });
        self
    }

    pub fn has_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// The cached value for `key`, without producing.
    pub fn cached(&self, key: &CacheKey) -> Option<Arc<Payload>> {
        self.memory.get(&key.to_string())
    }

    /// Seed the in-process tier directly.
    pub fn prime(&self, key: &CacheKey, payload: Payload, ttl: Duration) {
        self.memory.insert(key.to_string(), payload, ttl);
    }

    /// Entries in the in-process tier, including ones not yet swept.
    pub fn cached_len(&self) -> usize {
        self.memory.len()
    }

    /// Number of keys currently being produced.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Return the value for `key`, producing it at most once across
    /// concurrent callers.
    ///
    /// `Ok(None)` means the producer found nothing. Fresh values are kept for
    /// `ttl` unless they are empty. With `use_persistent` the durable tier is
    /// read before producing and written after.
    pub async fn fetch<F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        use_persistent: bool,
        producer: F,
    ) -> FetchResult
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Produced, SaavnApiError>> + Send + 'static,
    {
        let cache_key = key.to_string();

        let shared = match self.pending.entry(cache_key.clone()) {
            Entry::Occupied(entry) => {
                trace!(key = %cache_key, "Joining in-flight fetch");
                entry.get().1.clone()
            }
            Entry::Vacant(entry) => {
                // Checked under the entry lock: a finishing producer fills the
                // cache before it clears its pending entry
                if let Some(payload) = self.memory.get(&cache_key) {
                    trace!(key = %cache_key, "Cache hit");
                    return Ok(Some(Fetched {
                        payload,
                        source: FetchSource::Memory,
                    }));
                }

                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel();
                let abort_key = cache_key.clone();
                let shared = async move {
                    rx.await
                        .unwrap_or_else(|_| Err(FetchError::Aborted { key: abort_key }))
                }
                .boxed()
                .shared();
                entry.insert((id, shared.clone()));

                let guard = PendingGuard {
                    pending: self.pending.clone(),
                    key: cache_key.clone(),
                    id,
                };
                let fetcher = self.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    let result = fetcher.resolve(&key, ttl, use_persistent, producer).await;
                    let _ = tx.send(result);
                });

                shared
            }
        };

        shared.await
    }

    async fn resolve<F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        use_persistent: bool,
        producer: F,
    ) -> FetchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Produced, SaavnApiError>>,
    {
        let durable = self.durable.as_ref().filter(|_| use_persistent);

        if let Some(tier) = durable
            && let Some((payload, left)) = tier.lookup(key).await
        {
            debug!(key = %key, remaining_secs = left.as_secs(), "Durable hit, backfilling memory");
            let payload = Arc::new(payload);
            self.memory.insert_arc(key.to_string(), payload.clone(), left);
            return Ok(Some(Fetched {
                payload,
                source: FetchSource::Durable,
            }));
        }

        match producer().await {
            Ok(Produced::Fresh(payload)) => {
                if let Some(tier) = durable {
                    tier.persist(key, &payload, ttl);
                }
                let payload = Arc::new(payload);
                if payload.has_results() {
                    self.memory.insert_arc(key.to_string(), payload.clone(), ttl);
                } else {
                    debug!(key = %key, "Empty result, not caching");
                }
                Ok(Some(Fetched {
                    payload,
                    source: FetchSource::Upstream,
                }))
            }
            Ok(Produced::Degraded(payload)) => {
                debug!(key = %key, "Serving degraded result uncached");
                Ok(Some(Fetched {
                    payload: Arc::new(payload),
                    source: FetchSource::Degraded,
                }))
            }
            Ok(Produced::Missing) => {
                trace!(key = %key, "Producer found nothing");
                Ok(None)
            }
            Err(e) => {
                debug!(key = %key, error = %e, "Producer failed");
                Err(e.into())
            }
        }
    }
}
