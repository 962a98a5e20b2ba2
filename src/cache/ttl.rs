//! In-process key-value store with per-entry expiry.
//!
//! Values are stored as `Arc<V>` so reads never clone payloads. Expired entries
//! are invisible to readers and evicted on the read that finds them; a sweeper
//! task reclaims the ones nobody reads again.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

struct Entry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

pub struct TtlCache<V> {
    entries: Arc<DashMap<String, Entry<V>>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }
}

impl<V: Send + Sync + 'static> TtlCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value under `key`, unless missing or expired.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return None,
            Some(entry) if now < entry.expires_at => return Some(entry.value.clone()),
            Some(_) => {}
        }
        // Read guard is released; re-check so a concurrent overwrite survives
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.insert_arc(key, Arc::new(value), ttl);
    }

    /// Store a shared value, replacing any previous entry and its expiry.
    pub fn insert_arc(&self, key: impl Into<String>, value: Arc<V>, ttl: Duration) {
        self.entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Entries held, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        before.saturating_sub(self.entries.len())
    }

    /// Periodically purge expired entries until the handle is aborted.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!(purged, remaining = cache.len(), "Swept expired cache entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn readable_until_expiry() {
        let cache = TtlCache::new();
        cache.insert("song:abc123", "Tum Hi Ho".to_owned(), Duration::from_secs(10));

        tokio::time::advance(Duration::from_millis(9_999)).await;
        assert_eq!(cache.get("song:abc123").as_deref().map(String::as_str), Some("Tum Hi Ho"));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get("song:abc123").is_none());
        // Evicted by the read
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_resets_expiry() {
        let cache = TtlCache::new();
        cache.insert("k", 1u32, Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(4)).await;
        cache.insert("k", 2u32, Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get("k").as_deref(), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_is_never_readable() {
        let cache = TtlCache::new();
        cache.insert("k", 1u32, Duration::ZERO);
        assert!(cache.get("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_only_drops_expired() {
        let cache = TtlCache::new();
        cache.insert("short", 1u32, Duration::from_secs(1));
        cache.insert("long", 2u32, Duration::from_secs(100));
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.get("long").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_reclaims_unread_entries() {
        let cache = TtlCache::new();
        cache.insert("k", 1u32, Duration::from_secs(1));
        let sweeper = cache.spawn_sweeper(Duration::from_secs(120));

        tokio::time::sleep(Duration::from_secs(121)).await;
        assert!(cache.is_empty());
        sweeper.abort();
    }
}
