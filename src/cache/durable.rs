//! Second cache tier that survives restarts, plus the missing-search audit log.
//!
//! Never required for correctness: every failure here is logged by the caller
//! and treated as a miss or a skipped write.

use crate::cache::key::sanitize_key;
use crate::cache::payload::Payload;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A query is flagged for review once it has come back empty this many times.
pub const MISSING_FLAG_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurableRecord {
    pub payload: Payload,
    pub expires_at: DateTime<Utc>,
    pub has_results: bool,
}

impl DurableRecord {
    pub fn new(payload: Payload, ttl: Duration, now: DateTime<Utc>) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Self {
            has_results: payload.has_results(),
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            payload,
        }
    }

    /// Lifetime left at `now`, or `None` once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.expires_at - now)
            .to_std()
            .ok()
            .filter(|left| !left.is_zero())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingQueryRecord {
    pub query: String,
    pub count: u32,
    pub last_requested_at: DateTime<Utc>,
    pub flagged: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("durable store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait DurableStore: Send + Sync + 'static {
    /// Record stored under an already-sanitized key, expired or not.
    async fn get(&self, key: &str) -> Result<Option<DurableRecord>, StoreError>;

    async fn put(&self, key: &str, record: &DurableRecord) -> Result<(), StoreError>;

    /// Count one more empty result for `query` and return the updated record.
    async fn record_missing(
        &self,
        query: &str,
        at: DateTime<Utc>,
    ) -> Result<MissingQueryRecord, StoreError>;
}

/// In-process store for tests and running without a database.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, DurableRecord>,
    missing: DashMap<String, MissingQueryRecord>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail, as if the backing service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    pub fn record(&self, key: &str) -> Option<DurableRecord> {
        self.records.get(key).map(|r| r.value().clone())
    }

    pub fn missing(&self, query: &str) -> Option<MissingQueryRecord> {
        self.missing.get(&sanitize_key(query)).map(|r| r.value().clone())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::Relaxed) {
            Err(StoreError::Unavailable("memory store switched off".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<DurableRecord>, StoreError> {
        self.check()?;
        Ok(self.record(key))
    }

    async fn put(&self, key: &str, record: &DurableRecord) -> Result<(), StoreError> {
        self.check()?;
        self.records.insert(key.to_owned(), record.clone());
        Ok(())
    }

    async fn record_missing(
        &self,
        query: &str,
        at: DateTime<Utc>,
    ) -> Result<MissingQueryRecord, StoreError> {
        self.check()?;
        let mut entry = self
            .missing
            .entry(sanitize_key(query))
            .or_insert_with(|| MissingQueryRecord {
                query: query.to_owned(),
                count: 0,
                last_requested_at: at,
                flagged: false,
            });
        entry.count += 1;
        entry.last_requested_at = at;
        entry.flagged = entry.count >= MISSING_FLAG_THRESHOLD;
        Ok(entry.value().clone())
    }
}
