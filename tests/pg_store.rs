//! PostgreSQL durable tier against a real database.
//!
//! `#[sqlx::test]` creates a scratch database per test from `DATABASE_URL`
//! and applies `./migrations` first.

mod helpers;

use chrono::{DateTime, SubsecRound, Utc};
use helpers::song;
use musicbox::cache::{DurableRecord, DurableStore, Payload, PgStore};
use musicbox::saavn::models::Page;
use sqlx::PgPool;
use std::time::Duration;

/// Postgres keeps microseconds; round so records compare equal after a trip.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

fn songs_record(at: DateTime<Utc>, ttl: Duration) -> DurableRecord {
    let page = Page::from_results(vec![song("s1", "Tum Hi Ho", "Arijit Singh")]);
    DurableRecord::new(Payload::Songs(page), ttl, at)
}

#[sqlx::test]
async fn put_then_get_returns_the_same_record(pool: PgPool) {
    let store = PgStore::new(pool);
    let record = songs_record(now(), Duration::from_secs(600));

    store.put("search_songs:tum hi ho", &record).await.unwrap();
    let stored = store.get("search_songs:tum hi ho").await.unwrap();

    assert_eq!(stored, Some(record));
    assert!(store.get("search_songs:other").await.unwrap().is_none());
}

#[sqlx::test]
async fn put_overwrites_an_existing_key(pool: PgPool) {
    let store = PgStore::new(pool);
    let first = songs_record(now(), Duration::from_secs(60));
    let empty = DurableRecord::new(Payload::Songs(Page::default()), Duration::from_secs(600), now());

    store.put("search_songs:x", &first).await.unwrap();
    store.put("search_songs:x", &empty).await.unwrap();

    let stored = store.get("search_songs:x").await.unwrap().unwrap();
    assert!(!stored.has_results);
    assert_eq!(stored, empty);
}

#[sqlx::test]
async fn repeated_missing_queries_get_flagged(pool: PgPool) {
    let store = PgStore::new(pool);

    let first = store.record_missing("Obscure Song", now()).await.unwrap();
    assert_eq!(first.count, 1);
    assert!(!first.flagged);

    let second = store.record_missing("Obscure Song", now()).await.unwrap();
    assert_eq!(second.count, 2);
    assert!(second.flagged);
    assert_eq!(second.query, "Obscure Song");
}

#[sqlx::test]
async fn purge_expired_only_removes_dead_records(pool: PgPool) {
    let store = PgStore::new(pool);
    let stale = songs_record(now() - chrono::Duration::hours(2), Duration::from_secs(60));
    let live = songs_record(now(), Duration::from_secs(3600));

    store.put("song:stale", &stale).await.unwrap();
    store.put("song:live", &live).await.unwrap();

    assert_eq!(store.purge_expired().await.unwrap(), 1);
    assert!(store.get("song:stale").await.unwrap().is_none());
    assert_eq!(store.get("song:live").await.unwrap(), Some(live));
}
