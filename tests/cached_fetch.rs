mod helpers;

use chrono::Utc;
use futures::future::join_all;
use helpers::song;
use musicbox::cache::durable::MISSING_FLAG_THRESHOLD;
use musicbox::cache::{
    CacheKey, CachedFetcher, DurableRecord, DurableStore, DurableWriter, FetchError, FetchSource,
    MemoryStore, Namespace, Payload, Produced, TtlCache,
};
use musicbox::saavn::SaavnApiError;
use musicbox::saavn::models::Page;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn durable_fetcher() -> (CachedFetcher, Arc<MemoryStore>, DurableWriter) {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn DurableStore> = store.clone();
    let writer = DurableWriter::spawn(dyn_store.clone(), 64);
    let fetcher = CachedFetcher::new(TtlCache::new()).with_durable(dyn_store, writer.clone());
    (fetcher, store, writer)
}

#[tokio::test(start_paused = true)]
async fn concurrent_fetches_share_one_producer_call() {
    let fetcher = CachedFetcher::new(TtlCache::new());
    let key = CacheKey::entity(Namespace::Song, "abc123");
    let calls = Arc::new(AtomicUsize::new(0));

    let fetches = (0..10).map(|_| {
        let calls = calls.clone();
        fetcher.fetch(&key, key.ttl(), false, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(Produced::Fresh(Payload::Song(song("abc123", "Tum Hi Ho", "Arijit Singh"))))
        })
    });
    let results = join_all(fetches).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let first = results[0].as_ref().unwrap().as_ref().unwrap();
    for result in &results {
        let fetched = result.as_ref().unwrap().as_ref().unwrap();
        assert!(Arc::ptr_eq(&fetched.payload, &first.payload));
    }
    assert_eq!(fetcher.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_fetches_share_one_failure() {
    let fetcher = CachedFetcher::new(TtlCache::new());
    let key = CacheKey::entity(Namespace::Album, "1142502");
    let calls = Arc::new(AtomicUsize::new(0));

    let produce = |calls: Arc<AtomicUsize>| {
        move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err::<Produced, _>(SaavnApiError::Timeout)
        }
    };

    let results = join_all((0..5).map(|_| fetcher.fetch(&key, key.ttl(), false, produce(calls.clone())))).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
        match result {
            Err(FetchError::Upstream(err)) => assert!(matches!(*err, SaavnApiError::Timeout)),
            other => panic!("expected shared timeout, got {other:?}"),
        }
    }

    // Failures are not remembered
    let _ = fetcher.fetch(&key, key.ttl(), false, produce(calls.clone())).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn cached_song_survives_a_failing_upstream() {
    let fetcher = CachedFetcher::new(TtlCache::new());
    let key = CacheKey::entity(Namespace::Song, "abc123");

    let first = fetcher
        .fetch(&key, key.ttl(), false, || async {
            Ok(Produced::Fresh(Payload::Song(song("abc123", "Tum Hi Ho", "Arijit Singh"))))
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.source, FetchSource::Upstream);

    let second = fetcher
        .fetch(&key, key.ttl(), false, || async {
            Err(SaavnApiError::RateLimited {
                cooldown: Duration::from_secs(60),
            })
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.source, FetchSource::Memory);
    assert!(matches!(second.payload.as_ref(), Payload::Song(s) if s.id == "abc123"));
}

#[tokio::test(start_paused = true)]
async fn degraded_results_are_never_cached_or_persisted() {
    let (fetcher, store, writer) = durable_fetcher();
    let key = CacheKey::search(Namespace::SearchSongs, "tum hi ho", 1, 10);
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let calls = calls.clone();
        let fetched = fetcher
            .fetch(&key, key.ttl(), true, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Produced::Degraded(Payload::Songs(Page::default())))
            })
            .await
            .unwrap()
            .unwrap();
        assert!(fetched.is_degraded());
    }
    writer.flush().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(fetcher.cached(&key).is_none());
    assert!(store.is_empty());
    assert!(store.missing("tum hi ho").is_none());
}

#[tokio::test(start_paused = true)]
async fn durable_hit_backfills_memory() {
    let (fetcher, store, _writer) = durable_fetcher();
    let key = CacheKey::search(Namespace::SearchSongs, "Kesariya", 1, 10);
    let payload = Payload::Songs(Page::from_results(vec![song("k1", "Kesariya", "Arijit Singh")]));
    store
        .put(&key.sanitized(), &DurableRecord::new(payload.clone(), key.ttl(), Utc::now()))
        .await
        .unwrap();

    let fetched = fetcher
        .fetch(&key, key.ttl(), true, || async { Err(SaavnApiError::Timeout) })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.source, FetchSource::Durable);
    assert_eq!(fetched.payload.as_ref(), &payload);
    assert!(fetcher.cached(&key).is_some());
}

#[tokio::test(start_paused = true)]
async fn durable_tier_is_skipped_unless_requested() {
    let (fetcher, store, _writer) = durable_fetcher();
    let key = CacheKey::entity(Namespace::Song, "abc123");
    let stale = Payload::Song(song("abc123", "Old Name", "Arijit Singh"));
    store
        .put(&key.sanitized(), &DurableRecord::new(stale, key.ttl(), Utc::now()))
        .await
        .unwrap();

    let fetched = fetcher
        .fetch(&key, key.ttl(), false, || async {
            Ok(Produced::Fresh(Payload::Song(song("abc123", "Tum Hi Ho", "Arijit Singh"))))
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.source, FetchSource::Upstream);
}

#[tokio::test(start_paused = true)]
async fn repeated_empty_searches_get_flagged() {
    let (fetcher, store, writer) = durable_fetcher();
    let key = CacheKey::search(Namespace::SearchSongs, "  Qwxzv   Song ", 1, 10);

    for _ in 0..MISSING_FLAG_THRESHOLD {
        fetcher
            .fetch(&key, key.ttl(), true, || async {
                Ok(Produced::Fresh(Payload::Songs(Page::default())))
            })
            .await
            .unwrap();
    }
    writer.flush().await;

    let missing = store.missing("qwxzv song").expect("missing query recorded");
    assert_eq!(missing.count, MISSING_FLAG_THRESHOLD);
    assert!(missing.flagged);

    let record = store.record(&key.sanitized()).expect("empty result persisted");
    assert!(!record.has_results);
}

#[tokio::test(start_paused = true)]
async fn store_outage_is_absorbed() {
    let (fetcher, store, writer) = durable_fetcher();
    store.set_unavailable(true);
    let key = CacheKey::search(Namespace::SearchAlbums, "aashiqui", 1, 10);

    let fetched = fetcher
        .fetch(&key, key.ttl(), true, || async {
            Ok(Produced::Fresh(Payload::Songs(Page::from_results(vec![song(
                "a2",
                "Aashiqui 2",
                "Mithoon",
            )]))))
        })
        .await
        .unwrap()
        .unwrap();
    writer.flush().await;

    assert_eq!(fetched.source, FetchSource::Upstream);
    assert!(fetcher.cached(&key).is_some());
}

#[tokio::test(start_paused = true)]
async fn dropped_caller_does_not_cancel_the_fetch() {
    let fetcher = CachedFetcher::new(TtlCache::new());
    let key = CacheKey::entity(Namespace::Song, "slow");
    let calls = Arc::new(AtomicUsize::new(0));

    let caller = {
        let fetcher = fetcher.clone();
        let key = key.clone();
        let calls = calls.clone();
        tokio::spawn(async move {
            fetcher
                .fetch(&key, key.ttl(), false, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok(Produced::Fresh(Payload::Song(song("slow", "Slow Song", "Someone"))))
                })
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    caller.abort();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(fetcher.cached(&key).is_some());
    assert_eq!(fetcher.in_flight(), 0);
}
