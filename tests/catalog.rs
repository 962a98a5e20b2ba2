mod helpers;

use helpers::{ScriptedTransport, api, ok, search_songs_body, song, song_body, status};
use musicbox::cache::{CacheKey, CachedFetcher, FetchError, FetchSource, Namespace, Payload, TtlCache};
use musicbox::catalog::Catalog;
use musicbox::saavn::SaavnApiError;
use std::sync::Arc;
use std::time::Duration;

fn catalog(transport: &Arc<ScriptedTransport>) -> Catalog {
    Catalog::new(api(transport), CachedFetcher::new(TtlCache::new()))
}

#[tokio::test(start_paused = true)]
async fn search_degrades_while_rate_limited() {
    let transport = ScriptedTransport::new(status(429));
    let catalog = catalog(&transport);

    for _ in 0..2 {
        let fetched = catalog.search_songs("tum hi ho", 1, 10).await.unwrap().unwrap();
        assert!(fetched.is_degraded());
        assert!(!fetched.payload.has_results());
    }
    assert_eq!(transport.calls(), 1, "second search hits the open breaker");

    let key = CacheKey::search(Namespace::SearchSongs, "tum hi ho", 1, 10);
    assert!(catalog.fetcher().cached(&key).is_none());
}

#[tokio::test(start_paused = true)]
async fn search_results_are_ranked_and_cached() {
    let body = search_songs_body(&[
        ("1", "Hawayein", "Arijit Singh"),
        ("2", "Tum Hi Ho", "Arijit Singh"),
        ("3", "Tum Se Hi", "Mohit Chauhan"),
    ]);
    let transport = ScriptedTransport::new(ok(&body));
    let catalog = catalog(&transport);

    let fetched = catalog.search_songs("Tum  Hi Ho", 1, 10).await.unwrap().unwrap();
    let Payload::Songs(page) = fetched.payload.as_ref() else {
        panic!("expected songs, got {}", fetched.payload.kind());
    };
    assert_eq!(page.results[0].id, "2");
    assert_eq!(page.results.len(), 3);

    // Same query modulo case and spacing is a cache hit
    let again = catalog.search_songs("tum hi ho", 1, 10).await.unwrap().unwrap();
    assert_eq!(again.source, FetchSource::Memory);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn lookups_surface_rate_limits() {
    let transport = ScriptedTransport::new(status(429));
    let catalog = catalog(&transport);

    match catalog.song("abc123").await {
        Err(FetchError::Upstream(err)) => assert!(err.is_unavailable()),
        other => panic!("expected upstream error, got {other:?}"),
    }
    match catalog.album("1142502").await {
        Err(FetchError::Upstream(err)) => {
            assert!(matches!(*err, SaavnApiError::CircuitOpen { .. }))
        }
        other => panic!("expected open circuit, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn unknown_ids_are_none() {
    let transport = ScriptedTransport::new(status(404));
    let catalog = catalog(&transport);

    assert!(catalog.song("nope").await.unwrap().is_none());
    assert!(catalog.song("Unknown Artist").await.unwrap().is_none());
    assert_eq!(transport.calls(), 1, "placeholder ids never reach the upstream");
}

#[tokio::test(start_paused = true)]
async fn bulk_lookup_primes_song_keys() {
    let body = r#"{"success":true,"data":[
        {"id":"a","name":"Kesariya","primaryArtists":"Arijit Singh"},
        {"id":"b","name":"Apna Bana Le","primaryArtists":"Arijit Singh"}
    ]}"#;
    let transport = ScriptedTransport::new(ok(body));
    let catalog = catalog(&transport);

    let ids = vec!["a".to_owned(), "b".to_owned(), "a".to_owned()];
    let batch = catalog.songs(&ids).await.unwrap();
    assert!(!batch.fallback);
    let names: Vec<&str> = batch.songs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Kesariya", "Apna Bana Le"]);

    let single = catalog.song("b").await.unwrap().unwrap();
    assert_eq!(single.source, FetchSource::Memory);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn bulk_lookup_falls_back_to_cached_songs() {
    let transport = ScriptedTransport::new(status(429));
    let catalog = catalog(&transport);
    catalog.fetcher().prime(
        &CacheKey::entity(Namespace::Song, "a"),
        Payload::Song(song("a", "Kesariya", "Arijit Singh")),
        Duration::from_secs(60),
    );

    let batch = catalog.songs(&["a".to_owned(), "b".to_owned()]).await.unwrap();
    assert!(batch.fallback);
    assert_eq!(batch.songs.len(), 1);
    assert_eq!(batch.songs[0].id, "a");
}

#[tokio::test(start_paused = true)]
async fn trending_preload_caches_for_a_day() {
    let transport = ScriptedTransport::new(ok(&song_body("fBGE4hKU", "Trending", "Someone")));
    let catalog = catalog(&transport);

    assert_eq!(catalog.preload_trending().await.unwrap(), 1);
    tokio::time::advance(Duration::from_secs(23 * 60 * 60)).await;
    assert!(
        catalog
            .fetcher()
            .cached(&CacheKey::entity(Namespace::Song, "fBGE4hKU"))
            .is_some()
    );
}
