#![allow(dead_code)]

use async_trait::async_trait;
use musicbox::saavn::models::{Song, StreamSet};
use musicbox::saavn::{QueryParams, RawResponse, RetryPolicy, SaavnApi, Transport, TransportError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub type Reply = Result<RawResponse, TransportError>;

/// Transport that plays back queued replies, then repeats a default one.
///
/// Records every call so tests can check how the client used the wire.
pub struct ScriptedTransport {
    queued: Mutex<VecDeque<Reply>>,
    default: Mutex<Reply>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    paths: Mutex<Vec<String>>,
    sent_at: Mutex<Vec<Instant>>,
}

impl ScriptedTransport {
    pub fn new(default: Reply) -> Arc<Self> {
        Self::with_delay(default, Duration::ZERO)
    }

    pub fn with_delay(default: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            queued: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
            sent_at: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, reply: Reply) {
        self.queued.lock().unwrap().push_back(reply);
    }

    pub fn set_default(&self, reply: Reply) {
        *self.default.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    /// Gaps between consecutive calls, on the tokio clock.
    pub fn gaps(&self) -> Vec<Duration> {
        let sent_at = self.sent_at.lock().unwrap();
        sent_at.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, path: &str, _query: &QueryParams) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().unwrap().push(path.to_owned());
        self.sent_at.lock().unwrap().push(Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.lock().unwrap().clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

pub fn ok(body: &str) -> Reply {
    Ok(RawResponse::new(200, body))
}

pub fn status(code: u16) -> Reply {
    Ok(RawResponse::new(code, format!("{{\"message\":\"HTTP {code}\"}}")))
}

pub fn policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_secs(1),
        cooldown: Duration::from_secs(60),
        min_spacing: Duration::ZERO,
    }
}

pub fn api(transport: &Arc<ScriptedTransport>) -> Arc<SaavnApi> {
    api_with(transport, policy())
}

pub fn api_with(transport: &Arc<ScriptedTransport>, policy: RetryPolicy) -> Arc<SaavnApi> {
    let transport: Arc<dyn Transport> = transport.clone();
    Arc::new(SaavnApi::with_transport(transport, policy))
}

pub fn song(id: &str, name: &str, artist: &str) -> Song {
    Song {
        id: id.to_owned(),
        name: name.to_owned(),
        artists: vec![artist.to_owned()],
        album: None,
        image: String::new(),
        images: Vec::new(),
        streams: StreamSet::default(),
        stream_variants: Vec::new(),
        duration: None,
        language: Some("hindi".to_owned()),
        year: None,
    }
}

/// Saavn `/api/songs/{id}` body for one song.
pub fn song_body(id: &str, name: &str, artist: &str) -> String {
    format!(
        r#"{{"success":true,"data":[{{"id":"{id}","name":"{name}","primaryArtists":"{artist}","language":"hindi"}}]}}"#
    )
}

/// Saavn `/api/search/songs` body.
pub fn search_songs_body(songs: &[(&str, &str, &str)]) -> String {
    let results: Vec<String> = songs
        .iter()
        .map(|(id, name, artist)| {
            format!(r#"{{"id":"{id}","name":"{name}","primaryArtists":"{artist}","language":"hindi"}}"#)
        })
        .collect();
    format!(
        r#"{{"success":true,"data":{{"total":{},"start":1,"results":[{}]}}}}"#,
        songs.len(),
        results.join(",")
    )
}
