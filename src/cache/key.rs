//! Cache key grammar and per-namespace TTL policy.

use crate::rank::normalize::collapse_whitespace;
use std::fmt;
use std::time::Duration;

/// Pre-warmed trending songs outlive the regular song TTL.
pub const TRENDING_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Search,
    SearchSongs,
    SearchAlbums,
    SearchArtists,
    SearchPlaylists,
    Song,
    Suggestions,
    Album,
    Artist,
    ArtistSongs,
    ArtistAlbums,
    Playlist,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::SearchSongs => "searchSongs",
            Self::SearchAlbums => "searchAlbums",
            Self::SearchArtists => "searchArtists",
            Self::SearchPlaylists => "searchPlaylists",
            Self::Song => "song",
            Self::Suggestions => "suggestions",
            Self::Album => "album",
            Self::Artist => "artist",
            Self::ArtistSongs => "artistSongs",
            Self::ArtistAlbums => "artistAlbums",
            Self::Playlist => "playlist",
        }
    }

    /// How long a fresh value in this namespace stays cached.
    pub fn ttl(self) -> Duration {
        const MINUTE: u64 = 60;
        const HOUR: u64 = 60 * MINUTE;
        let secs = match self {
            Self::Search
            | Self::SearchSongs
            | Self::SearchAlbums
            | Self::SearchArtists
            | Self::SearchPlaylists => 10 * MINUTE,
            Self::Song | Self::Suggestions => 6 * HOUR,
            Self::Album | Self::Artist => 24 * HOUR,
            Self::ArtistSongs | Self::ArtistAlbums | Self::Playlist => 6 * HOUR,
        };
        Duration::from_secs(secs)
    }

    pub fn is_search(self) -> bool {
        matches!(
            self,
            Self::Search
                | Self::SearchSongs
                | Self::SearchAlbums
                | Self::SearchArtists
                | Self::SearchPlaylists
        )
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<namespace>:<param>:<param>...`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: Namespace,
    params: Vec<String>,
}

impl CacheKey {
    pub fn new<I, S>(namespace: Namespace, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespace,
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// `search:<query>:<page>:<limit>`. Case and spacing of the query do not
    /// produce distinct keys.
    pub fn search(namespace: Namespace, query: &str, page: u32, limit: u32) -> Self {
        let query = collapse_whitespace(query).to_lowercase();
        Self::new(namespace, [query, page.to_string(), limit.to_string()])
    }

    /// `<namespace>:<id>`
    pub fn entity(namespace: Namespace, id: &str) -> Self {
        Self::new(namespace, [id.trim()])
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn ttl(&self) -> Duration {
        self.namespace.ttl()
    }

    /// The query text of a search key.
    pub fn search_query(&self) -> Option<&str> {
        if self.namespace.is_search() {
            self.params.first().map(String::as_str)
        } else {
            None
        }
    }

    /// Form used to address the durable store.
    pub fn sanitized(&self) -> String {
        sanitize_key(&self.to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace.as_str())?;
        for param in &self.params {
            write!(f, ":{param}")?;
        }
        Ok(())
    }
}

/// Replace characters that are unsafe in durable-store paths with `_`.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '.' | '$' | '#' | '[' | ']' | '/' => '_',
            other => other,
        })
        .collect()
}
