//! Wire shapes of the Saavn API.
//!
//! The same logical field arrives in several forms depending on endpoint and
//! API revision (a string, a list of objects, a `{primary: [...]}` group). Each
//! variation is an untagged enum here and is resolved exactly once, when the
//! raw value is converted into a [`models`](super::models) type.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumOrText {
    Num(f64),
    Text(String),
}

impl NumOrText {
    pub fn as_text(&self) -> String {
        match self {
            Self::Num(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            Self::Num(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Num(n) if *n >= 0.0 => Some(*n as u64),
            Self::Num(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedRef {
    pub id: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
}

impl NamedRef {
    pub fn label(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.title.as_deref())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ArtistEntry {
    Named(NamedRef),
    Text(String),
}

/// `primaryArtists` / `artists` in every shape the API has produced.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ArtistField {
    Text(String),
    List(Vec<ArtistEntry>),
    Grouped {
        primary: Vec<ArtistEntry>,
        #[serde(default)]
        featured: Vec<ArtistEntry>,
    },
    Single(NamedRef),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AlbumField {
    Text(String),
    Ref(NamedRef),
}

#[derive(Debug, Clone, Deserialize)]
pub struct QualityUrl {
    pub quality: Option<String>,
    pub url: Option<String>,
    pub link: Option<String>,
}

impl QualityUrl {
    pub fn href(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.link.as_deref())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VariantEntry {
    Quality(QualityUrl),
    Text(String),
}

/// `image` and `downloadUrl`: a single URL or a list of quality variants.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VariantField {
    Text(String),
    List(Vec<VariantEntry>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSong {
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub primary_artists: Option<ArtistField>,
    pub artists: Option<ArtistField>,
    pub singers: Option<String>,
    pub album: Option<AlbumField>,
    pub image: Option<VariantField>,
    pub download_url: Option<VariantField>,
    pub url: Option<String>,
    pub duration: Option<NumOrText>,
    pub language: Option<String>,
    pub year: Option<NumOrText>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAlbum {
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub primary_artists: Option<ArtistField>,
    pub artists: Option<ArtistField>,
    pub image: Option<VariantField>,
    pub year: Option<NumOrText>,
    pub language: Option<String>,
    pub song_count: Option<NumOrText>,
    #[serde(default)]
    pub songs: Vec<RawSong>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArtistSummary {
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub role: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub image: Option<VariantField>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawArtist {
    pub id: String,
    pub name: Option<String>,
    pub image: Option<VariantField>,
    pub follower_count: Option<NumOrText>,
    pub is_verified: Option<bool>,
    pub dominant_language: Option<String>,
    #[serde(default)]
    pub top_songs: Vec<RawSong>,
    #[serde(default)]
    pub top_albums: Vec<RawAlbum>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPlaylist {
    pub id: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub image: Option<VariantField>,
    pub language: Option<String>,
    pub song_count: Option<NumOrText>,
    #[serde(default)]
    pub songs: Vec<RawSong>,
}

/// Paged search results: `{total, start, results}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPage<T> {
    pub total: Option<NumOrText>,
    pub start: Option<NumOrText>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSection<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// `/api/search`: one section per entity type.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGlobalSearch {
    pub songs: Option<RawSection<RawSong>>,
    pub albums: Option<RawSection<RawAlbum>>,
    pub artists: Option<RawSection<RawArtistSummary>>,
    pub playlists: Option<RawSection<RawPlaylist>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawArtistSongs {
    pub total: Option<NumOrText>,
    #[serde(default)]
    pub songs: Vec<RawSong>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawArtistAlbums {
    pub total: Option<NumOrText>,
    #[serde(default)]
    pub albums: Vec<RawAlbum>,
}
