//! Normalized catalog types.
//!
//! Everything downstream of the client (ranking, caching, HTTP responses)
//! works on these. They round-trip through serde for the durable cache tier.

use crate::rank::normalize::decode_html_entities;
use crate::saavn::raw::{
    AlbumField, ArtistEntry, ArtistField, NamedRef, RawAlbum, RawArtist, RawArtistSummary,
    RawGlobalSearch, RawPage, RawPlaylist, RawSong, VariantEntry, VariantField,
};
use serde::{Deserialize, Serialize};

/// Image size served to clients; keeps payloads small on mobile data.
const THUMBNAIL_QUALITY: &str = "150x150";
const FULL_IMAGE_QUALITY: &str = "500x500";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaVariant {
    pub quality: String,
    pub url: String,
}

/// Stream URLs by bitrate tier (96/160/320 kbps).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSet {
    pub low: String,
    pub medium: String,
    pub high: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub image: String,
    pub images: Vec<MediaVariant>,
    pub streams: StreamSet,
    pub stream_variants: Vec<MediaVariant>,
    pub duration: Option<u64>,
    pub language: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub image: String,
    pub images: Vec<MediaVariant>,
    pub year: Option<String>,
    pub language: Option<String>,
    pub song_count: Option<u64>,
    pub songs: Vec<Song>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistSummary {
    pub id: String,
    pub name: String,
    pub role: Option<String>,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub image: String,
    pub images: Vec<MediaVariant>,
    pub follower_count: Option<u64>,
    pub is_verified: bool,
    pub dominant_language: Option<String>,
    pub top_songs: Vec<Song>,
    pub top_albums: Vec<Album>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub language: Option<String>,
    pub song_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub image: String,
    pub images: Vec<MediaVariant>,
    pub song_count: Option<u64>,
    pub songs: Vec<Song>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: Option<u64>,
    pub start: Option<u64>,
    pub results: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            total: None,
            start: None,
            results: Vec::new(),
        }
    }
}

impl<T> Page<T> {
    pub fn from_results(results: Vec<T>) -> Self {
        Self {
            total: None,
            start: None,
            results,
        }
    }

    pub fn with_total(mut self, total: Option<u64>) -> Self {
        self.total = total;
        self
    }

    /// Rewrite the result list, keeping the paging metadata.
    pub fn map_results(self, f: impl FnOnce(Vec<T>) -> Vec<T>) -> Self {
        Self {
            total: self.total,
            start: self.start,
            results: f(self.results),
        }
    }
}

/// `/api/search` flattened: one list per entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSearch {
    pub songs: Vec<Song>,
    pub albums: Vec<Album>,
    pub artists: Vec<ArtistSummary>,
    pub playlists: Vec<PlaylistSummary>,
}

// -- Conversions from wire shapes --

fn clean(text: Option<&str>) -> Option<String> {
    text.map(decode_html_entities)
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

fn display_name(name: Option<&str>, title: Option<&str>) -> String {
    clean(name).or_else(|| clean(title)).unwrap_or_default()
}

fn entry_name(entry: &ArtistEntry) -> Option<String> {
    match entry {
        ArtistEntry::Named(named) => clean(named.label()),
        ArtistEntry::Text(text) => clean(Some(text)),
    }
}

/// Flatten any artist shape into a list of display names.
fn artist_names(field: Option<&ArtistField>) -> Vec<String> {
    match field {
        None => Vec::new(),
        Some(ArtistField::Text(text)) => decode_html_entities(text)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        Some(ArtistField::List(entries)) => entries.iter().filter_map(entry_name).collect(),
        Some(ArtistField::Grouped { primary, featured }) => {
            let mut names: Vec<String> = primary.iter().filter_map(entry_name).collect();
            if names.is_empty() {
                names = featured.iter().filter_map(entry_name).collect();
            }
            names
        }
        Some(ArtistField::Single(named)) => clean(named.label()).into_iter().collect(),
    }
}

fn album_name(field: Option<&AlbumField>) -> Option<String> {
    match field? {
        AlbumField::Text(text) => clean(Some(text)),
        AlbumField::Ref(NamedRef { name, title, .. }) => {
            clean(name.as_deref()).or_else(|| clean(title.as_deref()))
        }
    }
}

fn variants(field: Option<&VariantField>) -> Vec<MediaVariant> {
    match field {
        None => Vec::new(),
        Some(VariantField::Text(url)) if url.is_empty() => Vec::new(),
        Some(VariantField::Text(url)) => vec![MediaVariant {
            quality: String::new(),
            url: url.clone(),
        }],
        Some(VariantField::List(entries)) => entries
            .iter()
            .filter_map(|entry| match entry {
                VariantEntry::Quality(q) => Some(MediaVariant {
                    quality: q.quality.clone().unwrap_or_default(),
                    url: q.href()?.to_owned(),
                }),
                VariantEntry::Text(url) if !url.is_empty() => Some(MediaVariant {
                    quality: String::new(),
                    url: url.clone(),
                }),
                VariantEntry::Text(_) => None,
            })
            .collect(),
    }
}

/// Pick the 150x150 image, or rewrite a bare 500x500 URL down to it.
fn thumbnail(field: Option<&VariantField>, images: &[MediaVariant]) -> String {
    if let Some(VariantField::Text(url)) = field {
        return url.replace(FULL_IMAGE_QUALITY, THUMBNAIL_QUALITY);
    }
    images
        .iter()
        .find(|v| v.quality == THUMBNAIL_QUALITY)
        .or_else(|| images.first())
        .map(|v| v.url.clone())
        .unwrap_or_default()
}

fn stream_set(variants: &[MediaVariant], fallback: Option<&str>) -> StreamSet {
    let find = |kbps: &str| {
        variants
            .iter()
            .find(|v| v.quality == kbps || v.quality == format!("{kbps}kbps"))
            .map(|v| v.url.clone())
            .unwrap_or_default()
    };

    let mut streams = StreamSet {
        low: find("96"),
        medium: find("160"),
        high: find("320"),
    };
    if streams.high.is_empty() {
        streams.high = variants
            .first()
            .map(|v| v.url.clone())
            .or_else(|| fallback.map(str::to_owned))
            .unwrap_or_default();
    }
    streams
}

impl From<RawSong> for Song {
    fn from(raw: RawSong) -> Self {
        let images = variants(raw.image.as_ref());
        let image = thumbnail(raw.image.as_ref(), &images);
        let stream_variants = variants(raw.download_url.as_ref());
        let streams = stream_set(&stream_variants, raw.url.as_deref());

        let mut artists = artist_names(raw.primary_artists.as_ref());
        if artists.is_empty() {
            artists = artist_names(raw.artists.as_ref());
        }
        if artists.is_empty()
            && let Some(singers) = raw.singers.as_deref()
        {
            artists = artist_names(Some(&ArtistField::Text(singers.to_owned())));
        }

        Self {
            name: display_name(raw.name.as_deref(), raw.title.as_deref()),
            id: raw.id,
            artists,
            album: album_name(raw.album.as_ref()),
            image,
            images,
            streams,
            stream_variants,
            duration: raw.duration.as_ref().and_then(|d| d.as_u64()),
            language: clean(raw.language.as_deref()),
            year: raw.year.as_ref().map(|y| y.as_text()),
        }
    }
}

impl From<RawAlbum> for Album {
    fn from(raw: RawAlbum) -> Self {
        let images = variants(raw.image.as_ref());
        let image = thumbnail(raw.image.as_ref(), &images);

        let mut artists = artist_names(raw.primary_artists.as_ref());
        if artists.is_empty() {
            artists = artist_names(raw.artists.as_ref());
        }
        if artists.is_empty()
            && let Some(artist) = raw.artist.as_deref()
        {
            artists = artist_names(Some(&ArtistField::Text(artist.to_owned())));
        }

        Self {
            name: display_name(raw.name.as_deref(), raw.title.as_deref()),
            id: raw.id,
            artists,
            image,
            images,
            year: raw.year.as_ref().map(|y| y.as_text()),
            language: clean(raw.language.as_deref()),
            song_count: raw.song_count.as_ref().and_then(|c| c.as_u64()),
            songs: raw.songs.into_iter().map(Song::from).collect(),
        }
    }
}

impl From<RawArtistSummary> for ArtistSummary {
    fn from(raw: RawArtistSummary) -> Self {
        let images = variants(raw.image.as_ref());
        Self {
            name: display_name(raw.name.as_deref(), raw.title.as_deref()),
            id: raw.id,
            role: clean(raw.role.as_deref()).or_else(|| clean(raw.kind.as_deref())),
            image: thumbnail(raw.image.as_ref(), &images),
        }
    }
}

impl From<RawArtist> for Artist {
    fn from(raw: RawArtist) -> Self {
        let images = variants(raw.image.as_ref());
        Self {
            name: display_name(raw.name.as_deref(), None),
            id: raw.id,
            image: thumbnail(raw.image.as_ref(), &images),
            images,
            follower_count: raw.follower_count.as_ref().and_then(|c| c.as_u64()),
            is_verified: raw.is_verified.unwrap_or(false),
            dominant_language: clean(raw.dominant_language.as_deref()),
            top_songs: raw.top_songs.into_iter().map(Song::from).collect(),
            top_albums: raw.top_albums.into_iter().map(Album::from).collect(),
        }
    }
}

impl From<RawPlaylist> for PlaylistSummary {
    fn from(raw: RawPlaylist) -> Self {
        let images = variants(raw.image.as_ref());
        Self {
            name: display_name(raw.name.as_deref(), raw.title.as_deref()),
            id: raw.id,
            image: thumbnail(raw.image.as_ref(), &images),
            language: clean(raw.language.as_deref()),
            song_count: raw.song_count.as_ref().and_then(|c| c.as_u64()),
        }
    }
}

impl From<RawPlaylist> for Playlist {
    fn from(raw: RawPlaylist) -> Self {
        let images = variants(raw.image.as_ref());
        Self {
            name: display_name(raw.name.as_deref(), raw.title.as_deref()),
            id: raw.id,
            image: thumbnail(raw.image.as_ref(), &images),
            images,
            song_count: raw.song_count.as_ref().and_then(|c| c.as_u64()),
            songs: raw.songs.into_iter().map(Song::from).collect(),
        }
    }
}

impl<R, T: From<R>> From<RawPage<R>> for Page<T> {
    fn from(raw: RawPage<R>) -> Self {
        Self {
            total: raw.total.as_ref().and_then(|t| t.as_u64()),
            start: raw.start.as_ref().and_then(|s| s.as_u64()),
            results: raw.results.into_iter().map(T::from).collect(),
        }
    }
}

impl From<RawGlobalSearch> for GlobalSearch {
    fn from(raw: RawGlobalSearch) -> Self {
        fn section<R, T: From<R>>(s: Option<crate::saavn::raw::RawSection<R>>) -> Vec<T> {
            s.map(|s| s.results.into_iter().map(T::from).collect())
                .unwrap_or_default()
        }

        Self {
            songs: section(raw.songs),
            albums: section(raw.albums),
            artists: section(raw.artists),
            playlists: section(raw.playlists),
        }
    }
}
