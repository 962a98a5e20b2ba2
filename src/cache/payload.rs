use crate::saavn::models::{
    Album, Artist, ArtistSummary, GlobalSearch, Page, Playlist, PlaylistSummary, Song,
};
use serde::{Deserialize, Serialize, Serializer};

/// Every value the cache tiers hold.
///
/// Tagged so a record read back from the durable store decodes to the same
/// variant that was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum Payload {
    SearchAll(GlobalSearch),
    Songs(Page<Song>),
    Albums(Page<Album>),
    Artists(Page<ArtistSummary>),
    Playlists(Page<PlaylistSummary>),
    Song(Song),
    SongList(Vec<Song>),
    Album(Album),
    Artist(Artist),
    Playlist(Playlist),
}

impl Payload {
    /// False for result lists that came back empty. Single entities always
    /// count as results.
    pub fn has_results(&self) -> bool {
        match self {
            Self::SearchAll(search) => {
                !(search.songs.is_empty()
                    && search.albums.is_empty()
                    && search.artists.is_empty()
                    && search.playlists.is_empty())
            }
            Self::Songs(page) => !page.results.is_empty(),
            Self::Albums(page) => !page.results.is_empty(),
            Self::Artists(page) => !page.results.is_empty(),
            Self::Playlists(page) => !page.results.is_empty(),
            Self::SongList(songs) => !songs.is_empty(),
            Self::Song(_) | Self::Album(_) | Self::Artist(_) | Self::Playlist(_) => true,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SearchAll(_) => "searchAll",
            Self::Songs(_) => "songs",
            Self::Albums(_) => "albums",
            Self::Artists(_) => "artists",
            Self::Playlists(_) => "playlists",
            Self::Song(_) => "song",
            Self::SongList(_) => "songList",
            Self::Album(_) => "album",
            Self::Artist(_) => "artist",
            Self::Playlist(_) => "playlist",
        }
    }

    /// Serializes as the inner value alone, without the storage tag.
    pub fn body(&self) -> PayloadBody<'_> {
        PayloadBody(self)
    }
}

pub struct PayloadBody<'a>(&'a Payload);

impl Serialize for PayloadBody<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Payload::SearchAll(v) => v.serialize(serializer),
            Payload::Songs(v) => v.serialize(serializer),
            Payload::Albums(v) => v.serialize(serializer),
            Payload::Artists(v) => v.serialize(serializer),
            Payload::Playlists(v) => v.serialize(serializer),
            Payload::Song(v) => v.serialize(serializer),
            Payload::SongList(v) => v.serialize(serializer),
            Payload::Album(v) => v.serialize(serializer),
            Payload::Artist(v) => v.serialize(serializer),
            Payload::Playlist(v) => v.serialize(serializer),
        }
    }
}
