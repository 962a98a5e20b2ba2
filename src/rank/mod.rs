//! Relevance ranking and deduplication of upstream search results.
//!
//! Saavn's own ordering is noisy: remixes, covers and unrelated tracks often
//! outrank the exact title a user typed. Results are re-scored against the
//! query with a fuzzy, weighted token match:
//!
//! 1. Query and item text are normalized ([`normalize::normalize_text`]).
//! 2. Each item exposes weighted fields: name (2.0), artists (1.2) and, for
//!    songs, album (0.8).
//! 3. Every query token takes its best weighted similarity over all field
//!    tokens, counting only similarities within the edit-distance tolerance.
//!    Items matching fewer than half the query tokens are dropped.
//! 4. Name coverage and exact/phrase matches add bonuses, then a stable sort
//!    orders by score so ties keep upstream order.
//! 5. If nothing survives, a plain substring match on the name is used instead.
//!
//! Scoring is a pure function of `(query, items)`, so identical inputs always
//! produce identical output and cached rankings are reproducible.

pub(crate) mod fuzzy;
pub mod normalize;

use crate::saavn::models::{Album, Song};
use fuzzy::{MATCH_SIMILARITY, token_similarity};
use normalize::{normalize_text, tokens};
use std::collections::HashSet;
use tracing::trace;

const NAME_WEIGHT: f64 = 2.0;
const ARTIST_WEIGHT: f64 = 1.2;
const ALBUM_WEIGHT: f64 = 0.8;

/// Scaled by the fraction of name tokens the query accounts for, so
/// "Tum Hi Ho" beats "Tum Hi Ho (Unplugged)" for the query "tum hi ho".
const NAME_COVERAGE_BONUS: f64 = 0.5;
const EXACT_NAME_BONUS: f64 = 1.0;
const PHRASE_BONUS: f64 = 0.25;

const SIMILAR_LANGUAGE_BOOST: u32 = 5;
const SIMILAR_ARTIST_BOOST: u32 = 5;

/// A search result that can be scored against a query.
pub trait Rankable {
    fn primary_name(&self) -> &str;
    fn artist_names(&self) -> &[String];
    fn album_name(&self) -> Option<&str> {
        None
    }
}

impl Rankable for Song {
    fn primary_name(&self) -> &str {
        &self.name
    }

    fn artist_names(&self) -> &[String] {
        &self.artists
    }

    fn album_name(&self) -> Option<&str> {
        self.album.as_deref()
    }
}

impl Rankable for Album {
    fn primary_name(&self) -> &str {
        &self.name
    }

    fn artist_names(&self) -> &[String] {
        &self.artists
    }
}

struct Field {
    tokens: Vec<String>,
    weight: f64,
}

/// Normalized, tokenized view of one item.
struct Searchable {
    name: String,
    name_tokens: Vec<String>,
    fields: Vec<Field>,
}

impl Searchable {
    fn of<T: Rankable>(item: &T) -> Self {
        let name = normalize_text(item.primary_name());
        let name_tokens = tokens(&name);
        let artists = normalize_text(&item.artist_names().join(" "));

        let mut fields = vec![
            Field {
                tokens: name_tokens.clone(),
                weight: NAME_WEIGHT,
            },
            Field {
                tokens: tokens(&artists),
                weight: ARTIST_WEIGHT,
            },
        ];
        if let Some(album) = item.album_name() {
            fields.push(Field {
                tokens: tokens(&normalize_text(album)),
                weight: ALBUM_WEIGHT,
            });
        }

        Self {
            name,
            name_tokens,
            fields,
        }
    }
}

struct Query {
    text: String,
    tokens: Vec<String>,
}

/// Whole-word containment of `phrase` in `text`, both normalized.
fn contains_phrase(text: &str, phrase: &str) -> bool {
    format!(" {text} ").contains(&format!(" {phrase} "))
}

/// `None` when the item is not a fuzzy candidate for the query.
fn score(query: &Query, item: &Searchable) -> Option<f64> {
    let mut matched = 0usize;
    let mut weighted = 0.0;

    for qt in &query.tokens {
        let best = item
            .fields
            .iter()
            .flat_map(|field| {
                field
                    .tokens
                    .iter()
                    .map(move |ft| (token_similarity(qt, ft), field.weight))
            })
            .filter(|(similarity, _)| *similarity >= MATCH_SIMILARITY)
            .map(|(similarity, weight)| similarity * weight)
            .fold(None, |best: Option<f64>, v| {
                Some(best.map_or(v, |b| b.max(v)))
            });

        if let Some(best) = best {
            matched += 1;
            weighted += best;
        }
    }

    if matched == 0 || matched * 2 < query.tokens.len() {
        return None;
    }

    let mut score = weighted / (query.tokens.len() as f64 * NAME_WEIGHT);

    if !item.name_tokens.is_empty() {
        let covered = item
            .name_tokens
            .iter()
            .filter(|nt| {
                query
                    .tokens
                    .iter()
                    .any(|qt| token_similarity(qt, nt) >= MATCH_SIMILARITY)
            })
            .count();
        score += NAME_COVERAGE_BONUS * covered as f64 / item.name_tokens.len() as f64;
    }

    if item.name == query.text {
        score += EXACT_NAME_BONUS;
    } else if contains_phrase(&item.name, &query.text) {
        score += PHRASE_BONUS;
    }

    Some(score)
}

/// Order `items` by relevance to `query`, dropping unrelated items.
///
/// An empty (after normalization) query returns the input untouched.
pub fn rank<T: Rankable>(query: &str, items: Vec<T>) -> Vec<T> {
    let text = normalize_text(query);
    if text.is_empty() || items.is_empty() {
        return items;
    }
    let query = Query {
        tokens: tokens(&text),
        text,
    };

    let mut scored: Vec<(f64, T)> = Vec::with_capacity(items.len());
    let mut unmatched = Vec::new();
    for item in items {
        match score(&query, &Searchable::of(&item)) {
            Some(s) => scored.push((s, item)),
            None => unmatched.push(item),
        }
    }

    if scored.is_empty() {
        trace!(
            query = %query.text,
            candidates = unmatched.len(),
            "No fuzzy matches, falling back to substring match"
        );
        return unmatched
            .into_iter()
            .filter(|item| normalize_text(item.primary_name()).contains(&query.text))
            .collect();
    }

    // `sort_by` is stable: equal scores keep upstream order
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, item)| item).collect()
}

/// Keep the first song for each `(normalized name, normalized artists)` pair.
pub fn dedupe_songs(songs: Vec<Song>) -> Vec<Song> {
    let mut seen = HashSet::new();
    songs
        .into_iter()
        .filter(|song| {
            seen.insert((
                normalize_text(&song.name),
                normalize_text(&song.artists.join(" ")),
            ))
        })
        .collect()
}

/// Rank then deduplicate song results.
pub fn rank_songs(query: &str, songs: Vec<Song>) -> Vec<Song> {
    dedupe_songs(rank(query, songs))
}

/// Rank album results. Distinct releases may share a name, so no dedup.
pub fn rank_albums(query: &str, albums: Vec<Album>) -> Vec<Album> {
    rank(query, albums)
}

/// Reorder "similar songs" so tracks sharing the listener's current language
/// or artist come first. Stable, so the upstream order breaks ties.
pub fn rank_similar(songs: Vec<Song>, language: Option<&str>, artist: Option<&str>) -> Vec<Song> {
    let language = language.map(normalize_text).filter(|s| !s.is_empty());
    let artist = artist.map(normalize_text).filter(|s| !s.is_empty());
    if language.is_none() && artist.is_none() {
        return songs;
    }

    let mut boosted: Vec<(u32, Song)> = songs
        .into_iter()
        .map(|song| {
            let mut boost = 0;
            if let Some(language) = &language
                && song.language.as_deref().map(normalize_text).as_ref() == Some(language)
            {
                boost += SIMILAR_LANGUAGE_BOOST;
            }
            if let Some(artist) = &artist
                && song
                    .artists
                    .iter()
                    .any(|a| contains_phrase(&normalize_text(a), artist))
            {
                boost += SIMILAR_ARTIST_BOOST;
            }
            (boost, song)
        })
        .collect();

    boosted.sort_by(|a, b| b.0.cmp(&a.0));
    boosted.into_iter().map(|(_, song)| song).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saavn::models::StreamSet;

    fn song(id: &str, name: &str, artist: &str) -> Song {
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
            language: None,
            year: None,
        }
    }

    fn album(id: &str, name: &str, artist: &str) -> Album {
        Album {
            id: id.to_owned(),
            name: name.to_owned(),
            artists: vec![artist.to_owned()],
            image: String::new(),
            images: Vec::new(),
            year: None,
            language: None,
            song_count: None,
            songs: Vec::new(),
        }
    }

    fn ids(songs: &[Song]) -> Vec<&str> {
        songs.iter().map(|s| s.id.as_str()).collect()
    }

    fn catalog() -> Vec<Song> {
        vec![
            song("galliyan", "Galliyan", "Ankit Tiwari"),
            song("unplugged", "Tum Hi Ho (Unplugged)", "Arijit Singh"),
            song("original", "Tum Hi Ho", "Arijit Singh"),
            song("sunn", "Sunn Raha Hai", "Ankit Tiwari"),
            song("chahun", "Chahun Main Ya Naa", "Arijit Singh, Palak Muchhal"),
        ]
    }

    #[test]
    fn dedupe_keeps_hindi_titles_differing_in_vowel_signs() {
        let songs = vec![song("1", "ही", "Arijit Singh"), song("2", "हो", "Arijit Singh")];
        assert_eq!(dedupe_songs(songs).len(), 2);
    }

    #[test]
    fn exact_title_outranks_variant_and_unrelated() {
        let ranked = rank_songs("tum hi ho", catalog());
        let order = ids(&ranked);

        assert_eq!(order[0], "original");
        assert_eq!(order[1], "unplugged");
        assert!(!order.contains(&"galliyan"), "unrelated song kept: {order:?}");
    }

    #[test]
    fn ranking_is_deterministic() {
        let first = rank_songs("arijit singh tum hi ho", catalog());
        let second = rank_songs("arijit singh tum hi ho", catalog());
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first[0].id, "original");
    }

    #[test]
    fn artist_query_ranks_by_artist_field() {
        let ranked = rank_songs("ankit tiwari", catalog());
        let order = ids(&ranked);
        assert_eq!(order, vec!["galliyan", "sunn"]);
    }

    #[test]
    fn tolerates_minor_misspellings() {
        let ranked = rank_songs("tum hi hoo arjit", catalog());
        assert_eq!(ranked[0].id, "original");
    }

    #[test]
    fn ties_keep_upstream_order() {
        let items = vec![
            song("a", "Kesariya", "Arijit Singh"),
            song("b", "Kesariya", "Arijit Singh & Amitabh Bhattacharya"),
        ];
        let ranked = rank("kesariya", items);
        assert_eq!(ids(&ranked), vec!["a", "b"]);
    }

    #[test]
    fn substring_fallback_when_fuzzy_finds_nothing() {
        let items = vec![
            song("theme", "Chottamumbai Theme", "Rahul Raj"),
            song("other", "Galliyan", "Ankit Tiwari"),
        ];
        let ranked = rank("umba", items);
        assert_eq!(ids(&ranked), vec!["theme"]);
    }

    #[test]
    fn no_match_at_all_is_empty() {
        let ranked = rank("zzzz", catalog());
        assert!(ranked.is_empty());
    }

    #[test]
    fn empty_query_returns_input() {
        let ranked = rank("  !! ", catalog());
        assert_eq!(ranked.len(), catalog().len());
        assert_eq!(ranked[0].id, "galliyan");
    }

    #[test]
    fn duplicate_songs_collapse_to_first() {
        let items = vec![
            song("first", "Tum Hi Ho", "Arijit Singh"),
            song("dupe", "Tum Hi Ho!", "ARIJIT SINGH"),
            song("cover", "Tum Hi Ho", "Neha Kakkar"),
        ];
        let ranked = rank_songs("tum hi ho", items);
        assert_eq!(ids(&ranked), vec!["first", "cover"]);
    }

    #[test]
    fn html_entities_are_decoded_before_matching() {
        let items = vec![song("q", "Dil Diyan Gallan &#039;Reprise&#039;", "Atif Aslam")];
        let ranked = rank("dil diyan gallan reprise", items);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn albums_are_not_deduplicated() {
        let albums = vec![
            album("2013", "Aashiqui 2", "Mithoon"),
            album("2013-deluxe", "Aashiqui 2", "Mithoon"),
        ];
        let ranked = rank_albums("aashiqui 2", albums);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "2013");
    }

    #[test]
    fn album_field_contributes_for_songs() {
        let mut with_album = song("a", "Milne Hai Mujhse Aayi", "Arijit Singh");
        with_album.album = Some("Aashiqui 2".to_owned());
        let without = song("b", "Bhula Dena", "Mustafa Zahid");
        let ranked = rank("aashiqui", vec![without, with_album]);
        assert_eq!(ids(&ranked), vec!["a"]);
    }

    #[test]
    fn similar_songs_boost_language_and_artist() {
        let mut english = song("en", "Perfect", "Ed Sheeran");
        english.language = Some("english".into());
        let mut hindi_other = song("hi", "Kesariya", "Arijit Singh");
        hindi_other.language = Some("hindi".into());
        let mut hindi_same = song("same", "Raataan Lambiyan", "Jubin Nautiyal");
        hindi_same.language = Some("Hindi".into());

        let ranked = rank_similar(
            vec![english, hindi_other, hindi_same],
            Some("hindi"),
            Some("Jubin Nautiyal"),
        );
        assert_eq!(ids(&ranked), vec!["same", "hi", "en"]);
    }

    #[test]
    fn similar_without_hints_is_identity() {
        let ranked = rank_similar(catalog(), None, Some("  "));
        assert_eq!(ids(&ranked), ids(&catalog()));
    }
}
