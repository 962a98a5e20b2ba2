//! Text normalization shared by ranking and deduplication.
//!
//! Saavn text fields carry HTML entities (`&quot;`, `&amp;`, `&#039;`),
//! accented transliterations and decorative punctuation. Everything compared
//! by the ranker goes through [`normalize_text`] first.

use unicode_normalization::UnicodeNormalization;

/// Decode HTML entities found in upstream text fields.
///
/// Handles both named entities (`&amp;`, `&uuml;`) and numeric references
/// (`&#39;`, `&#x27;`).
pub fn decode_html_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    htmlize::unescape(s).to_string()
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether marks following `c` are folded away.
///
/// Only Latin letters lose their diacritics. In Indic scripts the combining
/// marks are vowel signs and viramas, so they stay.
fn folds_marks(c: char) -> bool {
    !c.is_alphanumeric() || c <= '\u{024F}'
}

/// Lowercase, accent-fold Latin letters, strip punctuation and collapse
/// whitespace.
///
/// Apostrophes are dropped so `"Don't"` and `"Dont"` compare equal; any other
/// punctuation becomes a word break.
///
/// # Examples
///
/// ```
/// use musicbox::rank::normalize::normalize_text;
///
/// assert_eq!(normalize_text("Tum Hi Ho (Unplugged)"), "tum hi ho unplugged");
/// assert_eq!(normalize_text("  Beyoncé &amp; Jay-Z "), "beyonce jay z");
/// assert_eq!(normalize_text("Don&#039;t Stop"), "dont stop");
/// ```
pub fn normalize_text(s: &str) -> String {
    let decoded = decode_html_entities(s);
    let mut out = String::with_capacity(decoded.len());
    let mut folding = true;

    for c in decoded.nfd() {
        if unicode_normalization::char::is_combining_mark(c) {
            if !folding {
                out.push(c);
            }
            continue;
        }
        if c == '\'' || c == '\u{2019}' {
            continue;
        }
        folding = folds_marks(c);
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else {
            out.push(' ');
        }
    }

    collapse_whitespace(&out)
}

/// Whitespace tokens of an already-normalized string.
pub(crate) fn tokens(normalized: &str) -> Vec<String> {
    normalized.split(' ').filter(|t| !t.is_empty()).map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_apostrophe_entity() {
        assert_eq!(decode_html_entities("Dil Diyan Gallan &#039;Reprise&#039;"), "Dil Diyan Gallan 'Reprise'");
    }

    #[test]
    fn decode_quote_entity() {
        assert_eq!(decode_html_entities("&quot;Tum Hi Ho&quot;"), "\"Tum Hi Ho\"");
    }

    #[test]
    fn decode_no_entities() {
        assert_eq!(decode_html_entities("Galliyan"), "Galliyan");
    }

    #[test]
    fn normalize_strips_accents() {
        assert_eq!(normalize_text("Rosalía"), "rosalia");
    }

    #[test]
    fn normalize_collapses_punctuation_runs() {
        assert_eq!(normalize_text("Tum...Hi -- Ho!!"), "tum hi ho");
    }

    #[test]
    fn normalize_keeps_non_latin_scripts() {
        assert_eq!(normalize_text("तुम ही हो"), normalize_text("तुम  ही हो"));
        assert!(!normalize_text("तुम ही हो").is_empty());
    }

    #[test]
    fn normalize_keeps_devanagari_vowel_signs() {
        assert_ne!(normalize_text("ही"), normalize_text("हो"));
        assert_ne!(normalize_text("तुम ही हो"), normalize_text("तुम हो ही"));
        assert_eq!(normalize_text("तुम ही हो"), "तुम ही हो");
        // Virama joins conjuncts and must not split the word
        assert_eq!(normalize_text("इश्क़"), "इश्क़".nfd().collect::<String>());
    }

    #[test]
    fn normalize_drops_orphan_marks() {
        assert_eq!(normalize_text("a \u{0301}b"), "a b");
    }

    #[test]
    fn normalize_empty() {
        assert_eq!(normalize_text("  ()  "), "");
    }

    #[test]
    fn tokens_split_normalized() {
        assert_eq!(tokens("tum hi ho"), vec!["tum", "hi", "ho"]);
        assert!(tokens("").is_empty());
    }
}
