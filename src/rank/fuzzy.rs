//! Token-level string similarity.

/// Largest normalized edit distance at which two tokens still count as a match.
pub(crate) const MAX_DISTANCE: f64 = 0.35;

/// Minimum similarity for a token match, the complement of [`MAX_DISTANCE`].
pub(crate) const MATCH_SIMILARITY: f64 = 1.0 - MAX_DISTANCE;

/// Base credit for a query token that is a prefix of a longer field token.
/// Scaled up towards 1.0 the more of the field token it covers.
const PREFIX_BASE: f64 = 0.7;

/// Levenshtein distance over Unicode scalar values.
pub(crate) fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Similarity in `[0, 1]` between a query token and a field token.
///
/// Edit similarity is `1 - distance / longer_len`. A query token of two or more
/// characters that prefixes the field token (a partially typed word) gets at
/// least `0.7`, rising with coverage.
pub(crate) fn token_similarity(query: &str, field: &str) -> f64 {
    if query == field {
        return 1.0;
    }

    let q_len = query.chars().count();
    let f_len = field.chars().count();
    let longest = q_len.max(f_len);
    if longest == 0 {
        return 0.0;
    }

    let edit = 1.0 - levenshtein(query, field) as f64 / longest as f64;

    let prefix = if q_len >= 2 && f_len > q_len && field.starts_with(query) {
        PREFIX_BASE + (1.0 - PREFIX_BASE) * (q_len as f64 / f_len as f64)
    } else {
        0.0
    };

    edit.max(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("arijit", "arjit"), 1);
    }

    #[test]
    fn levenshtein_counts_chars_not_bytes() {
        assert_eq!(levenshtein("beyoncé", "beyonce"), 1);
    }

    #[test]
    fn minor_misspelling_matches() {
        assert!(token_similarity("arjit", "arijit") >= MATCH_SIMILARITY);
        assert!(token_similarity("sing", "singh") >= MATCH_SIMILARITY);
    }

    #[test]
    fn unrelated_tokens_do_not_match() {
        assert!(token_similarity("hi", "ho") < MATCH_SIMILARITY);
        assert!(token_similarity("tum", "galliyan") < MATCH_SIMILARITY);
    }

    #[test]
    fn prefix_credit_scales_with_coverage() {
        let short = token_similarity("ga", "galliyan");
        let long = token_similarity("galli", "galliyan");
        assert!(short >= PREFIX_BASE);
        assert!(long > short);
        // Single characters never get prefix credit
        assert!(token_similarity("g", "galliyan") < MATCH_SIMILARITY);
    }
}
