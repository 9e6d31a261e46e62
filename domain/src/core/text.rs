//! Text helpers shared by the store, decomposer, aggregator and memory.
//!
//! Token counts here are estimates: a fixed characters-per-token ratio is used
//! everywhere, so callers must not rely on token-exact budgeting.

use std::collections::HashSet;

/// Characters per token used by [`estimate_tokens`].
pub const CHARS_PER_TOKEN: usize = 4;

/// Minimum keyword length kept by [`keywords`].
pub const MIN_KEYWORD_LEN: usize = 3;

/// Words ignored by keyword indexing and similarity measures.
pub const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "have", "him", "his", "how", "its", "may", "new", "now", "old",
    "see", "two", "who", "did", "does", "get", "got", "let", "put", "say", "she", "too", "use",
    "that", "this", "with", "from", "they", "them", "then", "than", "there", "their", "these",
    "those", "what", "when", "where", "which", "while", "will", "would", "could", "should",
    "about", "into", "over", "under", "were", "been", "being", "also", "just", "only", "some",
    "such", "very", "more", "most", "other", "each", "here", "your", "yours", "ours", "what's",
    "tell", "please", "give", "show", "between", "across", "every",
];

/// Estimate the token count of `text`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Returns `true` if `word` (already lower-cased) is a stop word.
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Lower-case alphanumeric tokens of `text`, in order, duplicates kept.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Stop-word filtered, lower-cased keywords of at least [`MIN_KEYWORD_LEN`] chars.
pub fn keywords(text: &str) -> Vec<String> {
    words(text)
        .into_iter()
        .filter(|w| w.chars().count() >= MIN_KEYWORD_LEN && !is_stop_word(w))
        .collect()
}

/// Keyword set of `text`.
pub fn keyword_set(text: &str) -> HashSet<String> {
    keywords(text).into_iter().collect()
}

/// Jaccard similarity of the keyword sets of two texts.
///
/// Two texts without any keywords are considered identical (1.0); one empty
/// side against a non-empty one scores 0.0.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a = keyword_set(a);
    let set_b = keyword_set(b);
    jaccard_of_sets(&set_a, &set_b)
}

/// Jaccard similarity of two precomputed sets.
pub fn jaccard_of_sets(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Collapse all whitespace runs into a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate a string to approximately `max_bytes` without splitting a UTF-8
/// character boundary.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Truncate to `max_bytes` and append `marker` when anything was cut.
///
/// The marker is counted against the limit, so the result never exceeds
/// `max_bytes` unless the marker alone is longer.
pub fn truncate_with_marker(s: &str, max_bytes: usize, marker: &str) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let keep = max_bytes.saturating_sub(marker.len());
    format!("{}{}", truncate_str(s, keep).trim_end(), marker)
}

/// Truncate to roughly `max_tokens` estimated tokens.
pub fn truncate_to_tokens(s: &str, max_tokens: usize) -> &str {
    truncate_str(s, max_tokens.saturating_mul(CHARS_PER_TOKEN))
}

/// First sentence of `text` (up to the first `.`, `!` or `?`), trimmed.
pub fn first_sentence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.find(['.', '!', '?']) {
        Some(idx) => &trimmed[..=idx],
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_keywords_filter_short_and_stop_words() {
        let kw = keywords("The Budget review and a Q3 plan for ACME");
        assert_eq!(kw, vec!["budget", "review", "plan", "acme"]);
    }

    #[test]
    fn test_jaccard_identical_and_disjoint() {
        assert_eq!(jaccard_similarity("budget review", "review budget"), 1.0);
        assert_eq!(jaccard_similarity("budget review", "hiring plan"), 0.0);
        assert_eq!(jaccard_similarity("", ""), 1.0);
        assert_eq!(jaccard_similarity("budget", ""), 0.0);
    }

    #[test]
    fn test_truncate_multibyte_boundary() {
        let s = "あのね";
        assert_eq!(truncate_str(s, 4), "あ");
        assert_eq!(truncate_str(s, 9), "あのね");
    }

    #[test]
    fn test_truncate_with_marker() {
        let out = truncate_with_marker("abcdefghij", 8, "..");
        assert_eq!(out, "abcdef..");
        assert_eq!(truncate_with_marker("short", 8, ".."), "short");
    }

    #[test]
    fn test_first_sentence() {
        assert_eq!(first_sentence("We agreed. Then left."), "We agreed.");
        assert_eq!(first_sentence("no punctuation"), "no punctuation");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    }
}
