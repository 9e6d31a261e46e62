//! Cache key construction and query normalization.

use crate::core::text::collapse_whitespace;

/// Phrases stripped from queries before keying.
const POLITENESS: &[&str] = &[
    "please", "kindly", "can you", "could you", "would you", "thank you", "thanks",
];

/// Lower-case, collapse whitespace, drop politeness phrasing and trailing punctuation.
pub fn normalize_query(query: &str) -> String {
    let lowered = collapse_whitespace(&query.to_lowercase());
    let mut text = format!(" {} ", strip_trailing_punctuation(&lowered));
    for phrase in POLITENESS {
        let padded = format!(" {} ", phrase);
        while text.contains(&padded) {
            text = text.replace(&padded, " ");
        }
    }
    let text = collapse_whitespace(&text);
    strip_trailing_punctuation(text.trim_start_matches([',', ' '])).to_string()
}

fn strip_trailing_punctuation(text: &str) -> &str {
    text.trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
}

/// `<mode>:<sorted ids joined by comma>:<normalized query>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    context: String,
    query: String,
}

impl CacheKey {
    pub fn new(mode: &str, agent_ids: &[String], query: &str) -> Self {
        let mut ids: Vec<&str> = agent_ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids.dedup();
        Self {
            context: format!("{}:{}", mode, ids.join(",")),
            query: normalize_query(query),
        }
    }

    /// Mode and agent-id part; fuzzy lookups only compare keys sharing it.
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn normalized_query(&self) -> &str {
        &self.query
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.context, self.query)
    }
}
