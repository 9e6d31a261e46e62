//! Simple merge: the synthesis fallback that needs no completion call.

use crate::core::text::{jaccard_of_sets, keyword_set, truncate_with_marker};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const TRUNCATION_MARKER: &str = "\n\n[... answer truncated ...]";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeConfig {
    /// Answers at or above this Jaccard similarity collapse into one
    pub dedup_threshold: f64,
    /// Maximum length of the merged answer, in bytes
    pub max_length: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: 0.8,
            max_length: 8000,
        }
    }
}

/// Result of a simple merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedAnswer {
    pub text: String,
    /// Distinct entries kept, each with every source that contributed to it
    pub entries: Vec<(Vec<String>, String)>,
    /// How many answers were dropped as near-duplicates
    pub collapsed: usize,
    pub truncated: bool,
}

struct Kept<'a> {
    sources: Vec<String>,
    text: &'a str,
    keywords: HashSet<String>,
}

/// Collapse near-duplicate answers and concatenate the rest with attribution.
pub fn simple_merge(answers: &[(String, String)], config: &MergeConfig) -> MergedAnswer {
    let mut kept: Vec<Kept<'_>> = Vec::new();
    let mut collapsed = 0;
    for (source, text) in answers {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let keywords = keyword_set(text);
        match kept
            .iter()
            .position(|k| jaccard_of_sets(&k.keywords, &keywords) >= config.dedup_threshold)
        {
            Some(idx) => {
                kept[idx].sources.push(source.clone());
                collapsed += 1;
            }
            None => kept.push(Kept {
                sources: vec![source.clone()],
                text,
                keywords,
            }),
        }
    }

    let full = kept
        .iter()
        .map(|k| format!("**{}**\n{}", k.sources.join(", "), k.text))
        .collect::<Vec<_>>()
        .join("\n\n");
    let text = truncate_with_marker(&full, config.max_length, TRUNCATION_MARKER);
    let truncated = text != full;
    MergedAnswer {
        text,
        truncated,
        entries: kept
            .into_iter()
            .map(|k| (k.sources, k.text.to_string()))
            .collect(),
        collapsed,
    }
}

/// Whether synthesis can be skipped because the answers already agree.
///
/// True when there are fewer than `min_results` answers, or when every pair
/// is at least `threshold` similar.
pub fn is_near_duplicate_set(texts: &[&str], threshold: f64, min_results: usize) -> bool {
    if texts.len() < min_results {
        return true;
    }
    let sets: Vec<_> = texts.iter().map(|t| keyword_set(t)).collect();
    sets.iter().enumerate().all(|(i, a)| {
        sets[i + 1..]
            .iter()
            .all(|b| jaccard_of_sets(a, b) >= threshold)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn test_near_duplicates_collapse() {
        let answers = pairs(&[
            ("Kickoff", "Decision: ship the beta in March with the new pricing"),
            ("Retro", "Decision: ship the beta in March with new pricing"),
            ("Budget", "Marketing spend capped at forty thousand"),
        ]);
        let merged = simple_merge(&answers, &MergeConfig::default());
        assert_eq!(merged.collapsed, 1);
        assert_eq!(merged.entries.len(), 2);
        assert!(merged.text.starts_with("**Kickoff, Retro**"));
        assert!(merged.text.contains("**Budget**"));
        assert!(!merged.truncated);
    }

    #[test]
    fn test_truncates_with_marker() {
        let answers = pairs(&[("A", &"word ".repeat(400))]);
        let config = MergeConfig {
            max_length: 120,
            ..Default::default()
        };
        let merged = simple_merge(&answers, &config);
        assert!(merged.truncated);
        assert!(merged.text.ends_with(TRUNCATION_MARKER));
        assert!(merged.text.len() <= 120);
    }

    #[test]
    fn test_blank_answers_skipped() {
        let merged = simple_merge(&pairs(&[("A", "  "), ("B", "real")]), &MergeConfig::default());
        assert_eq!(merged.entries.len(), 1);
    }

    #[test]
    fn test_near_duplicate_set() {
        assert!(is_near_duplicate_set(&["only one"], 0.85, 2));
        assert!(is_near_duplicate_set(
            &["budget approved march", "budget approved march"],
            0.85,
            2
        ));
        assert!(!is_near_duplicate_set(
            &["budget approved march", "hiring frozen until june"],
            0.85,
            2
        ));
    }
}
