//! Pairwise conflict detection between partial answers.
//!
//! Each pair of answers is scored on two axes: word-overlap similarity and
//! the balance of conflict markers ("however", "risk", ...) against
//! agreement markers ("also", "confirms", ...). A pair is a tension when the
//! answers barely overlap and the conflict markers win.

use crate::core::text::{first_sentence, jaccard_of_sets, keyword_set, keywords, truncate_str, words};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CONFLICT_MARKERS: &[&str] = &[
    "however", "but", "risk", "risks", "disagree", "disagrees", "concern", "concerns",
    "although", "contrary", "instead", "whereas", "unlike", "conflict", "conflicts",
    "oppose", "opposes", "problem", "issue", "delay", "delayed", "blocked", "against",
];

pub const AGREEMENT_MARKERS: &[&str] = &[
    "also", "confirms", "confirmed", "aligns", "aligned", "agree", "agrees", "consistent",
    "similarly", "likewise", "same", "supports", "matches", "consensus", "echoes",
];

const EXCERPT_BYTES: usize = 200;
const THEME_WORDS: usize = 5;

/// Thresholds for [`ConflictDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConflictConfig {
    /// Pairs at or above this similarity are never flagged
    pub similarity_threshold: f64,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.3,
        }
    }
}

/// A flagged pair of disagreeing answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub first_source: String,
    pub second_source: String,
    pub similarity: f64,
    pub conflict_markers: usize,
    pub agreement_markers: usize,
    pub first_excerpt: String,
    pub second_excerpt: String,
}

/// Count how many words of `text` appear in `markers`.
pub fn count_markers(text: &str, markers: &[&str]) -> usize {
    words(text)
        .iter()
        .filter(|w| markers.contains(&w.as_str()))
        .count()
}

/// The first sentence carrying a conflict marker, or the opening sentence.
fn excerpt(text: &str) -> String {
    let sentence = text
        .split_inclusive(['.', '!', '?', '\n'])
        .map(str::trim)
        .find(|s| count_markers(s, CONFLICT_MARKERS) > 0)
        .unwrap_or_else(|| first_sentence(text));
    truncate_str(sentence, EXCERPT_BYTES).to_string()
}

#[derive(Debug, Clone, Default)]
pub struct ConflictDetector {
    config: ConflictConfig,
}

impl ConflictDetector {
    pub fn new(config: ConflictConfig) -> Self {
        Self { config }
    }

    /// Flag disagreeing pairs among `(source, text)` answers.
    pub fn detect(&self, answers: &[(String, String)]) -> Vec<Conflict> {
        let sets: Vec<_> = answers.iter().map(|(_, text)| keyword_set(text)).collect();
        let mut conflicts = Vec::new();
        for i in 0..answers.len() {
            for j in (i + 1)..answers.len() {
                let similarity = jaccard_of_sets(&sets[i], &sets[j]);
                if similarity >= self.config.similarity_threshold {
                    continue;
                }
                let (a, b) = (&answers[i], &answers[j]);
                let conflict_markers =
                    count_markers(&a.1, CONFLICT_MARKERS) + count_markers(&b.1, CONFLICT_MARKERS);
                let agreement_markers =
                    count_markers(&a.1, AGREEMENT_MARKERS) + count_markers(&b.1, AGREEMENT_MARKERS);
                if conflict_markers > agreement_markers {
                    conflicts.push(Conflict {
                        first_source: a.0.clone(),
                        second_source: b.0.clone(),
                        similarity,
                        conflict_markers,
                        agreement_markers,
                        first_excerpt: excerpt(&a.1),
                        second_excerpt: excerpt(&b.1),
                    });
                }
            }
        }
        conflicts
    }

    /// Render opposing excerpts and the most frequent theme words.
    pub fn summarize(&self, conflicts: &[Conflict], answers: &[(String, String)]) -> Option<String> {
        if conflicts.is_empty() {
            return None;
        }
        let mut summary = String::new();
        for conflict in conflicts {
            summary.push_str(&format!(
                "- {} vs {}:\n  \"{}\"\n  \"{}\"\n",
                conflict.first_source,
                conflict.second_source,
                conflict.first_excerpt,
                conflict.second_excerpt
            ));
        }
        let themes = theme_words(conflicts, answers);
        if !themes.is_empty() {
            summary.push_str(&format!("Themes in dispute: {}\n", themes.join(", ")));
        }
        Some(summary)
    }
}

/// Most frequent keywords across the answers involved in a conflict.
fn theme_words(conflicts: &[Conflict], answers: &[(String, String)]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for (source, text) in answers {
        let involved = conflicts
            .iter()
            .any(|c| &c.first_source == source || &c.second_source == source);
        if !involved {
            continue;
        }
        for word in keywords(text) {
            if !CONFLICT_MARKERS.contains(&word.as_str()) {
                *counts.entry(word).or_default() += 1;
            }
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(THEME_WORDS)
        .map(|(word, _)| word)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn test_flags_low_overlap_with_conflict_markers() {
        let a = answers(&[
            ("Budget Review", "Spending is on track. However the vendor contract is a serious risk."),
            ("Product Sync", "Engineers disagree with the launch date; hiring is delayed and blocked."),
        ]);
        let detector = ConflictDetector::default();
        let conflicts = detector.detect(&a);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].first_source, "Budget Review");
        assert!(conflicts[0].first_excerpt.starts_with("However"));

        let summary = detector.summarize(&conflicts, &a).unwrap();
        assert!(summary.contains("Budget Review vs Product Sync"));
        assert!(summary.contains("Themes in dispute"));
    }

    #[test]
    fn test_agreement_markers_outweigh() {
        let a = answers(&[
            ("A", "The plan also aligns with the roadmap and confirms the budget."),
            ("B", "Hiring is consistent; the team agrees. One risk remains."),
        ]);
        assert!(ConflictDetector::default().detect(&a).is_empty());
    }

    #[test]
    fn test_similar_answers_are_not_conflicts() {
        let a = answers(&[
            ("A", "However the launch budget is a risk"),
            ("B", "However the launch budget is a risk, but manageable"),
        ]);
        assert!(ConflictDetector::default().detect(&a).is_empty());
    }

    #[test]
    fn test_no_conflicts_no_summary() {
        assert!(ConflictDetector::default().summarize(&[], &[]).is_none());
    }
}
