//! Heading/bullet heuristics that turn an answer into memory slices.

use super::slice::{MemorySlice, SliceType};
use crate::core::text::{first_sentence, keywords, truncate_str};
use chrono::{DateTime, Utc};

const MAX_TAGS: usize = 5;
const EPISODE_BYTES: usize = 240;
const MIN_FACT_LEN: usize = 8;

/// Confidence by how the type was determined.
const HEADING_CONFIDENCE: f64 = 0.9;
const PREFIX_CONFIDENCE: f64 = 0.8;
const CUE_CONFIDENCE: f64 = 0.6;
const EPISODE_CONFIDENCE: f64 = 0.3;

/// A fact pulled from the answer before ids and timestamps are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFact {
    pub slice_type: SliceType,
    pub text: String,
    pub confidence: f64,
}

fn type_from_label(label: &str) -> Option<SliceType> {
    let label = label.to_lowercase();
    let table: [(&[&str], SliceType); 6] = [
        (&["open question", "unresolved", "question"], SliceType::OpenQuestion),
        (&["decision", "decided", "agreed"], SliceType::Decision),
        (&["action", "next step", "todo", "to-do", "follow-up", "follow up"], SliceType::Action),
        (&["risk", "concern", "blocker", "issue"], SliceType::Risk),
        (&["constraint", "requirement", "limit", "deadline"], SliceType::Constraint),
        (&["people", "participant", "owner", "stakeholder", "entit"], SliceType::Entity),
    ];
    table
        .iter()
        .find(|(cues, _)| cues.iter().any(|cue| label.contains(cue)))
        .map(|(_, slice_type)| *slice_type)
}

/// Heading text if `line` is a heading (`# x`, `**x**`, or `x:` on its own).
fn heading_of(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix('#') {
        return Some(rest.trim_start_matches('#').trim());
    }
    if line.starts_with("**") && line.ends_with("**") && line.len() > 4 {
        return Some(line.trim_matches('*').trim_end_matches(':').trim());
    }
    if let Some(label) = line.strip_suffix(':')
        && label.split_whitespace().count() <= 4
    {
        return Some(label.trim_matches('*').trim());
    }
    None
}

fn bullet_of(line: &str) -> Option<&str> {
    for marker in ["- ", "* ", "• ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest.trim());
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(rest.trim());
        }
    }
    None
}

/// `Decision: ship it` style inline prefix.
fn inline_prefix(text: &str) -> Option<(SliceType, &str)> {
    let (label, rest) = text.split_once(':')?;
    let label = label.trim_matches('*').trim();
    if label.split_whitespace().count() > 3 {
        return None;
    }
    type_from_label(label).map(|t| (t, rest.trim()))
}

fn type_from_cues(text: &str) -> Option<SliceType> {
    let lower = text.to_lowercase();
    if lower.ends_with('?') {
        return Some(SliceType::OpenQuestion);
    }
    let cues: [(&[&str], SliceType); 4] = [
        (&["decided", "agreed to", "approved", "chose "], SliceType::Decision),
        (&[" will ", "assigned", "owns ", "is responsible"], SliceType::Action),
        (&["risk", "blocker", "concern", "might slip", "at risk"], SliceType::Risk),
        (&["must ", "cannot ", "can't ", "no more than", "at most", "deadline"], SliceType::Constraint),
    ];
    cues.iter()
        .find(|(words, _)| words.iter().any(|w| lower.contains(w)))
        .map(|(_, t)| *t)
}

/// Classify the bullets of `answer`.
///
/// Unclassified bullets are dropped; when nothing at all is classified the
/// caller stores an episode instead.
pub fn extract_facts(answer: &str) -> Vec<ExtractedFact> {
    let mut facts = Vec::new();
    let mut section: Option<SliceType> = None;

    for raw in answer.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(text) = bullet_of(line) {
            let (slice_type, text, confidence) = match (section, inline_prefix(text)) {
                (_, Some((t, rest))) => (Some(t), rest, PREFIX_CONFIDENCE),
                (Some(t), None) => (Some(t), text, HEADING_CONFIDENCE),
                (None, None) => (type_from_cues(text), text, CUE_CONFIDENCE),
            };
            let text = text.trim_matches('*').trim();
            if let Some(slice_type) = slice_type
                && text.len() >= MIN_FACT_LEN
            {
                facts.push(ExtractedFact {
                    slice_type,
                    text: text.to_string(),
                    confidence,
                });
            }
            continue;
        }
        if let Some(heading) = heading_of(line) {
            section = type_from_label(heading);
            continue;
        }
        if let Some((slice_type, rest)) = inline_prefix(line)
            && rest.len() >= MIN_FACT_LEN
        {
            facts.push(ExtractedFact {
                slice_type,
                text: rest.to_string(),
                confidence: PREFIX_CONFIDENCE,
            });
        }
    }
    facts
}

/// Capitalized words that are not sentence-initial, deduplicated.
pub fn extract_entities(text: &str) -> Vec<String> {
    let mut entities: Vec<String> = Vec::new();
    let mut sentence_start = true;
    for token in text.split_whitespace() {
        let word = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '@');
        let is_name = word.starts_with('@')
            || (!sentence_start
                && word.chars().count() >= 3
                && word.chars().next().is_some_and(char::is_uppercase));
        if is_name {
            let name = word.trim_start_matches('@').to_string();
            if !entities.contains(&name) {
                entities.push(name);
            }
        }
        sentence_start = token.ends_with(['.', '!', '?', ':']);
    }
    entities
}

fn tags_of(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for kw in keywords(text) {
        if !tags.contains(&kw) {
            tags.push(kw);
        }
        if tags.len() == MAX_TAGS {
            break;
        }
    }
    tags
}

/// Turn an answer into slices; ids are `"{prefix}-{n}"` starting at `first_id`.
pub fn extract_slices(
    answer: &str,
    source_agent_ids: &[String],
    now: DateTime<Utc>,
    id_prefix: &str,
    first_id: u64,
) -> Vec<MemorySlice> {
    let mut facts = extract_facts(answer);
    if facts.is_empty() {
        let summary = truncate_str(first_sentence(answer), EPISODE_BYTES).trim();
        if summary.is_empty() {
            return Vec::new();
        }
        facts.push(ExtractedFact {
            slice_type: SliceType::Episode,
            text: summary.to_string(),
            confidence: EPISODE_CONFIDENCE,
        });
    }
    facts
        .into_iter()
        .zip(first_id..)
        .map(|(fact, n)| {
            MemorySlice::new(format!("{}-{}", id_prefix, n), fact.slice_type, &fact.text, now)
                .with_tags(tags_of(&fact.text))
                .with_entities(extract_entities(&fact.text))
                .with_sources(source_agent_ids.to_vec())
                .with_confidence(fact.confidence)
        })
        .collect()
}
