//! Memory slices: structured facts extracted from past answers.

use crate::core::text::collapse_whitespace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliceType {
    Decision,
    Action,
    Risk,
    Constraint,
    Entity,
    OpenQuestion,
    Episode,
}

impl SliceType {
    pub const ALL: [SliceType; 7] = [
        SliceType::Decision,
        SliceType::Action,
        SliceType::Risk,
        SliceType::Constraint,
        SliceType::Entity,
        SliceType::OpenQuestion,
        SliceType::Episode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SliceType::Decision => "decision",
            SliceType::Action => "action",
            SliceType::Risk => "risk",
            SliceType::Constraint => "constraint",
            SliceType::Entity => "entity",
            SliceType::OpenQuestion => "open_question",
            SliceType::Episode => "episode",
        }
    }

    /// Heading used when rendering the state block.
    pub fn heading(&self) -> &'static str {
        match self {
            SliceType::Decision => "Decisions",
            SliceType::Action => "Actions",
            SliceType::Risk => "Risks",
            SliceType::Constraint => "Constraints",
            SliceType::Entity => "Entities",
            SliceType::OpenQuestion => "Open questions",
            SliceType::Episode => "Earlier answers",
        }
    }

    /// Base importance weight used for retrieval and trimming.
    pub fn importance(&self) -> f64 {
        match self {
            SliceType::Decision => 1.0,
            SliceType::Risk => 0.9,
            SliceType::Action | SliceType::Constraint => 0.8,
            SliceType::OpenQuestion => 0.7,
            SliceType::Entity => 0.5,
            SliceType::Episode => 0.3,
        }
    }
}

impl fmt::Display for SliceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// SHA-256 of the whitespace-collapsed, lower-cased text, hex encoded.
pub fn content_hash(text: &str) -> String {
    let normalized = collapse_whitespace(&text.to_lowercase());
    format!("{:x}", Sha256::digest(normalized.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySlice {
    pub id: String,
    #[serde(rename = "type")]
    pub slice_type: SliceType,
    pub text: String,
    pub tags: Vec<String>,
    pub entities: Vec<String>,
    pub source_agent_ids: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// Recency score as of the last retrieval, 1.0 when fresh
    pub recency: f64,
    pub importance: f64,
    pub confidence: f64,
    pub retrieval_count: u32,
    pub content_hash: String,
}

impl MemorySlice {
    pub fn new(
        id: impl Into<String>,
        slice_type: SliceType,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let text = text.into();
        Self {
            id: id.into(),
            slice_type,
            content_hash: content_hash(&text),
            text,
            tags: Vec::new(),
            entities: Vec::new(),
            source_agent_ids: Vec::new(),
            timestamp,
            recency: 1.0,
            importance: slice_type.importance(),
            confidence: 0.5,
            retrieval_count: 0,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_entities(mut self, entities: Vec<String>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_sources(mut self, ids: Vec<String>) -> Self {
        self.source_agent_ids = ids;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Decays from 1.0 now to 0.5 after `half_days`.
    pub fn recency_at(&self, now: DateTime<Utc>, half_days: f64) -> f64 {
        let age_days = (now - self.timestamp).num_seconds().max(0) as f64 / 86_400.0;
        1.0 / (1.0 + age_days / half_days.max(f64::EPSILON))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_hash_ignores_case_and_spacing() {
        assert_eq!(content_hash("Ship  the beta"), content_hash("ship the beta"));
        assert_ne!(content_hash("ship the beta"), content_hash("ship the GA"));
        assert_eq!(content_hash("x").len(), 64);
    }

    #[test]
    fn test_recency_decay() {
        let now = Utc::now();
        let slice = MemorySlice::new("s1", SliceType::Decision, "x", now - Duration::days(7));
        assert!((slice.recency_at(now, 7.0) - 0.5).abs() < 1e-6);
        assert!((slice.recency_at(slice.timestamp, 7.0) - 1.0).abs() < 1e-6);
    }
}
