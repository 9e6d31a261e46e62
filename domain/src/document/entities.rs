//! Agent document entity and context detail levels.

use crate::core::error::DomainError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One ingested text source ("agent") with its derived fields.
///
/// Documents are immutable once loaded; a re-sync replaces the whole set.
/// Optional fields default when absent so ingestion can stay lenient while
/// [`validate`](Self::validate) enforces the required ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDocument {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl AgentDocument {
    /// Create an enabled document with only id and display name set.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            date: None,
            enabled: true,
            summary: String::new(),
            key_points: Vec::new(),
            action_items: Vec::new(),
            sentiment: None,
            transcript: None,
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_key_points<I, S>(mut self, points: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_points = points.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_action_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.action_items = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sentiment(mut self, sentiment: impl Into<String>) -> Self {
        self.sentiment = Some(sentiment.into());
        self
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Name used in prompts and attributions; falls back to the id.
    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.id
        } else {
            &self.display_name
        }
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.trim().is_empty() {
            return Err(DomainError::InvalidDocument(
                "document id cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// How much of a document is rendered into a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextLevel {
    /// Summary only
    Summary,
    /// Summary, key points, action items and sentiment
    Standard,
    /// Everything including the transcript
    Full,
}

impl ContextLevel {
    /// Levels from richest to leanest, the order budgeted assembly tries them in.
    pub fn richest_first() -> [ContextLevel; 3] {
        [ContextLevel::Full, ContextLevel::Standard, ContextLevel::Summary]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextLevel::Summary => "summary",
            ContextLevel::Standard => "standard",
            ContextLevel::Full => "full",
        }
    }
}

impl Default for ContextLevel {
    fn default() -> Self {
        ContextLevel::Standard
    }
}

impl fmt::Display for ContextLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_defaults_optional_fields() {
        let doc: AgentDocument =
            serde_json::from_str(r#"{"id": "m1", "displayName": "Kickoff"}"#).unwrap();
        assert!(doc.enabled);
        assert!(doc.key_points.is_empty());
        assert!(doc.transcript.is_none());
        assert_eq!(doc.label(), "Kickoff");
    }

    #[test]
    fn test_deserialize_full_record() {
        let json = r#"{
            "id": "m2",
            "displayName": "Budget Review",
            "date": "2024-05-01",
            "enabled": false,
            "summary": "Reviewed Q3 budget",
            "keyPoints": ["Costs up"],
            "actionItems": ["Alice to revise forecast"],
            "sentiment": "tense",
            "transcript": "..."
        }"#;
        let doc: AgentDocument = serde_json::from_str(json).unwrap();
        assert!(!doc.enabled);
        assert_eq!(doc.date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(doc.action_items.len(), 1);
    }

    #[test]
    fn test_validate_rejects_empty_id() {
        assert!(AgentDocument::new(" ", "x").validate().is_err());
        assert!(AgentDocument::new("a", "x").validate().is_ok());
    }

    #[test]
    fn test_label_falls_back_to_id() {
        assert_eq!(AgentDocument::new("m9", "").label(), "m9");
    }

    #[test]
    fn test_context_level_order() {
        assert!(ContextLevel::Full > ContextLevel::Standard);
        assert!(ContextLevel::Standard > ContextLevel::Summary);
        assert_eq!(ContextLevel::richest_first()[0], ContextLevel::Full);
    }
}
