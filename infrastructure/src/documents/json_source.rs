//! JSON agent-record loader.
//!
//! Reads a JSON array of agent records. Each record is checked on its own:
//! a record without a usable `id`, with a duplicate `id`, or with fields of
//! the wrong type is rejected and reported with its position, while the
//! remaining records still load. Optional fields default when absent.
//!
//! ```json
//! [
//!   {"id": "m1", "displayName": "Kickoff", "date": "2026-03-02",
//!    "summary": "...", "keyPoints": ["..."], "actionItems": ["..."]}
//! ]
//! ```

use agora_domain::AgentDocument;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that prevent a document file from loading at all.
#[derive(Debug, Error)]
pub enum DocumentLoadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} must contain a JSON array of agent records")]
    NotAnArray(PathBuf),

    #[error("{count} invalid agent record(s), first: {first}")]
    InvalidRecords { count: usize, first: RejectedRecord },
}

/// A record that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Zero-based position in the array
    pub index: usize,
    pub id: Option<String>,
    pub reason: String,
}

impl fmt::Display for RejectedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "record {} ('{}'): {}", self.index, id, self.reason),
            None => write!(f, "record {}: {}", self.index, self.reason),
        }
    }
}

/// Documents that loaded plus the records that were rejected.
#[derive(Debug, Clone, Default)]
pub struct LoadedAgents {
    pub documents: Vec<AgentDocument>,
    pub rejected: Vec<RejectedRecord>,
}

impl LoadedAgents {
    /// Turn any rejection into an error.
    pub fn into_strict(self) -> Result<Vec<AgentDocument>, DocumentLoadError> {
        match self.rejected.first() {
            None => Ok(self.documents),
            Some(first) => Err(DocumentLoadError::InvalidRecords {
                count: self.rejected.len(),
                first: first.clone(),
            }),
        }
    }
}

/// Agent records stored as a JSON array in a file.
#[derive(Debug, Clone)]
pub struct JsonAgentSource {
    path: PathBuf,
}

impl JsonAgentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate every record in the file.
    pub fn load(&self) -> Result<LoadedAgents, DocumentLoadError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| DocumentLoadError::Io {
            path: self.path.clone(),
            source,
        })?;
        let loaded = self.parse(&text)?;
        debug!(
            "Loaded {} agent(s) from {} ({} rejected)",
            loaded.documents.len(),
            self.path.display(),
            loaded.rejected.len()
        );
        for rejected in &loaded.rejected {
            warn!("Skipping agent {} in {}", rejected, self.path.display());
        }
        Ok(loaded)
    }

    /// Validate records from JSON text.
    pub fn parse(&self, text: &str) -> Result<LoadedAgents, DocumentLoadError> {
        let value: Value = serde_json::from_str(text).map_err(|source| DocumentLoadError::Json {
            path: self.path.clone(),
            source,
        })?;
        let Value::Array(records) = value else {
            return Err(DocumentLoadError::NotAnArray(self.path.clone()));
        };

        let mut loaded = LoadedAgents::default();
        let mut seen = HashSet::new();
        for (index, record) in records.into_iter().enumerate() {
            match check_record(record, &mut seen) {
                Ok(doc) => loaded.documents.push(doc),
                Err((id, reason)) => loaded.rejected.push(RejectedRecord { index, id, reason }),
            }
        }
        Ok(loaded)
    }
}

fn check_record(
    record: Value,
    seen: &mut HashSet<String>,
) -> Result<AgentDocument, (Option<String>, String)> {
    let id = match record.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
        Some(Value::String(_)) => return Err((None, "id is empty".to_string())),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err((None, "id must be a string".to_string())),
        None => return Err((None, "missing required field 'id'".to_string())),
    };
    if seen.contains(&id) {
        return Err((Some(id), "duplicate id".to_string()));
    }

    let mut record = record;
    if let Value::Object(map) = &mut record {
        map.insert("id".to_string(), Value::String(id.clone()));
        map.retain(|_, v| !v.is_null());
    }
    let doc: AgentDocument =
        serde_json::from_value(record).map_err(|e| (Some(id.clone()), e.to_string()))?;
    doc.validate().map_err(|e| (Some(id.clone()), e.to_string()))?;

    seen.insert(id);
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse(text: &str) -> LoadedAgents {
        JsonAgentSource::new("agents.json").parse(text).unwrap()
    }

    #[test]
    fn test_full_record() {
        let loaded = parse(
            r#"[{
                "id": "m1",
                "displayName": "Kickoff",
                "date": "2026-03-02",
                "enabled": false,
                "summary": "Budget approved",
                "keyPoints": ["pilot in Q2"],
                "actionItems": ["Dana drafts the plan"],
                "sentiment": "positive",
                "transcript": "Dana: let's go"
            }]"#,
        );
        assert!(loaded.rejected.is_empty());
        let doc = &loaded.documents[0];
        assert_eq!(doc.label(), "Kickoff");
        assert_eq!(doc.date, NaiveDate::from_ymd_opt(2026, 3, 2));
        assert!(!doc.enabled);
        assert_eq!(doc.action_items, vec!["Dana drafts the plan"]);
        assert_eq!(doc.transcript.as_deref(), Some("Dana: let's go"));
    }

    #[test]
    fn test_optional_fields_default() {
        let loaded = parse(r#"[{"id": "m1", "summary": null}, {"id": 7}]"#);
        assert_eq!(loaded.documents.len(), 2);
        let doc = &loaded.documents[0];
        assert!(doc.enabled);
        assert_eq!(doc.summary, "");
        assert!(doc.key_points.is_empty());
        assert_eq!(doc.label(), "m1");
        assert_eq!(loaded.documents[1].id, "7");
    }

    #[test]
    fn test_invalid_records_are_reported() {
        let loaded = parse(
            r#"[
                {"id": "m1"},
                {"displayName": "No id"},
                {"id": "  "},
                {"id": "m1", "summary": "again"},
                {"id": "m2", "keyPoints": "not a list"},
                {"id": "m3"}
            ]"#,
        );
        let ids: Vec<&str> = loaded.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m3"]);

        let indexes: Vec<usize> = loaded.rejected.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![1, 2, 3, 4]);
        assert!(loaded.rejected[0].reason.contains("missing required field"));
        assert_eq!(loaded.rejected[2].reason, "duplicate id");
        assert_eq!(loaded.rejected[3].id.as_deref(), Some("m2"));
    }

    #[test]
    fn test_strict_mode_fails_on_rejection() {
        let err = parse(r#"[{"id": "m1"}, {"id": ""}]"#)
            .into_strict()
            .unwrap_err();
        match err {
            DocumentLoadError::InvalidRecords { count, first } => {
                assert_eq!(count, 1);
                assert_eq!(first.index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_top_level_must_be_array() {
        let err = JsonAgentSource::new("agents.json")
            .parse(r#"{"id": "m1"}"#)
            .unwrap_err();
        assert!(matches!(err, DocumentLoadError::NotAnArray(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agents.json");
        std::fs::write(&path, r#"[{"id": "m1", "summary": "Budget approved"}]"#).unwrap();

        let loaded = JsonAgentSource::new(&path).load().unwrap();
        assert_eq!(loaded.documents[0].summary, "Budget approved");

        let missing = JsonAgentSource::new(dir.path().join("missing.json"))
            .load()
            .unwrap_err();
        assert!(matches!(missing, DocumentLoadError::Io { .. }));
    }
}
