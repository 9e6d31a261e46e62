//! Sub-queries and their execution status.
//!
//! Status state machine:
//!
//! ```text
//! pending → executing → succeeded
//!                     → failed-retry → executing
//!                                    → failed-final (cancelled)
//!                     → failed-final
//! ```
//!
//! `succeeded` and `failed-final` are terminal.

use super::perspective::Perspective;
use crate::core::error::DomainError;
use crate::document::ContextLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of work a sub-query performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubQueryType {
    Direct,
    Map,
    Reduce,
    Debate,
    Exploratory,
    Followup,
}

impl SubQueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubQueryType::Direct => "direct",
            SubQueryType::Map => "map",
            SubQueryType::Reduce => "reduce",
            SubQueryType::Debate => "debate",
            SubQueryType::Exploratory => "exploratory",
            SubQueryType::Followup => "followup",
        }
    }
}

impl fmt::Display for SubQueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Execution status of a sub-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubQueryStatus {
    Pending,
    Executing,
    FailedRetry,
    Succeeded,
    FailedFinal,
}

impl SubQueryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubQueryStatus::Succeeded | SubQueryStatus::FailedFinal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubQueryStatus::Pending => "pending",
            SubQueryStatus::Executing => "executing",
            SubQueryStatus::FailedRetry => "failed-retry",
            SubQueryStatus::Succeeded => "succeeded",
            SubQueryStatus::FailedFinal => "failed-final",
        }
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(&self, next: SubQueryStatus) -> bool {
        use SubQueryStatus::*;
        matches!(
            (self, next),
            (Pending, Executing)
                // A sub-query whose dependencies produced nothing usable is
                // closed without ever running.
                | (Pending, FailedFinal)
                | (Executing, Succeeded)
                | (Executing, FailedRetry)
                | (Executing, FailedFinal)
                | (FailedRetry, Executing)
                // Cancelled while waiting out a retry backoff.
                | (FailedRetry, FailedFinal)
        )
    }
}

impl fmt::Display for SubQueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of decomposed work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuery {
    pub id: String,
    #[serde(rename = "type")]
    pub query_type: SubQueryType,
    /// Prompt text; `None` until generated at run time (follow-ups)
    pub query: Option<String>,
    /// Documents this sub-query reads, in priority order
    pub target_agent_ids: Vec<String>,
    pub context_level: ContextLevel,
    /// Lower runs first
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perspective: Option<Perspective>,
    #[serde(default = "default_status")]
    pub status: SubQueryStatus,
}

fn default_status() -> SubQueryStatus {
    SubQueryStatus::Pending
}

impl SubQuery {
    pub fn new(
        id: impl Into<String>,
        query_type: SubQueryType,
        query: Option<String>,
        target_agent_ids: Vec<String>,
        context_level: ContextLevel,
    ) -> Self {
        Self {
            id: id.into(),
            query_type,
            query,
            target_agent_ids,
            context_level,
            priority: 0,
            depends_on: Vec::new(),
            perspective: None,
            status: SubQueryStatus::Pending,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_depends_on(mut self, ids: Vec<String>) -> Self {
        self.depends_on = ids;
        self
    }

    pub fn with_perspective(mut self, perspective: Perspective) -> Self {
        self.perspective = Some(perspective);
        self
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: SubQueryStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Whether this sub-query must wait for others.
    pub fn has_dependencies(&self) -> bool {
        !self.depends_on.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq() -> SubQuery {
        SubQuery::new(
            "map-1",
            SubQueryType::Map,
            Some("q".to_string()),
            vec!["a".to_string()],
            ContextLevel::Summary,
        )
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut q = sq();
        q.transition(SubQueryStatus::Executing).unwrap();
        q.transition(SubQueryStatus::FailedRetry).unwrap();
        q.transition(SubQueryStatus::Executing).unwrap();
        q.transition(SubQueryStatus::Succeeded).unwrap();
        assert!(q.status.is_terminal());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut q = sq();
        q.transition(SubQueryStatus::Executing).unwrap();
        q.transition(SubQueryStatus::FailedFinal).unwrap();
        let err = q.transition(SubQueryStatus::Executing).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn test_pending_cannot_succeed_directly() {
        let mut q = sq();
        assert!(q.transition(SubQueryStatus::Succeeded).is_err());
        assert_eq!(q.status, SubQueryStatus::Pending);
    }

    #[test]
    fn test_serialized_type_field() {
        let json = serde_json::to_value(sq()).unwrap();
        assert_eq!(json["type"], "map");
        assert_eq!(json["status"], "pending");
        assert!(json.get("depends_on").is_none());
    }
}
