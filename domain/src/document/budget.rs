//! Token-budgeted context assembly results.
//!
//! [`BudgetedContext`] records which detail level each document received
//! when the store packed documents into a fixed token budget, so callers can
//! log the decisions instead of silently losing context.

use super::entities::ContextLevel;
use serde::{Deserialize, Serialize};

/// Input for [`DocumentStore::get_context_with_budget`](super::DocumentStore::get_context_with_budget).
#[derive(Debug, Clone, Default)]
pub struct BudgetRequest {
    /// Restrict assembly to these ids (in any order). `None` means all enabled documents.
    pub candidates: Option<Vec<String>>,
    /// When set, candidates are ordered by relevance to this text instead of recency.
    pub query: Option<String>,
}

impl BudgetRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidates(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.candidates = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

/// One document placed into the budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetEntry {
    pub agent_id: String,
    pub level: ContextLevel,
    pub tokens: usize,
}

/// Result of budgeted context assembly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetedContext {
    /// Placed documents, in placement order
    pub entries: Vec<BudgetEntry>,
    /// Candidates that did not fit at any level or came after the floor was hit
    pub skipped: Vec<String>,
    /// Estimated tokens used
    pub used_tokens: usize,
    /// The budget that was applied
    pub budget: usize,
    /// Rendered context text
    pub text: String,
}

impl BudgetedContext {
    pub fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.used_tokens)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Level assigned to `agent_id`, if it was placed.
    pub fn level_of(&self, agent_id: &str) -> Option<ContextLevel> {
        self.entries
            .iter()
            .find(|e| e.agent_id == agent_id)
            .map(|e| e.level)
    }

    /// Short human-readable description of the placement decisions.
    pub fn describe(&self) -> String {
        let placed = self
            .entries
            .iter()
            .map(|e| format!("{}={}", e.agent_id, e.level))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{}/{} tokens; placed [{}]; skipped {}",
            self.used_tokens,
            self.budget,
            placed,
            self.skipped.len()
        )
    }
}
