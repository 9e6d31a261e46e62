//! Types for the sub-query executor.

use crate::ports::progress::{NoProgress, PipelineProgress};
use agora_domain::{Conflict, DocumentStore, ExecutionResult, SubQuery, SubQueryStatus};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Errors that end an execution before any sub-query runs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Recursion depth {depth} reached the ceiling of {max}")]
    DepthExceeded { depth: usize, max: usize },

    #[error("Execution was cancelled")]
    Cancelled,

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
}

/// Read-only inputs shared by every sub-query of one execution.
pub struct ExecutionContext<'a> {
    pub store: &'a DocumentStore,
    /// Memory preamble appended to system prompts
    pub memory: Option<&'a str>,
    /// Recursion depth of the caller (0 for a top-level query)
    pub depth: usize,
    pub progress: &'a dyn PipelineProgress,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self {
            store,
            memory: None,
            depth: 0,
            progress: &NoProgress,
        }
    }

    pub fn with_memory(mut self, memory: Option<&'a str>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn PipelineProgress) -> Self {
        self.progress = progress;
        self
    }
}

/// Output of the debate phase.
#[derive(Debug, Clone, Default)]
pub struct DebateOutcome {
    /// One result per debated pairing
    pub exchanges: Vec<ExecutionResult>,
    /// Map answer pairs flagged as disagreeing
    pub tensions: Vec<Conflict>,
    pub tension_summary: Option<String>,
}

impl DebateOutcome {
    /// Section appended to the reduce-phase context.
    pub fn render(&self) -> Option<String> {
        let mut sections = Vec::new();
        for exchange in &self.exchanges {
            if let Some(text) = exchange.text() {
                sections.push(format!("--- {} ---\n{}", exchange.source, text));
            }
        }
        if let Some(summary) = &self.tension_summary {
            sections.push(format!("Detected tensions:\n{}", summary));
        }
        if sections.is_empty() {
            None
        } else {
            Some(format!(
                "Debate between perspectives:\n\n{}",
                sections.join("\n\n")
            ))
        }
    }
}

/// One recorded status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub query_id: String,
    pub from: SubQueryStatus,
    pub to: SubQueryStatus,
}

/// Everything an execution produced.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    /// Results in plan order (debate exchanges excluded)
    pub results: Vec<ExecutionResult>,
    pub debate: Option<DebateOutcome>,
    pub followup_ran: bool,
    /// Status transitions in the order they happened
    pub trace: Vec<StatusChange>,
}

impl ExecutionOutcome {
    pub fn from_results(results: Vec<ExecutionResult>) -> Self {
        Self {
            results,
            ..Default::default()
        }
    }

    pub fn successful(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| r.text().is_some())
    }

    /// Trace entries for one sub-query.
    pub fn history_of(&self, query_id: &str) -> Vec<SubQueryStatus> {
        self.trace
            .iter()
            .filter(|c| c.query_id == query_id)
            .map(|c| c.to)
            .collect()
    }
}

#[derive(Default)]
struct BoardState {
    statuses: HashMap<String, SubQueryStatus>,
    trace: Vec<StatusChange>,
}

/// Current status of every sub-query in an execution.
///
/// Workers update it concurrently; illegal transitions are refused.
#[derive(Default)]
pub(crate) struct StatusBoard {
    state: Mutex<BoardState>,
}

impl StatusBoard {
    pub(crate) fn new<'q>(sub_queries: impl IntoIterator<Item = &'q SubQuery>) -> Self {
        let board = Self::default();
        for sub_query in sub_queries {
            board.register(sub_query);
        }
        board
    }

    pub(crate) fn register(&self, sub_query: &SubQuery) {
        self.lock()
            .statuses
            .insert(sub_query.id.clone(), SubQueryStatus::Pending);
    }

    pub(crate) fn set(&self, query_id: &str, next: SubQueryStatus) -> bool {
        let mut state = self.lock();
        let current = state
            .statuses
            .get(query_id)
            .copied()
            .unwrap_or(SubQueryStatus::Pending);
        if !current.can_transition_to(next) {
            warn!(
                "Refused status change for {}: {} -> {}",
                query_id, current, next
            );
            return false;
        }
        state.statuses.insert(query_id.to_string(), next);
        state.trace.push(StatusChange {
            query_id: query_id.to_string(),
            from: current,
            to: next,
        });
        true
    }

    pub(crate) fn status(&self, query_id: &str) -> Option<SubQueryStatus> {
        self.lock().statuses.get(query_id).copied()
    }

    /// Whether every id in `ids` has reached a terminal status.
    pub(crate) fn all_terminal(&self, ids: &[String]) -> bool {
        let state = self.lock();
        ids.iter().all(|id| {
            state
                .statuses
                .get(id)
                .is_some_and(|status| status.is_terminal())
        })
    }

    pub(crate) fn take_trace(&self) -> Vec<StatusChange> {
        std::mem::take(&mut self.lock().trace)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Single completion call prepared for the worker pool.
#[derive(Debug, Clone)]
pub(crate) struct CallJob {
    pub sub_query: SubQuery,
    pub system: String,
    pub user: String,
    pub context: String,
    pub source: String,
    pub timeout: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_domain::{ContextLevel, SubQueryType};

    fn sq(id: &str) -> SubQuery {
        SubQuery::new(id, SubQueryType::Map, None, vec![], ContextLevel::Summary)
    }

    #[test]
    fn test_board_refuses_illegal_transition() {
        let board = StatusBoard::new([&sq("map-1")]);
        assert!(!board.set("map-1", SubQueryStatus::Succeeded));
        assert!(board.set("map-1", SubQueryStatus::Executing));
        assert!(board.set("map-1", SubQueryStatus::Succeeded));
        assert_eq!(board.status("map-1"), Some(SubQueryStatus::Succeeded));
        assert_eq!(board.take_trace().len(), 2);
    }

    #[test]
    fn test_all_terminal() {
        let board = StatusBoard::new([&sq("a"), &sq("b")]);
        let ids = vec!["a".to_string(), "b".to_string()];
        board.set("a", SubQueryStatus::Executing);
        board.set("a", SubQueryStatus::Succeeded);
        assert!(!board.all_terminal(&ids));
        board.set("b", SubQueryStatus::FailedFinal);
        assert!(board.all_terminal(&ids));
    }
}
