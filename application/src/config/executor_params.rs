//! Executor parameters: worker pool, retry and depth control.
//!
//! [`ExecutorParams`] groups the static parameters that control
//! [`SubQueryExecutor`](crate::use_cases::executor::SubQueryExecutor).

use agora_domain::{ConfigIssue, ConfigIssueCode, ConflictConfig, DebatePairing};
use std::time::Duration;

/// Sub-query execution parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorParams {
    /// Workers pulling sub-queries from the shared cursor.
    pub concurrency: usize,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Backoff before retry `n` is `backoff_base * 2^n`.
    pub backoff_base: Duration,
    /// Timeout for direct, map, debate and exploratory calls.
    pub call_timeout: Duration,
    /// Timeout for reduce and follow-up calls.
    pub reduce_timeout: Duration,
    /// Recursion ceiling shared with the sandbox.
    pub max_depth: usize,
    /// Perspective pairs asked to debate.
    pub debate_pairings: Vec<DebatePairing>,
    /// Distinct perspectives among successful maps required to debate.
    pub debate_min_perspectives: usize,
    /// When set, sub-query context comes from the budgeted slice.
    pub token_budget: Option<usize>,
    /// Thresholds for flagging tensions between debating perspectives.
    pub conflict: ConflictConfig,
}

impl Default for ExecutorParams {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_retries: 2,
            backoff_base: Duration::from_secs(1),
            call_timeout: Duration::from_secs(30),
            reduce_timeout: Duration::from_secs(60),
            max_depth: 3,
            debate_pairings: DebatePairing::default_table(),
            debate_min_perspectives: 3,
            token_budget: None,
            conflict: ConflictConfig::default(),
        }
    }
}

impl ExecutorParams {
    // ==================== Builder Methods ====================

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_reduce_timeout(mut self, timeout: Duration) -> Self {
        self.reduce_timeout = timeout;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_debate_pairings(mut self, pairings: Vec<DebatePairing>) -> Self {
        self.debate_pairings = pairings;
        self
    }

    pub fn with_debate_min_perspectives(mut self, min: usize) -> Self {
        self.debate_min_perspectives = min;
        self
    }

    pub fn with_token_budget(mut self, budget: Option<usize>) -> Self {
        self.token_budget = budget;
        self
    }

    pub fn with_conflict(mut self, conflict: ConflictConfig) -> Self {
        self.conflict = conflict;
        self
    }

    /// Backoff to wait before retry number `retry` (0-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(retry))
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.concurrency == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "executor.concurrency",
                "must be >= 1",
            ));
        }
        if self.call_timeout.is_zero() || self.reduce_timeout.is_zero() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "executor.call_timeout",
                "timeouts must be positive",
            ));
        }
        if self.max_depth == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "executor.max_depth",
                "must be >= 1",
            ));
        } else if self.max_depth == 1 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::NoRecursionHeadroom,
                "executor.max_depth",
                "a depth of 1 rejects every sub_lm call",
            ));
        }
        if self.debate_pairings.is_empty() {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::DebateUnreachable,
                "executor.debate_pairings",
                "no pairings configured; the debate phase will never run",
            ));
        }
        issues
    }
}
