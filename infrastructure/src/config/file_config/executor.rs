//! Executor configuration from TOML (`[executor]` section)

use agora_application::ExecutorParams;
use agora_domain::{ConfigIssue, ConfigIssueCode, DebatePairing, Perspective};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw executor configuration from TOML
///
/// # Example
///
/// ```toml
/// [executor]
/// concurrency = 3
/// max_retries = 2
/// backoff_ms = 1000
/// call_timeout_secs = 30
/// reduce_timeout_secs = 60
/// max_depth = 3
/// debate_pairings = ["advocate:critic", "analyst:synthesizer", "pragmatist:critic"]
/// token_budget = 4000                      # optional
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileExecutorConfig {
    pub concurrency: usize,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub call_timeout_secs: u64,
    pub reduce_timeout_secs: u64,
    pub max_depth: usize,
    /// Pairings as `first:second` perspective names
    pub debate_pairings: Vec<String>,
    pub token_budget: Option<usize>,
}

impl Default for FileExecutorConfig {
    fn default() -> Self {
        let params = ExecutorParams::default();
        Self {
            concurrency: params.concurrency,
            max_retries: params.max_retries,
            backoff_ms: params.backoff_base.as_millis() as u64,
            call_timeout_secs: params.call_timeout.as_secs(),
            reduce_timeout_secs: params.reduce_timeout.as_secs(),
            max_depth: params.max_depth,
            debate_pairings: params
                .debate_pairings
                .iter()
                .map(|p| format!("{}:{}", p.first, p.second))
                .collect(),
            token_budget: params.token_budget,
        }
    }
}

impl FileExecutorConfig {
    /// Parse `debate_pairings`, returning an error issue for each bad entry.
    pub fn parse_pairings(&self) -> (Vec<DebatePairing>, Vec<ConfigIssue>) {
        let mut pairings = Vec::new();
        let mut issues = Vec::new();
        for entry in &self.debate_pairings {
            match parse_pairing(entry) {
                Some(pairing) => pairings.push(pairing),
                None => issues.push(ConfigIssue::error(
                    ConfigIssueCode::UnknownValue,
                    "executor.debate_pairings",
                    format!("'{}' is not a 'first:second' pair of perspectives", entry),
                )),
            }
        }
        (pairings, issues)
    }

    /// Convert to [`ExecutorParams`].
    ///
    /// `debate_min_perspectives` comes from the `[decomposer]` section. Any
    /// error-level issue makes the whole section fall back to defaults.
    pub fn to_params(&self, debate_min_perspectives: usize) -> (ExecutorParams, Vec<ConfigIssue>) {
        let (pairings, mut issues) = self.parse_pairings();
        let params = ExecutorParams::default()
            .with_concurrency(self.concurrency)
            .with_max_retries(self.max_retries)
            .with_backoff_base(Duration::from_millis(self.backoff_ms))
            .with_call_timeout(Duration::from_secs(self.call_timeout_secs))
            .with_reduce_timeout(Duration::from_secs(self.reduce_timeout_secs))
            .with_max_depth(self.max_depth)
            .with_debate_pairings(pairings)
            .with_debate_min_perspectives(debate_min_perspectives)
            .with_token_budget(self.token_budget);
        issues.extend(params.validate());

        if issues.iter().any(ConfigIssue::is_error) {
            let fallback = ExecutorParams::default()
                .with_debate_min_perspectives(debate_min_perspectives);
            (fallback, issues)
        } else {
            (params, issues)
        }
    }
}

fn parse_pairing(entry: &str) -> Option<DebatePairing> {
    let (first, second) = entry.split_once(':')?;
    let first: Perspective = first.parse().ok()?;
    let second: Perspective = second.parse().ok()?;
    (first != second).then(|| DebatePairing::new(first, second))
}
