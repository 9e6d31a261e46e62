//! Aggregator configuration from TOML (`[aggregator]` section)

use agora_application::AggregatorParams;
use agora_domain::ConfigIssue;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw aggregator configuration from TOML
///
/// # Example
///
/// ```toml
/// [aggregator]
/// early_stop_similarity = 0.85
/// dedup_threshold = 0.8
/// max_final_length = 8000
/// synthesis_timeout_secs = 60
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAggregatorConfig {
    pub early_stop_similarity: f64,
    pub early_stop_min_results: usize,
    pub conflict_similarity: f64,
    pub dedup_threshold: f64,
    pub max_final_length: usize,
    pub synthesis_timeout_secs: u64,
}

impl Default for FileAggregatorConfig {
    fn default() -> Self {
        let params = AggregatorParams::default();
        Self {
            early_stop_similarity: params.early_stop_similarity,
            early_stop_min_results: params.early_stop_min_results,
            conflict_similarity: params.conflict_similarity,
            dedup_threshold: params.dedup_threshold,
            max_final_length: params.max_final_length,
            synthesis_timeout_secs: params.synthesis_timeout.as_secs(),
        }
    }
}

impl FileAggregatorConfig {
    /// Convert to [`AggregatorParams`], falling back to defaults on errors.
    pub fn to_params(&self) -> (AggregatorParams, Vec<ConfigIssue>) {
        let params = AggregatorParams {
            early_stop_similarity: self.early_stop_similarity,
            early_stop_min_results: self.early_stop_min_results,
            conflict_similarity: self.conflict_similarity,
            dedup_threshold: self.dedup_threshold,
            max_final_length: self.max_final_length,
            synthesis_timeout: Duration::from_secs(self.synthesis_timeout_secs),
        };
        let issues = params.validate();
        if issues.iter().any(ConfigIssue::is_error) {
            (AggregatorParams::default(), issues)
        } else {
            (params, issues)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips() {
        let (params, issues) = FileAggregatorConfig::default().to_params();
        assert!(issues.is_empty());
        assert_eq!(params, AggregatorParams::default());
    }

    #[test]
    fn test_threshold_above_one_falls_back() {
        let config = FileAggregatorConfig {
            dedup_threshold: 1.2,
            max_final_length: 500,
            ..Default::default()
        };
        let (params, issues) = config.to_params();
        assert_eq!(issues.len(), 1);
        assert_eq!(params.max_final_length, 8000);
    }
}
