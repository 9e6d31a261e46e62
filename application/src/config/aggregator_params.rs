//! Aggregator parameters: early stop, conflict detection and merge limits.

use agora_domain::{ConfigIssue, ConfigIssueCode, ConflictConfig, MergeConfig};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorParams {
    /// Pairwise similarity at or above which results count as duplicates.
    pub early_stop_similarity: f64,
    /// Fewer successful results than this skip synthesis.
    pub early_stop_min_results: usize,
    /// Pairs below this similarity may be flagged as conflicts.
    pub conflict_similarity: f64,
    /// Simple-merge collapse threshold.
    pub dedup_threshold: f64,
    /// Simple-merge output cap in bytes.
    pub max_final_length: usize,
    pub synthesis_timeout: Duration,
}

impl Default for AggregatorParams {
    fn default() -> Self {
        Self {
            early_stop_similarity: 0.85,
            early_stop_min_results: 2,
            conflict_similarity: 0.3,
            dedup_threshold: 0.8,
            max_final_length: 8000,
            synthesis_timeout: Duration::from_secs(60),
        }
    }
}

impl AggregatorParams {
    pub fn with_early_stop_similarity(mut self, threshold: f64) -> Self {
        self.early_stop_similarity = threshold;
        self
    }

    pub fn with_dedup_threshold(mut self, threshold: f64) -> Self {
        self.dedup_threshold = threshold;
        self
    }

    pub fn with_max_final_length(mut self, max: usize) -> Self {
        self.max_final_length = max;
        self
    }

    pub fn with_synthesis_timeout(mut self, timeout: Duration) -> Self {
        self.synthesis_timeout = timeout;
        self
    }

    pub fn conflict_config(&self) -> ConflictConfig {
        ConflictConfig {
            similarity_threshold: self.conflict_similarity,
        }
    }

    pub fn merge_config(&self) -> MergeConfig {
        MergeConfig {
            dedup_threshold: self.dedup_threshold,
            max_length: self.max_final_length,
        }
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        for (key, value) in [
            ("aggregator.early_stop_similarity", self.early_stop_similarity),
            ("aggregator.conflict_similarity", self.conflict_similarity),
            ("aggregator.dedup_threshold", self.dedup_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::OutOfRange,
                    key,
                    format!("{} is not within 0.0..=1.0", value),
                ));
            }
        }
        if self.max_final_length == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "aggregator.max_final_length",
                "must be >= 1",
            ));
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AggregatorParams::default().validate().is_empty());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let issues = AggregatorParams::default()
            .with_dedup_threshold(1.5)
            .validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].key, "aggregator.dedup_threshold");
    }

    #[test]
    fn test_merge_config_mirrors_params() {
        let merge = AggregatorParams::default()
            .with_max_final_length(100)
            .merge_config();
        assert_eq!(merge.max_length, 100);
        assert_eq!(merge.dedup_threshold, 0.8);
    }
}
