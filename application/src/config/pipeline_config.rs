//! Pipeline configuration container.
//!
//! [`PipelineConfig`] groups the per-component parameter types. Use cases
//! receive only the slice they need; the pipeline holds the whole container.

use super::{AggregatorParams, CacheParams, ExecutorParams, MemoryParams, SandboxParams};
use agora_domain::{ConfigIssue, DecomposerConfig, Severity};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub decomposer: DecomposerConfig,
    pub executor: ExecutorParams,
    pub aggregator: AggregatorParams,
    pub cache: CacheParams,
    pub memory: MemoryParams,
    pub sandbox: SandboxParams,
}

impl PipelineConfig {
    // ==================== Builder Methods ====================

    pub fn with_decomposer(mut self, decomposer: DecomposerConfig) -> Self {
        self.decomposer = decomposer;
        self
    }

    pub fn with_executor(mut self, executor: ExecutorParams) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_aggregator(mut self, aggregator: AggregatorParams) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_cache(mut self, cache: CacheParams) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_memory(mut self, memory: MemoryParams) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_sandbox(mut self, sandbox: SandboxParams) -> Self {
        self.sandbox = sandbox;
        self
    }

    // ==================== Validation ====================

    /// Validate every section.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.decomposer.validate();
        issues.extend(self.executor.validate());
        issues.extend(self.aggregator.validate());
        issues.extend(self.cache.validate());
        issues.extend(self.memory.validate());
        issues.extend(self.sandbox.validate());
        issues
    }

    /// Check whether any issues are errors (i.e. fatal).
    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(|i| i.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let issues = PipelineConfig::default().validate();
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
    }

    #[test]
    fn test_collects_issues_from_all_sections() {
        let config = PipelineConfig::default()
            .with_executor(ExecutorParams::default().with_concurrency(0))
            .with_sandbox(SandboxParams::default().with_max_attempts(0));
        let issues = config.validate();
        assert_eq!(issues.len(), 2);
        assert!(PipelineConfig::has_errors(&issues));
    }
}
