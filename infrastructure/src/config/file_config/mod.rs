//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! Durations are written as whole seconds or milliseconds and enumerated
//! values as strings, then converted to the application parameter types.

mod aggregator;
mod decomposer;
mod executor;
mod sandbox;
mod stores;

pub use aggregator::FileAggregatorConfig;
pub use decomposer::FileDecomposerConfig;
pub use executor::FileExecutorConfig;
pub use sandbox::FileSandboxConfig;
pub use stores::{FileCacheConfig, FileMemoryConfig};

use agora_application::PipelineConfig;
use agora_domain::ConfigIssue;
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub decomposer: FileDecomposerConfig,
    pub executor: FileExecutorConfig,
    pub aggregator: FileAggregatorConfig,
    pub cache: FileCacheConfig,
    pub memory: FileMemoryConfig,
    pub sandbox: FileSandboxConfig,
}

impl FileConfig {
    /// Convert every section, returning all detected issues.
    ///
    /// A section with an error-level issue is replaced by its defaults; the
    /// other sections keep their configured values.
    pub fn to_pipeline_config(&self) -> (PipelineConfig, Vec<ConfigIssue>) {
        let mut issues = Vec::new();

        let (decomposer, found) = self.decomposer.to_config();
        issues.extend(found);
        let (executor, found) = self
            .executor
            .to_params(decomposer.debate_min_perspectives);
        issues.extend(found);
        let (aggregator, found) = self.aggregator.to_params();
        issues.extend(found);
        let (cache, found) = self.cache.to_params();
        issues.extend(found);
        let (memory, found) = self.memory.to_params();
        issues.extend(found);
        let (sandbox, found) = self.sandbox.to_params();
        issues.extend(found);

        let config = PipelineConfig {
            decomposer,
            executor,
            aggregator,
            cache,
            memory,
            sandbox,
        };
        (config, issues)
    }

    /// Validate the entire configuration without converting it.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        self.to_pipeline_config().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_file_is_default() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config, FileConfig::default());
        let (pipeline, issues) = config.to_pipeline_config();
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
        assert_eq!(pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[decomposer]
debate_enabled = true
debate_min_perspectives = 2

[executor]
concurrency = 4
max_depth = 2

[aggregator]
max_final_length = 4000

[cache]
ttl_secs = 120

[memory]
enabled = false

[sandbox]
max_attempts = 5
sub_lm_mode = "deferred"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let (pipeline, issues) = config.to_pipeline_config();
        assert!(issues.is_empty(), "unexpected issues: {:?}", issues);
        assert!(pipeline.decomposer.debate_enabled);
        assert_eq!(pipeline.executor.debate_min_perspectives, 2);
        assert_eq!(pipeline.executor.concurrency, 4);
        assert_eq!(pipeline.executor.max_depth, 2);
        assert_eq!(pipeline.aggregator.max_final_length, 4000);
        assert_eq!(pipeline.cache.ttl, Duration::from_secs(120));
        assert!(!pipeline.memory.enabled);
        assert_eq!(pipeline.sandbox.max_attempts, 5);
    }

    #[test]
    fn test_bad_section_does_not_reset_others() {
        let toml_str = r#"
[executor]
concurrency = 0

[cache]
capacity = 7
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let (pipeline, issues) = config.to_pipeline_config();
        assert!(PipelineConfig::has_errors(&issues));
        assert_eq!(pipeline.executor.concurrency, 3);
        assert_eq!(pipeline.cache.capacity, 7);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config: FileConfig = toml::from_str("[future]\nflag = true\n").unwrap();
        assert_eq!(config, FileConfig::default());
    }
}
