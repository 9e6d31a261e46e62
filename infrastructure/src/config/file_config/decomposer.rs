//! Decomposer configuration from TOML (`[decomposer]` section)

use agora_domain::{ConfigIssue, DecomposerConfig};
use serde::{Deserialize, Serialize};

/// Raw decomposer configuration from TOML
///
/// # Example
///
/// ```toml
/// [decomposer]
/// max_relevant = 10
/// min_relevance = 1.0
/// max_parallel = 3
/// max_map_documents = 10
/// debate_enabled = false
/// debate_min_perspectives = 3
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDecomposerConfig {
    pub max_relevant: usize,
    pub min_relevance: f64,
    pub direct_max_documents: usize,
    pub max_parallel: usize,
    pub max_map_documents: usize,
    pub exploratory_documents: usize,
    pub followup_documents: usize,
    pub debate_enabled: bool,
    pub debate_min_perspectives: usize,
}

impl Default for FileDecomposerConfig {
    fn default() -> Self {
        let config = DecomposerConfig::default();
        Self {
            max_relevant: config.max_relevant,
            min_relevance: config.min_relevance,
            direct_max_documents: config.direct_max_documents,
            max_parallel: config.max_parallel,
            max_map_documents: config.max_map_documents,
            exploratory_documents: config.exploratory_documents,
            followup_documents: config.followup_documents,
            debate_enabled: config.debate_enabled,
            debate_min_perspectives: config.debate_min_perspectives,
        }
    }
}

impl FileDecomposerConfig {
    /// Convert to [`DecomposerConfig`], falling back to defaults on errors.
    pub fn to_config(&self) -> (DecomposerConfig, Vec<ConfigIssue>) {
        let config = DecomposerConfig {
            max_relevant: self.max_relevant,
            min_relevance: self.min_relevance,
            direct_max_documents: self.direct_max_documents,
            max_parallel: self.max_parallel,
            max_map_documents: self.max_map_documents,
            exploratory_documents: self.exploratory_documents,
            followup_documents: self.followup_documents,
            debate_enabled: self.debate_enabled,
            debate_min_perspectives: self.debate_min_perspectives,
        };
        let issues = config.validate();
        if issues.iter().any(ConfigIssue::is_error) {
            (DecomposerConfig::default(), issues)
        } else {
            (config, issues)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_domain::ConfigIssueCode;

    #[test]
    fn test_default_round_trips() {
        let (config, issues) = FileDecomposerConfig::default().to_config();
        assert!(issues.is_empty());
        assert_eq!(config, DecomposerConfig::default());
    }

    #[test]
    fn test_single_perspective_debate_is_rejected() {
        let file = FileDecomposerConfig {
            debate_enabled: true,
            debate_min_perspectives: 1,
            ..Default::default()
        };
        let (config, issues) = file.to_config();
        assert!(issues[0].is_error());
        assert!(!config.debate_enabled);
    }

    #[test]
    fn test_unreachable_debate_warns_but_keeps_values() {
        let file = FileDecomposerConfig {
            debate_enabled: true,
            max_map_documents: 2,
            debate_min_perspectives: 4,
            ..Default::default()
        };
        let (config, issues) = file.to_config();
        assert_eq!(issues[0].code, ConfigIssueCode::DebateUnreachable);
        assert!(config.debate_enabled);
        assert_eq!(config.max_map_documents, 2);
    }
}
