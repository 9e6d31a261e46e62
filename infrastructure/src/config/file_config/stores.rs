//! Cache and memory configuration from TOML (`[cache]` and `[memory]` sections)

use agora_application::{CacheParams, MemoryParams};
use agora_domain::ConfigIssue;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw query cache configuration from TOML
///
/// # Example
///
/// ```toml
/// [cache]
/// enabled = true
/// capacity = 100
/// ttl_secs = 1800
/// fuzzy_enabled = false
/// fuzzy_threshold = 0.9
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCacheConfig {
    pub enabled: bool,
    pub capacity: usize,
    pub ttl_secs: u64,
    pub fuzzy_enabled: bool,
    pub fuzzy_threshold: f64,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        let params = CacheParams::default();
        Self {
            enabled: params.enabled,
            capacity: params.capacity,
            ttl_secs: params.ttl.as_secs(),
            fuzzy_enabled: params.fuzzy_enabled,
            fuzzy_threshold: params.fuzzy_threshold,
        }
    }
}

impl FileCacheConfig {
    pub fn to_params(&self) -> (CacheParams, Vec<ConfigIssue>) {
        let params = CacheParams {
            enabled: self.enabled,
            capacity: self.capacity,
            ttl: Duration::from_secs(self.ttl_secs),
            fuzzy_enabled: self.fuzzy_enabled,
            fuzzy_threshold: self.fuzzy_threshold,
        };
        let issues = params.validate();
        if issues.iter().any(ConfigIssue::is_error) {
            (CacheParams::default(), issues)
        } else {
            (params, issues)
        }
    }
}

/// Raw memory store configuration from TOML
///
/// # Example
///
/// ```toml
/// [memory]
/// enabled = true
/// state_block_tokens = 800
/// per_type_cap = 8
/// preamble_slices = 3
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMemoryConfig {
    pub enabled: bool,
    pub state_block_tokens: usize,
    pub per_type_cap: usize,
    pub preamble_slices: usize,
}

impl Default for FileMemoryConfig {
    fn default() -> Self {
        let params = MemoryParams::default();
        Self {
            enabled: params.enabled,
            state_block_tokens: params.state_block_tokens,
            per_type_cap: params.per_type_cap,
            preamble_slices: params.preamble_slices,
        }
    }
}

impl FileMemoryConfig {
    pub fn to_params(&self) -> (MemoryParams, Vec<ConfigIssue>) {
        let params = MemoryParams {
            enabled: self.enabled,
            state_block_tokens: self.state_block_tokens,
            per_type_cap: self.per_type_cap,
            preamble_slices: self.preamble_slices,
        };
        let issues = params.validate();
        if issues.iter().any(ConfigIssue::is_error) {
            (MemoryParams::default(), issues)
        } else {
            (params, issues)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_domain::ConfigIssueCode;

    #[test]
    fn test_cache_ttl_in_seconds() {
        let config: super::super::FileConfig =
            toml::from_str("[cache]\nttl_secs = 60\nfuzzy_enabled = true\n").unwrap();
        let (params, issues) = config.cache.to_params();
        assert!(issues.is_empty());
        assert_eq!(params.ttl, Duration::from_secs(60));
        assert!(params.fuzzy_enabled);
        assert_eq!(params.capacity, 100);
    }

    #[test]
    fn test_fuzzy_on_disabled_cache_is_kept_with_warning() {
        let config = FileCacheConfig {
            enabled: false,
            fuzzy_enabled: true,
            ..Default::default()
        };
        let (params, issues) = config.to_params();
        assert!(!params.enabled);
        assert_eq!(issues[0].code, ConfigIssueCode::FuzzyWithoutCache);
    }

    #[test]
    fn test_zero_capacity_falls_back() {
        let config = FileCacheConfig {
            capacity: 0,
            ..Default::default()
        };
        let (params, issues) = config.to_params();
        assert!(issues[0].is_error());
        assert_eq!(params, CacheParams::default());
    }

    #[test]
    fn test_memory_can_be_disabled() {
        let config: super::super::FileConfig =
            toml::from_str("[memory]\nenabled = false\n").unwrap();
        let (params, issues) = config.memory.to_params();
        assert!(issues.is_empty());
        assert!(!params.enabled);
        assert_eq!(params.state_block_tokens, 800);
    }
}
