//! Cache and memory parameters.

use agora_domain::{ConfigIssue, ConfigIssueCode, MemoryConfig};
use std::time::Duration;

/// Query cache parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheParams {
    pub enabled: bool,
    pub capacity: usize,
    pub ttl: Duration,
    pub fuzzy_enabled: bool,
    /// Minimum normalized edit similarity for a fuzzy hit.
    pub fuzzy_threshold: f64,
}

impl Default for CacheParams {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 100,
            ttl: Duration::from_secs(30 * 60),
            fuzzy_enabled: false,
            fuzzy_threshold: 0.9,
        }
    }
}

impl CacheParams {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_fuzzy(mut self, threshold: f64) -> Self {
        self.fuzzy_enabled = true;
        self.fuzzy_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.capacity == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "cache.capacity",
                "must be >= 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "cache.fuzzy_threshold",
                format!("{} is not within 0.0..=1.0", self.fuzzy_threshold),
            ));
        }
        if self.fuzzy_enabled && !self.enabled {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::FuzzyWithoutCache,
                "cache.fuzzy_enabled",
                "fuzzy lookup has no effect while the cache is disabled",
            ));
        }
        issues
    }
}

/// Memory store parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryParams {
    pub enabled: bool,
    pub state_block_tokens: usize,
    pub per_type_cap: usize,
    pub preamble_slices: usize,
}

impl Default for MemoryParams {
    fn default() -> Self {
        let memory = MemoryConfig::default();
        Self {
            enabled: true,
            state_block_tokens: memory.state_block_tokens,
            per_type_cap: memory.per_type_cap,
            preamble_slices: memory.preamble_slices,
        }
    }
}

impl MemoryParams {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn memory_config(&self) -> MemoryConfig {
        MemoryConfig {
            state_block_tokens: self.state_block_tokens,
            per_type_cap: self.per_type_cap,
            preamble_slices: self.preamble_slices,
            ..MemoryConfig::default()
        }
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.per_type_cap == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "memory.per_type_cap",
                "must be >= 1",
            ));
        }
        if self.state_block_tokens == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "memory.state_block_tokens",
                "must be >= 1",
            ));
        }
        issues
    }
}
