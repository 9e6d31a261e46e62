//! Sandbox configuration from TOML (`[sandbox]` section)

use agora_application::SandboxParams;
use agora_domain::{ConfigIssue, ConfigIssueCode, SubLmMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw sandbox configuration from TOML
///
/// # Example
///
/// ```toml
/// [sandbox]
/// enabled = true
/// max_attempts = 3
/// wall_clock_secs = 30
/// sub_lm_timeout_secs = 60
/// output_limit = 65536
/// memory_limit = 67108864
/// sub_lm_mode = "direct"                   # "direct" or "deferred"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSandboxConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub wall_clock_secs: u64,
    pub sub_lm_timeout_secs: u64,
    pub output_limit: usize,
    pub memory_limit: usize,
    pub max_code_bytes: usize,
    pub sub_lm_mode: String,
}

impl Default for FileSandboxConfig {
    fn default() -> Self {
        let params = SandboxParams::default();
        Self {
            enabled: params.enabled,
            max_attempts: params.max_attempts,
            wall_clock_secs: params.wall_clock.as_secs(),
            sub_lm_timeout_secs: params.sub_lm_timeout.as_secs(),
            output_limit: params.output_limit,
            memory_limit: params.memory_limit,
            max_code_bytes: params.max_code_bytes,
            sub_lm_mode: params.sub_lm_mode.as_str().to_string(),
        }
    }
}

impl FileSandboxConfig {
    /// Parse `sub_lm_mode`, warning and falling back to direct on unknown values.
    pub fn parse_sub_lm_mode(&self) -> (SubLmMode, Vec<ConfigIssue>) {
        match self.sub_lm_mode.parse::<SubLmMode>() {
            Ok(mode) => (mode, vec![]),
            Err(_) => {
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::UnknownValue,
                    "sandbox.sub_lm_mode",
                    format!(
                        "unknown value '{}', falling back to 'direct'",
                        self.sub_lm_mode
                    ),
                );
                (SubLmMode::default(), vec![issue])
            }
        }
    }

    pub fn to_params(&self) -> (SandboxParams, Vec<ConfigIssue>) {
        let (sub_lm_mode, mut issues) = self.parse_sub_lm_mode();
        let params = SandboxParams {
            enabled: self.enabled,
            max_attempts: self.max_attempts,
            wall_clock: Duration::from_secs(self.wall_clock_secs),
            sub_lm_timeout: Duration::from_secs(self.sub_lm_timeout_secs),
            output_limit: self.output_limit,
            memory_limit: self.memory_limit,
            max_code_bytes: self.max_code_bytes,
            sub_lm_mode,
        };
        issues.extend(params.validate());
        if issues.iter().any(ConfigIssue::is_error) {
            (SandboxParams::default(), issues)
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
        let (params, issues) = FileSandboxConfig::default().to_params();
        assert!(issues.is_empty());
        assert_eq!(params, SandboxParams::default());
    }

    #[test]
    fn test_deferred_mode() {
        let config: super::super::FileConfig =
            toml::from_str("[sandbox]\nsub_lm_mode = \"Deferred\"\n").unwrap();
        let (params, issues) = config.sandbox.to_params();
        assert!(issues.is_empty());
        assert_eq!(params.sub_lm_mode, SubLmMode::Deferred);
    }

    #[test]
    fn test_unknown_mode_warns() {
        let config = FileSandboxConfig {
            sub_lm_mode: "async".to_string(),
            wall_clock_secs: 5,
            ..Default::default()
        };
        let (params, issues) = config.to_params();
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].is_error());
        assert_eq!(params.sub_lm_mode, SubLmMode::Direct);
        assert_eq!(params.wall_clock, Duration::from_secs(5));
    }

    #[test]
    fn test_zero_wall_clock_falls_back() {
        let config = FileSandboxConfig {
            wall_clock_secs: 0,
            ..Default::default()
        };
        let (params, issues) = config.to_params();
        assert!(issues.iter().any(ConfigIssue::is_error));
        assert_eq!(params.wall_clock, Duration::from_secs(30));
    }
}
