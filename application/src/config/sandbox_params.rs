//! Sandbox parameters: generation attempts and run limits.

use agora_domain::{ConfigIssue, ConfigIssueCode, SandboxLimits, SubLmMode};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct SandboxParams {
    pub enabled: bool,
    /// Generation attempts before falling back to the pipeline.
    pub max_attempts: u32,
    pub wall_clock: Duration,
    pub sub_lm_timeout: Duration,
    pub output_limit: usize,
    pub memory_limit: usize,
    pub max_code_bytes: usize,
    pub sub_lm_mode: SubLmMode,
}

impl Default for SandboxParams {
    fn default() -> Self {
        let limits = SandboxLimits::default();
        Self {
            enabled: true,
            max_attempts: 3,
            wall_clock: limits.wall_clock,
            sub_lm_timeout: limits.sub_lm_timeout,
            output_limit: limits.output_bytes,
            memory_limit: limits.memory_bytes,
            max_code_bytes: agora_domain::sandbox::validator::DEFAULT_MAX_CODE_BYTES,
            sub_lm_mode: limits.sub_lm_mode,
        }
    }
}

impl SandboxParams {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_sub_lm_mode(mut self, mode: SubLmMode) -> Self {
        self.sub_lm_mode = mode;
        self
    }

    pub fn with_sub_lm_timeout(mut self, timeout: Duration) -> Self {
        self.sub_lm_timeout = timeout;
        self
    }

    pub fn with_wall_clock(mut self, wall_clock: Duration) -> Self {
        self.wall_clock = wall_clock;
        self
    }

    /// Limits for a run at `depth`.
    pub fn limits_at(&self, depth: usize, max_depth: usize) -> SandboxLimits {
        SandboxLimits {
            wall_clock: self.wall_clock,
            memory_bytes: self.memory_limit,
            output_bytes: self.output_limit,
            sub_lm_timeout: self.sub_lm_timeout,
            depth,
            max_depth,
            sub_lm_mode: self.sub_lm_mode,
        }
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.max_attempts == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "sandbox.max_attempts",
                "must be >= 1",
            ));
        }
        if self.wall_clock.is_zero() || self.sub_lm_timeout.is_zero() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "sandbox.wall_clock",
                "time limits must be positive",
            ));
        }
        if self.max_code_bytes == 0 || self.output_limit == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange,
                "sandbox.max_code_bytes",
                "size limits must be positive",
            ));
        }
        issues
    }
}
