//! Sandbox limits and run outcome.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How `sub_lm` calls made by sandbox code are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubLmMode {
    /// Block the script until the host answers the call
    #[default]
    Direct,
    /// Return a placeholder immediately; answers are resolved after the run
    Deferred,
}

impl SubLmMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubLmMode::Direct => "direct",
            SubLmMode::Deferred => "deferred",
        }
    }
}

impl std::str::FromStr for SubLmMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(SubLmMode::Direct),
            "deferred" => Ok(SubLmMode::Deferred),
            other => Err(format!("unknown sub_lm mode: '{}'", other)),
        }
    }
}

/// Resource limits applied to one sandbox run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxLimits {
    pub wall_clock: Duration,
    pub memory_bytes: usize,
    /// Captured `print` output beyond this is dropped
    pub output_bytes: usize,
    pub sub_lm_timeout: Duration,
    /// Current recursion depth of the run
    pub depth: usize,
    pub max_depth: usize,
    pub sub_lm_mode: SubLmMode,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            wall_clock: Duration::from_secs(30),
            memory_bytes: 64 * 1024 * 1024,
            output_bytes: 64 * 1024,
            sub_lm_timeout: Duration::from_secs(60),
            depth: 0,
            max_depth: 3,
            sub_lm_mode: SubLmMode::Direct,
        }
    }
}

impl SandboxLimits {
    pub fn with_wall_clock(mut self, wall_clock: Duration) -> Self {
        self.wall_clock = wall_clock;
        self
    }

    pub fn with_depth(mut self, depth: usize, max_depth: usize) -> Self {
        self.depth = depth;
        self.max_depth = max_depth;
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

    pub fn with_output_bytes(mut self, output_bytes: usize) -> Self {
        self.output_bytes = output_bytes;
        self
    }

    /// Whether a `sub_lm` call from this run would exceed the depth limit.
    pub fn sub_lm_exceeds_depth(&self) -> bool {
        self.depth + 1 >= self.max_depth
    }
}

/// What a finished sandbox run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxOutput {
    /// Value passed to FINAL / FINAL_VAR, if the script got that far
    pub final_answer: Option<String>,
    /// Captured `print` output
    pub printed: String,
    pub output_truncated: bool,
    pub sub_lm_calls: usize,
}

impl SandboxOutput {
    pub fn has_answer(&self) -> bool {
        self.final_answer
            .as_deref()
            .is_some_and(|answer| !answer.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_limit() {
        let limits = SandboxLimits::default();
        assert!(!limits.sub_lm_exceeds_depth());
        assert!(limits.clone().with_depth(2, 3).sub_lm_exceeds_depth());
    }

    #[test]
    fn test_sub_lm_mode_parse() {
        assert_eq!("Deferred".parse::<SubLmMode>(), Ok(SubLmMode::Deferred));
        assert!("eager".parse::<SubLmMode>().is_err());
    }

    #[test]
    fn test_blank_final_is_not_an_answer() {
        let out = SandboxOutput {
            final_answer: Some("  ".into()),
            ..Default::default()
        };
        assert!(!out.has_answer());
    }
}
