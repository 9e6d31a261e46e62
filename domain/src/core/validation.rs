//! Structured configuration issues.
//!
//! Parameter structs validate themselves and report problems as
//! [`ConfigIssue`]s instead of failing, so a loader can fall back to
//! defaults and surface warnings.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The value cannot be used; the default is substituted.
    Error,
    /// The value works but probably not as intended.
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A numeric value is outside its accepted range.
    OutOfRange,
    /// An enumerated value was not recognized.
    UnknownValue,
    /// Debate needs more perspectives than the map phase can produce.
    DebateUnreachable,
    /// Fuzzy lookup is enabled on a disabled cache.
    FuzzyWithoutCache,
    /// `max_depth` leaves no room for any `sub_lm` call.
    NoRecursionHeadroom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    /// Dotted key the issue refers to, e.g. `executor.concurrency`
    pub key: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}: {}", level, self.key, self.message)
    }
}
