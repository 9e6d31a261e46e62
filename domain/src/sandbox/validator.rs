//! Static validation of generated sandbox code.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Default upper bound on generated code length, in bytes.
pub const DEFAULT_MAX_CODE_BYTES: usize = 16 * 1024;

static DISALLOWED: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("os library", r"\bos\s*\."),
        ("io library", r"\bio\s*\."),
        ("require", r"\brequire\b"),
        ("file loading", r"\b(dofile|loadfile)\b"),
        ("dynamic code loading", r"\b(load|loadstring)\s*\("),
        ("debug library", r"\bdebug\s*\."),
        ("package library", r"\bpackage\b"),
        ("global environment", r"\b(_G|_ENV)\b"),
        (
            "raw or metatable access",
            r"\b(getfenv|setfenv|rawget|rawset|rawequal|rawlen|setmetatable|getmetatable)\b",
        ),
        ("garbage collector", r"\bcollectgarbage\b"),
        ("bytecode dump", r"\bstring\s*\.\s*dump\b"),
        ("network access", r"\b(socket|http)\s*[.:]"),
    ]
    .into_iter()
    .map(|(reason, pattern)| (reason, Regex::new(pattern).expect("valid sandbox pattern")))
    .collect()
});

static TERMINATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bFINAL(?:_VAR)?\s*\(").expect("valid terminator pattern"));

static LUA_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:lua|Lua|LUA)?[ \t]*\r?\n(.*?)```").expect("valid fence pattern")
});

/// Why generated code was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub reason: String,
    /// The offending text, when a disallowed pattern matched
    pub pattern: Option<String>,
}

impl ValidationError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            pattern: None,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pattern {
            Some(pattern) => write!(f, "{} (found `{}`)", self.reason, pattern),
            None => write!(f, "{}", self.reason),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Rejects code that reaches outside the sandbox or never terminates with an answer.
#[derive(Debug, Clone)]
pub struct CodeValidator {
    max_code_bytes: usize,
}

impl Default for CodeValidator {
    fn default() -> Self {
        Self {
            max_code_bytes: DEFAULT_MAX_CODE_BYTES,
        }
    }
}

impl CodeValidator {
    pub fn new(max_code_bytes: usize) -> Self {
        Self { max_code_bytes }
    }

    pub fn max_code_bytes(&self) -> usize {
        self.max_code_bytes
    }

    pub fn validate(&self, code: &str) -> Result<(), ValidationError> {
        if code.trim().is_empty() {
            return Err(ValidationError::new("code is empty"));
        }
        if code.len() > self.max_code_bytes {
            return Err(ValidationError::new(format!(
                "code is {} bytes, limit is {}",
                code.len(),
                self.max_code_bytes
            )));
        }
        for (reason, pattern) in DISALLOWED.iter() {
            if let Some(found) = pattern.find(code) {
                return Err(ValidationError {
                    reason: format!("uses disallowed {}", reason),
                    pattern: Some(found.as_str().to_string()),
                });
            }
        }
        if !TERMINATOR.is_match(code) {
            return Err(ValidationError::new(
                "code never calls FINAL or FINAL_VAR",
            ));
        }
        Ok(())
    }
}

/// Pull the code out of a model response.
///
/// Prefers the first fenced block; a response with no fence is taken as-is.
pub fn extract_code(response: &str) -> String {
    match LUA_FENCE.captures(response) {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        None => response.trim().to_string(),
    }
}
