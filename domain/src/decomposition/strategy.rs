//! Decomposition strategies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a decomposed query is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecompositionStrategy {
    /// Single combined call over a handful of documents
    Direct,
    /// One independent sub-query per document, run concurrently
    Parallel,
    /// Per-document map phase followed by a dependent reduce phase
    MapReduce,
    /// Map phase, perspective debate, then reduce
    MapReduceDebate,
    /// Broad exploratory pass with an uncertainty-gated follow-up
    Iterative,
}

impl DecompositionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecompositionStrategy::Direct => "direct",
            DecompositionStrategy::Parallel => "parallel",
            DecompositionStrategy::MapReduce => "map-reduce",
            DecompositionStrategy::MapReduceDebate => "map-reduce-debate",
            DecompositionStrategy::Iterative => "iterative",
        }
    }

    /// Whether the plan ends in a reduce sub-query.
    pub fn has_reduce_phase(&self) -> bool {
        matches!(
            self,
            DecompositionStrategy::MapReduce | DecompositionStrategy::MapReduceDebate
        )
    }
}

impl fmt::Display for DecompositionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&DecompositionStrategy::MapReduceDebate).unwrap();
        assert_eq!(json, "\"map-reduce-debate\"");
        assert_eq!(
            DecompositionStrategy::MapReduceDebate.to_string(),
            "map-reduce-debate"
        );
    }

    #[test]
    fn test_reduce_phase() {
        assert!(DecompositionStrategy::MapReduce.has_reduce_phase());
        assert!(!DecompositionStrategy::Parallel.has_reduce_phase());
    }
}
