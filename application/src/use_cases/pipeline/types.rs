//! Types for the pipeline use case.

use agora_domain::{
    CacheStats, Conflict, DecompositionStrategy, ExecutionSummary, QueryIntent,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which tier of the fallback chain produced the answer.
///
/// ```text
/// cache ─▶ fuzzy-cache ─▶ sandbox ─▶ reduce | direct | synthesized ─▶ simple-merge ─▶ degraded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerTier {
    Cache,
    FuzzyCache,
    Sandbox,
    /// A single successful sub-query, returned verbatim
    Direct,
    Synthesized,
    /// The reduce phase of a map-reduce plan
    Reduce,
    SimpleMerge,
    /// Nothing usable was produced
    Degraded,
}

impl AnswerTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerTier::Cache => "cache",
            AnswerTier::FuzzyCache => "fuzzy-cache",
            AnswerTier::Sandbox => "sandbox",
            AnswerTier::Direct => "direct",
            AnswerTier::Synthesized => "synthesized",
            AnswerTier::Reduce => "reduce",
            AnswerTier::SimpleMerge => "simple-merge",
            AnswerTier::Degraded => "degraded",
        }
    }

    pub fn is_degraded(&self) -> bool {
        *self == AnswerTier::Degraded
    }
}

impl fmt::Display for AnswerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tier that was tried and did not produce the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierFailure {
    pub tier: AnswerTier,
    pub reason: String,
}

impl TierFailure {
    pub fn new(tier: AnswerTier, reason: impl Into<String>) -> Self {
        Self {
            tier,
            reason: reason.into(),
        }
    }
}

/// Entry point a result came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessMode {
    /// Decomposition pipeline
    Rlm,
    /// Sandboxed code path
    Repl,
}

impl ProcessMode {
    /// Prefix used in cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessMode::Rlm => "rlm",
            ProcessMode::Repl => "repl",
        }
    }
}

/// Answer plus metadata describing how it was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub query: String,
    pub answer: String,
    pub tier: AnswerTier,
    /// Served from the query cache
    pub cached: bool,
    pub mode: ProcessMode,
    pub strategy: Option<DecompositionStrategy>,
    pub intent: Option<QueryIntent>,
    pub sub_queries: usize,
    pub execution: ExecutionSummary,
    pub conflicts: Vec<Conflict>,
    pub failures: Vec<TierFailure>,
    /// Completion calls made by this run (0 when cached)
    pub completion_calls: u64,
    /// Attribution labels of the answers that were used
    pub sources: Vec<String>,
    /// Documents behind the successful answers
    pub agent_ids: Vec<String>,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    /// Similarity of the matched query for fuzzy cache hits
    pub similarity: Option<f64>,
}

impl PipelineResult {
    pub fn new(query: impl Into<String>, mode: ProcessMode) -> Self {
        Self {
            query: query.into(),
            answer: String::new(),
            tier: AnswerTier::Degraded,
            cached: false,
            mode,
            strategy: None,
            intent: None,
            sub_queries: 0,
            execution: ExecutionSummary::default(),
            conflicts: Vec::new(),
            failures: Vec::new(),
            completion_calls: 0,
            sources: Vec::new(),
            agent_ids: Vec::new(),
            elapsed: Duration::ZERO,
            similarity: None,
        }
    }

    /// Degraded result carrying `reason` as both the answer and a failure.
    pub fn degraded(query: impl Into<String>, mode: ProcessMode, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let mut result = Self::new(query, mode);
        result.answer = format!("I could not produce an answer: {}", reason);
        result.failures.push(TierFailure::new(AnswerTier::Degraded, reason));
        result
    }

    pub fn used_fallback(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Per-call options for `Pipeline::process` and `Pipeline::process_with_repl`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Skip the cache lookup (the result is still cached)
    pub bypass_cache: bool,
    /// TTL for the cached result instead of the configured one
    pub cache_ttl: Option<Duration>,
}

impl ProcessOptions {
    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }
}

/// Counters reported by `Pipeline::get_stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub queries: u64,
    pub cache_hits: u64,
    pub fuzzy_cache_hits: u64,
    pub cache_misses: u64,
    pub completion_calls: u64,
    pub sandbox_runs: u64,
    pub sandbox_successes: u64,
    pub sandbox_fallbacks: u64,
    pub synthesis_fallbacks: u64,
    pub degraded: u64,
    pub memory_slices: usize,
    pub active_documents: usize,
    pub cache: CacheStats,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
