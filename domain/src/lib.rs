//! Domain layer for agora
//!
//! This crate contains the core logic of multi-document question answering:
//! everything that can be decided without talking to a completion service.
//! It has no dependencies on async runtimes, transports or presentation.
//!
//! # Core Concepts
//!
//! ## Documents
//!
//! An [`AgentDocument`] is one ingested source (a meeting, a report). The
//! [`DocumentStore`] indexes them, scores relevance and assembles
//! token-budgeted context.
//!
//! ## Decomposition
//!
//! The [`QueryDecomposer`] classifies a query and emits a
//! [`DecompositionPlan`]: a strategy plus the [`SubQuery`]s that answer it.
//!
//! ## Aggregation, cache and memory
//!
//! - [`ConflictDetector`] and [`simple_merge`] back the response aggregator
//! - [`QueryCache`] stores whole pipeline results under a [`CacheKey`]
//! - [`MemoryStore`] keeps structured facts from earlier answers
//!
//! ## Sandbox contract
//!
//! [`CodeValidator`] statically checks generated code; [`ReplQueryKind`]
//! picks the few-shot example shown to the generator.

pub mod aggregation;
pub mod cache;
pub mod core;
pub mod decomposition;
pub mod document;
pub mod execution;
pub mod memory;
pub mod prompt;
pub mod sandbox;

pub use aggregation::{
    Conflict, ConflictConfig, ConflictDetector, MergeConfig, MergedAnswer, is_near_duplicate_set,
    simple_merge,
};
pub use cache::{CacheKey, CacheStats, FuzzyHit, QueryCache, normalize_query};
pub use core::{
    error::DomainError,
    validation::{ConfigIssue, ConfigIssueCode, Severity},
};
pub use decomposition::{
    DebatePairing, DecomposerConfig, DecompositionPlan, DecompositionStrategy, KeywordClassifier,
    Perspective, QueryClassification, QueryClassifier, QueryComplexity, QueryDecomposer,
    QueryIntent, SubQuery, SubQueryStatus, SubQueryType, should_use_repl, should_use_rlm,
};
pub use document::{
    AgentDocument, BudgetEntry, BudgetRequest, BudgetedContext, ContextLevel, DocumentStore,
    QueryOptions, ScoredAgent,
};
pub use execution::{ExecutionResult, ExecutionSummary};
pub use memory::{
    MemoryConfig, MemoryContext, MemorySlice, MemoryStore, RetrievalOptions, SliceType, StateBlock,
    WorkingWindow,
};
pub use prompt::PromptTemplate;
pub use sandbox::{
    CodeValidator, ReplQueryKind, SandboxLimits, SandboxOutput, SubLmMode, ValidationError,
    extract_code,
};
