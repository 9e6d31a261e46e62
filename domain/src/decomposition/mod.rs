//! Query decomposition: classification, strategy selection and sub-query planning.
//!
//! - [`intent`]: pluggable [`QueryClassifier`] and the keyword-based default
//! - [`strategy::DecompositionStrategy`]: how a plan is executed
//! - [`sub_query`]: units of work and their status state machine
//! - [`perspective`]: analytical stances and the debate pairing table
//! - [`decomposer::QueryDecomposer`]: turns a query into a [`DecompositionPlan`]
//! - [`routing`]: heuristics deciding whether decomposition or the sandbox is used

pub mod decomposer;
pub mod intent;
pub mod perspective;
pub mod plan;
pub mod routing;
pub mod strategy;
pub mod sub_query;

pub use decomposer::{DecomposerConfig, QueryDecomposer};
pub use intent::{KeywordClassifier, QueryClassification, QueryClassifier, QueryComplexity, QueryIntent};
pub use perspective::{DebatePairing, Perspective};
pub use plan::DecompositionPlan;
pub use routing::{should_use_repl, should_use_rlm};
pub use strategy::DecompositionStrategy;
pub use sub_query::{SubQuery, SubQueryStatus, SubQueryType};
