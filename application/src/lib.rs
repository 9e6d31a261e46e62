//! Application layer for agora
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{
    AggregatorParams, CacheParams, ExecutorParams, MemoryParams, PipelineConfig, SandboxParams,
};
pub use ports::{
    completion_client::{CompletionClient, CompletionError, CountingClient, DisabledClient},
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    progress::{NoProgress, PipelinePhase, PipelineProgress},
    sandbox_runtime::{
        DeferredCall, SandboxError, SandboxRuntime, SubLmBridge, SubLmError, SubLmRequest,
    },
};
pub use use_cases::aggregator::{AggregationOutcome, ResponseAggregator};
pub use use_cases::executor::{
    DebateOutcome, ExecutionContext, ExecutionOutcome, ExecutorError, StatusChange,
    SubQueryExecutor,
};
pub use use_cases::pipeline::{
    AnswerTier, Pipeline, PipelineResult, PipelineStats, ProcessMode, ProcessOptions, TierFailure,
};
pub use use_cases::recursive::{RecursiveExecutor, RecursiveOutcome, RecursiveRunError};
