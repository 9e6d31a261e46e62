//! Infrastructure layer for agora
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: the Lua sandbox runtime, configuration file loading,
//! the JSON agent loader and the JSONL event logger.

pub mod config;
pub mod documents;
pub mod logging;
#[cfg(feature = "lua")]
pub mod sandbox;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileAggregatorConfig, FileCacheConfig, FileConfig,
    FileDecomposerConfig, FileExecutorConfig, FileMemoryConfig, FileSandboxConfig,
};
pub use documents::{DocumentLoadError, JsonAgentSource, LoadedAgents, RejectedRecord};
pub use logging::JsonlConversationLogger;
#[cfg(feature = "lua")]
pub use sandbox::LuaSandboxRuntime;
