//! Application-level configuration.
//!
//! This module provides configuration types that control how use cases behave:
//!
//! - [`ExecutorParams`]: worker pool, retries, timeouts, recursion depth
//! - [`AggregatorParams`]: early stop, conflict detection, merge limits
//! - [`CacheParams`] / [`MemoryParams`]: cross-turn state
//! - [`SandboxParams`]: code generation attempts and run limits
//! - [`PipelineConfig`]: container holding all of the above

pub mod aggregator_params;
pub mod executor_params;
pub mod pipeline_config;
pub mod sandbox_params;
pub mod store_params;

pub use aggregator_params::AggregatorParams;
pub use executor_params::ExecutorParams;
pub use pipeline_config::PipelineConfig;
pub use sandbox_params::SandboxParams;
pub use store_params::{CacheParams, MemoryParams};
