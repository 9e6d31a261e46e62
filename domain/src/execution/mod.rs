//! Execution results handed from the executor to the aggregator.

pub mod result;

pub use result::{ExecutionResult, ExecutionSummary};
