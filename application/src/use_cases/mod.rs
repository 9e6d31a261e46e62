//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod aggregator;
pub mod executor;
pub mod pipeline;
pub mod recursive;

#[cfg(test)]
pub(crate) mod testing;
