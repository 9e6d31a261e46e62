//! Prompt domain
//!
//! Templates for every completion the pipeline issues: sub-query text per
//! intent, map/reduce/debate/synthesis instructions and the sandbox contract.

mod template;

pub use template::PromptTemplate;
