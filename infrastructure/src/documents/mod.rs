//! Loading agent documents from files.

mod json_source;

pub use json_source::{DocumentLoadError, JsonAgentSource, LoadedAgents, RejectedRecord};
