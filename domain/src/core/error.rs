//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid agent document: {0}")]
    InvalidDocument(String),

    #[error("Duplicate agent id: {0}")]
    DuplicateAgent(String),

    #[error("Unknown agent id: {0}")]
    UnknownAgent(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },
}
