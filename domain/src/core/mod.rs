//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`]: domain-level errors
//! - [`text`]: tokenization, similarity and token estimation helpers
//! - [`validation::ConfigIssue`]: structured configuration warnings

pub mod error;
pub mod text;
pub mod validation;
