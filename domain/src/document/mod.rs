//! Document subdomain: agent documents and the store that indexes them.
//!
//! - [`entities::AgentDocument`]: one ingested source (e.g. a meeting transcript)
//! - [`store::DocumentStore`]: keyword index, relevance scoring, context slices
//! - [`budget::BudgetedContext`]: result of token-budgeted context assembly

pub mod budget;
pub mod entities;
pub mod store;

pub use budget::{BudgetEntry, BudgetRequest, BudgetedContext};
pub use entities::{AgentDocument, ContextLevel};
pub use store::{DocumentStore, QueryOptions, ScoredAgent};
