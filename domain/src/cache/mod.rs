//! Query cache: keyed by mode, active document ids and normalized query.

pub mod key;
pub mod store;

pub use key::{CacheKey, normalize_query};
pub use store::{CacheStats, FuzzyHit, QueryCache};
