//! Aggregation helpers: conflict detection and the simple-merge fallback.

pub mod conflict;
pub mod merge;

pub use conflict::{Conflict, ConflictConfig, ConflictDetector};
pub use merge::{MergeConfig, MergedAnswer, is_near_duplicate_set, simple_merge};
