//! Conversation memory: structured slices, the state block and the working window.
//!
//! - [`extract`]: heading/bullet heuristics over answer text
//! - [`state_block::StateBlock`]: per-type lists capped by a token budget
//! - [`window::WorkingWindow`]: last user turns and a rolling summary
//! - [`store::MemoryStore`]: the append-only log plus retrieval

pub mod extract;
pub mod slice;
pub mod state_block;
pub mod store;
pub mod window;

pub use slice::{MemorySlice, SliceType, content_hash};
pub use state_block::StateBlock;
pub use store::{MemoryConfig, MemoryContext, MemoryStore, RetrievalOptions};
pub use window::WorkingWindow;
