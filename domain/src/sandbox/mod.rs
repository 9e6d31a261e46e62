//! Sandbox code contract: the rules generated code must follow.
//!
//! - [`validator::CodeValidator`]: static rejection of disallowed capabilities
//! - [`examples::ReplQueryKind`]: procedural query classes and their few-shot examples
//! - [`value_objects`]: limits, run outcome and extracted code

pub mod examples;
pub mod validator;
pub mod value_objects;

pub use examples::ReplQueryKind;
pub use validator::{CodeValidator, ValidationError, extract_code};
pub use value_objects::{SandboxLimits, SandboxOutput, SubLmMode};
