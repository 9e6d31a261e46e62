//! Sandboxed execution of generated Lua code.

pub mod environment;
pub mod lua_runtime;

pub use lua_runtime::LuaSandboxRuntime;
