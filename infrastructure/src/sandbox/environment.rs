//! Restricted Lua environment for generated code.
//!
//! The VM is created with only the `string`, `table`, `math` and `utf8`
//! libraries. The base library is always present in Lua, so the globals that
//! load code or reach around the environment are removed afterwards.

use mlua::prelude::*;

/// Libraries opened in a sandbox VM.
pub fn allowed_libraries() -> LuaStdLib {
    LuaStdLib::STRING | LuaStdLib::TABLE | LuaStdLib::MATH | LuaStdLib::UTF8
}

/// Base-library globals removed before any generated code runs.
///
/// `pcall` is not listed: the runtime replaces it with a wrapper that lets
/// limit violations through.
pub const REMOVED_GLOBALS: &[&str] = &[
    "load",
    "loadstring",
    "dofile",
    "loadfile",
    "require",
    "collectgarbage",
    "rawget",
    "rawset",
    "rawequal",
    "rawlen",
    "setmetatable",
    "getmetatable",
    "xpcall",
    "_G",
];

/// Create a VM with the allowed libraries and strip the dangerous globals.
pub fn restricted_vm() -> LuaResult<Lua> {
    let lua = Lua::new_with(allowed_libraries(), LuaOptions::default())?;
    apply_restrictions(&lua)?;
    Ok(lua)
}

/// Remove globals that load code or inspect the interpreter.
pub fn apply_restrictions(lua: &Lua) -> LuaResult<()> {
    let globals = lua.globals();
    for name in REMOVED_GLOBALS {
        globals.set(*name, LuaValue::Nil)?;
    }
    if let Ok(string) = globals.get::<LuaTable>("string") {
        string.set("dump", LuaValue::Nil)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dangerous_libraries_are_absent() {
        let lua = restricted_vm().unwrap();
        for name in ["os", "io", "debug", "package", "coroutine", "require", "load", "_G"] {
            let value: LuaValue = lua.globals().get(name).unwrap();
            assert_eq!(value, LuaValue::Nil, "{} should be removed", name);
        }
    }

    #[test]
    fn test_string_dump_is_removed() {
        let lua = restricted_vm().unwrap();
        let dump: LuaValue = lua.load("return string.dump").eval().unwrap();
        assert_eq!(dump, LuaValue::Nil);
    }

    #[test]
    fn test_allowed_libraries_work() {
        let lua = restricted_vm().unwrap();
        let upper: String = lua.load("return string.upper('agora')").eval().unwrap();
        assert_eq!(upper, "AGORA");
        let joined: String = lua
            .load("return table.concat({'a', 'b'}, ', ')")
            .eval()
            .unwrap();
        assert_eq!(joined, "a, b");
        let floor: i64 = lua.load("return math.floor(2.7)").eval().unwrap();
        assert_eq!(floor, 2);
        let len: i64 = lua.load("return utf8.len('héllo')").eval().unwrap();
        assert_eq!(len, 5);
    }

    #[test]
    fn test_calling_removed_global_fails() {
        let lua = restricted_vm().unwrap();
        assert!(lua.load("load('return 1')()").exec().is_err());
    }
}
