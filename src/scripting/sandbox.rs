/// `scripting/sandbox.rs` - Which Lua standard libraries the script VM gets
///
/// `package` is loaded under every policy because the bootstrap relies on
/// `require` to find the entry module.
use mlua::{Lua, LuaOptions, Result as LuaResult, StdLib};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdLibPolicy {
    /// Every library mlua considers safe, including `io` and `os`.
    #[default]
    Standard,
    /// No file or OS access: table, string, math, coroutine, utf8, package.
    Restricted,
}

impl StdLibPolicy {
    pub fn libs(self) -> StdLib {
        match self {
            Self::Standard => StdLib::ALL_SAFE,
            Self::Restricted => {
                StdLib::TABLE
                    | StdLib::STRING
                    | StdLib::MATH
                    | StdLib::COROUTINE
                    | StdLib::UTF8
                    | StdLib::PACKAGE
            }
        }
    }
}

/// Create the script VM with the libraries allowed by `policy`.
pub fn create_vm(policy: StdLibPolicy) -> LuaResult<Lua> {
    Lua::new_with(policy.libs(), LuaOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Value;

    #[test]
    fn restricted_vm_has_no_io_or_os() {
        let lua = create_vm(StdLibPolicy::Restricted).unwrap();
        let globals = lua.globals();
        assert!(matches!(globals.get::<Value>("io").unwrap(), Value::Nil));
        assert!(matches!(globals.get::<Value>("os").unwrap(), Value::Nil));
        assert!(matches!(globals.get::<Value>("package").unwrap(), Value::Table(_)));
        assert!(matches!(globals.get::<Value>("string").unwrap(), Value::Table(_)));
    }

    #[test]
    fn standard_vm_has_io_and_os() {
        let lua = create_vm(StdLibPolicy::Standard).unwrap();
        let globals = lua.globals();
        assert!(matches!(globals.get::<Value>("io").unwrap(), Value::Table(_)));
        assert!(matches!(globals.get::<Value>("os").unwrap(), Value::Table(_)));
    }
}
