/// `scripting/runtime.rs` - The Lua VM as seen from the script thread
///
/// Boots the VM (libraries, capability table, entry module) and then runs
/// the event loop. Everything here executes on the script thread; the VM
/// never leaves it.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mlua::{Function, Lua};

use super::{
    api::{AlertStyle, CapabilityExportTable, FRAME_HOOK_KEY},
    cursor::EventCursor,
    engine::HostContext,
    sandbox::create_vm,
};
use crate::{bridge::EventKind, error::Result};

/// Receives `(sysdir, symbols, entry)`. Wires the search path, publishes the
/// capability table, then requires the entry module and calls its `main`.
const BOOT_SCRIPT: &str = r#"
local sysdir, symbols, entry = ...
package.path = package.path .. ';' .. sysdir .. 'Lua/?.lua' .. ';' .. sysdir .. 'Lua/?/init.lua'
_BRIDGE_SYMS = symbols
local module = require(entry)
if type(module) ~= 'table' or type(module.main) ~= 'function' then
  error("module '" .. entry .. "' does not export a main function", 0)
end
module.main()
"#;

pub(crate) struct ScriptRuntime {
    lua: Lua,
    cursor: Arc<Mutex<EventCursor>>,
    ctx: Arc<HostContext>,
}

impl ScriptRuntime {
    pub(crate) fn boot(ctx: Arc<HostContext>) -> Result<Self> {
        let lua = create_vm(ctx.config.stdlib)?;
        let cursor = Arc::new(Mutex::new(EventCursor::new()));

        let symbols = CapabilityExportTable::new(
            Arc::clone(&ctx.capabilities),
            Arc::clone(&ctx.bridge),
            Arc::clone(&cursor),
        )
        .install(&lua)?;

        let boot = lua.load(BOOT_SCRIPT).set_name("=bootstrap").into_function()?;
        boot.call::<()>((
            ctx.config.sys_dir_for_scripts(),
            symbols,
            ctx.config.entry_module.as_str(),
        ))?;

        Ok(Self { lua, cursor, ctx })
    }

    /// Process events until `Stop`. Returns at once if the entry module
    /// already pulled `Stop` through `Wait` during boot.
    pub(crate) fn run(&self) {
        let timeout = self.ctx.config.wait_timeout();
        loop {
            let kind = {
                let mut cursor = self.cursor();
                if cursor.stop_seen() {
                    log::debug!("Stop already consumed by script code");
                    break;
                }
                cursor.advance(&self.ctx.bridge, timeout)
            };

            match kind {
                EventKind::Stop => break,
                EventKind::Evaluate => self.evaluate(),
                EventKind::Frame => self.tick(),
                EventKind::None => {}
            }
        }
    }

    fn evaluate(&self) {
        // The cursor lock is released before entering the VM: compiling can
        // run `__gc` finalizers, and any script code may call `Wait` or
        // `EvaluateScript`, which take the same lock.
        let Some(script) = self.cursor().script().map(str::to_owned) else {
            return;
        };

        let compiled = self.lua.load(script).set_name("=evaluate").into_function();
        if let Err(e) = compiled.and_then(|f| f.call::<()>(())) {
            self.ctx.report(AlertStyle::Warning, "Failed to evaluate script", &e);
        }
    }

    fn tick(&self) {
        let hook = match self.lua.named_registry_value::<Option<Function>>(FRAME_HOOK_KEY) {
            Ok(hook) => hook,
            Err(e) => {
                self.ctx.report(AlertStyle::Warning, "Frame hook lookup failed", &e);
                return;
            }
        };
        if let Some(hook) = hook {
            if let Err(e) = hook.call::<()>(()) {
                self.ctx.report(AlertStyle::Warning, "Frame hook failed", &e);
            }
        }
    }

    fn cursor(&self) -> MutexGuard<'_, EventCursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
