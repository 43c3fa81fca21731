/// `scripting/api.rs` - Capability export table handed to script code
///
/// Scripts pull work from the host by calling these functions directly
/// instead of the host pushing into script callbacks, so the VM never has to
/// be entered and left once per event. The table is built once per boot
/// and is read-only afterwards.
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mlua::{Function, Lua, Result as LuaResult, Table, Value};

use super::cursor::EventCursor;
use crate::bridge::EventBridge;

/// Named registry slot holding the function run on every `Frame` event.
pub const FRAME_HOOK_KEY: &str = "script_bridge.frame_hook";

// ── Host collaborator ─────────────────────────────────────────────────────────

/// Numeric log levels scripts pass to `Log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Notice = 1,
    Error = 2,
    Warning = 3,
    Info = 4,
    Debug = 5,
}

impl LogLevel {
    /// Unknown codes log at info.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Notice,
            2 => Self::Error,
            3 => Self::Warning,
            5 => Self::Debug,
            _ => Self::Info,
        }
    }

    pub fn as_log_level(self) -> log::Level {
        match self {
            Self::Error => log::Level::Error,
            Self::Warning => log::Level::Warn,
            Self::Notice | Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notice => "notice",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

/// Style of a modal alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertStyle {
    Information = 0,
    Question = 1,
    Warning = 2,
    Critical = 3,
}

impl AlertStyle {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Question,
            2 => Self::Warning,
            3 => Self::Critical,
            _ => Self::Information,
        }
    }
}

/// Everything the script thread may ask of the host application.
///
/// Called on the script thread only, but implementations are usually shared
/// with the rest of the host, hence `Send + Sync`.
pub trait HostCapabilities: Send + Sync {
    fn log(&self, level: LogLevel, text: &str);

    /// Show an alert. Returns the user's answer for yes/no alerts.
    fn alert(&self, yes_no: bool, style: AlertStyle, message: &str) -> bool;

    fn is_ram_address(&self, address: u32) -> bool;

    fn read_u8(&self, address: u32) -> u8;
    fn read_u16(&self, address: u32) -> u16;
    fn read_u32(&self, address: u32) -> u32;
    fn read_u64(&self, address: u32) -> u64;

    fn write_u8(&self, value: u8, address: u32);
    fn write_u16(&self, value: u16, address: u32);
    fn write_u32(&self, value: u32, address: u32);
    fn write_u64(&self, value: u64, address: u32);

    fn invalidate_icache(&self, address: u32, size: u32, forced: bool);
}

// ── Export table ──────────────────────────────────────────────────────────────

/// One exported name and the signature scripts can introspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub name: &'static str,
    pub signature: &'static str,
}

const fn cap(name: &'static str, signature: &'static str) -> Capability {
    Capability { name, signature }
}

pub const EXPORTS: &[Capability] = &[
    cap("AddEventMask", "fn(event: u16)"),
    cap("RemoveEventMask", "fn(event: u16)"),
    cap("Wait", "fn(timeout_ms: u64) -> u16"),
    cap("EvaluateScript", "fn() -> Option<String>"),
    cap("SetFrameHook", "fn(hook: Option<Function>)"),
    cap("MsgAlert", "fn(yes_no: bool, style: i32, message: &str) -> bool"),
    cap("Log", "fn(level: i32, text: &str)"),
    cap("Mem_IsRamAddress", "fn(address: u32) -> bool"),
    cap("Mem_Read8", "fn(address: u32) -> u8"),
    cap("Mem_Read16", "fn(address: u32) -> u16"),
    cap("Mem_Read32", "fn(address: u32) -> u32"),
    cap("Mem_Read64", "fn(address: u32) -> u64"),
    cap("Mem_Write8", "fn(value: u8, address: u32)"),
    cap("Mem_Write16", "fn(value: u16, address: u32)"),
    cap("Mem_Write32", "fn(value: u32, address: u32)"),
    cap("Mem_Write64", "fn(value: u64, address: u32)"),
    cap("Mem_InvalidateICache", "fn(address: u32, size: u32, forced: bool)"),
];

pub fn signature_of(name: &str) -> Option<&'static str> {
    EXPORTS.iter().find(|c| c.name == name).map(|c| c.signature)
}

/// The handles the exported functions close over.
pub struct CapabilityExportTable {
    host: Arc<dyn HostCapabilities>,
    bridge: Arc<EventBridge>,
    cursor: Arc<Mutex<EventCursor>>,
}

impl CapabilityExportTable {
    pub fn new(
        host: Arc<dyn HostCapabilities>,
        bridge: Arc<EventBridge>,
        cursor: Arc<Mutex<EventCursor>>,
    ) -> Self {
        Self { host, bridge, cursor }
    }

    pub fn entries() -> &'static [Capability] {
        EXPORTS
    }

    /// Build the table in `lua` and return a read-only view of it.
    pub fn install(&self, lua: &Lua) -> LuaResult<Table> {
        let raw = lua.create_table()?;
        self.bind_events(lua, &raw)?;
        self.bind_host(lua, &raw)?;
        self.bind_memory(lua, &raw)?;
        read_only(lua, raw)
    }

    fn bind_events(&self, lua: &Lua, raw: &Table) -> LuaResult<()> {
        let bridge = Arc::clone(&self.bridge);
        bind(raw, "AddEventMask", lua.create_function(move |_, id: Value| {
            if let Some(id) = event_id(&id) {
                bridge.enable(id);
            }
            Ok(())
        })?)?;

        let bridge = Arc::clone(&self.bridge);
        bind(raw, "RemoveEventMask", lua.create_function(move |_, id: Value| {
            if let Some(id) = event_id(&id) {
                bridge.disable(id);
            }
            Ok(())
        })?)?;

        let bridge = Arc::clone(&self.bridge);
        let cursor = Arc::clone(&self.cursor);
        bind(raw, "Wait", lua.create_function(move |_, timeout_ms: u64| {
            let mut cursor = cursor.lock().unwrap_or_else(PoisonError::into_inner);
            Ok(cursor.advance(&bridge, Duration::from_millis(timeout_ms)).id())
        })?)?;

        let cursor = Arc::clone(&self.cursor);
        bind(raw, "EvaluateScript", lua.create_function(move |lua, ()| {
            let cursor = cursor.lock().unwrap_or_else(PoisonError::into_inner);
            match cursor.script() {
                Some(script) => Ok(Value::String(lua.create_string(script)?)),
                None => Ok(Value::Nil),
            }
        })?)?;

        bind(raw, "SetFrameHook", lua.create_function(|lua, hook: Option<Function>| {
            lua.set_named_registry_value(FRAME_HOOK_KEY, hook)
        })?)?;
        Ok(())
    }

    fn bind_host(&self, lua: &Lua, raw: &Table) -> LuaResult<()> {
        let host = Arc::clone(&self.host);
        bind(raw, "MsgAlert", lua.create_function(
            move |_, (yes_no, style, message): (bool, i64, String)| {
                Ok(host.alert(yes_no, AlertStyle::from_code(style), &message))
            },
        )?)?;

        let host = Arc::clone(&self.host);
        bind(raw, "Log", lua.create_function(move |_, (level, text): (i64, String)| {
            host.log(LogLevel::from_code(level), &text);
            Ok(())
        })?)?;
        Ok(())
    }

    fn bind_memory(&self, lua: &Lua, raw: &Table) -> LuaResult<()> {
        let host = Arc::clone(&self.host);
        bind(raw, "Mem_IsRamAddress", lua.create_function(move |_, address: u32| {
            Ok(host.is_ram_address(address))
        })?)?;

        let shared = &self.host;
        macro_rules! read_fn {
            ($name:literal, $method:ident) => {{
                let host = Arc::clone(shared);
                bind(raw, $name, lua.create_function(move |_, address: u32| {
                    Ok(host.$method(address))
                })?)?;
            }};
        }
        macro_rules! write_fn {
            ($name:literal, $method:ident, $ty:ty) => {{
                let host = Arc::clone(shared);
                bind(raw, $name, lua.create_function(move |_, (value, address): ($ty, u32)| {
                    host.$method(value, address);
                    Ok(())
                })?)?;
            }};
        }

        read_fn!("Mem_Read8", read_u8);
        read_fn!("Mem_Read16", read_u16);
        read_fn!("Mem_Read32", read_u32);
        write_fn!("Mem_Write8", write_u8, u8);
        write_fn!("Mem_Write16", write_u16, u16);
        write_fn!("Mem_Write32", write_u32, u32);

        // Lua integers are i64; 64-bit values travel as their bit pattern.
        let host = Arc::clone(&self.host);
        bind(raw, "Mem_Read64", lua.create_function(move |_, address: u32| {
            Ok(host.read_u64(address) as i64)
        })?)?;
        let host = Arc::clone(&self.host);
        bind(raw, "Mem_Write64", lua.create_function(move |_, (value, address): (i64, u32)| {
            host.write_u64(value as u64, address);
            Ok(())
        })?)?;

        let host = Arc::clone(&self.host);
        bind(raw, "Mem_InvalidateICache", lua.create_function(
            move |_, (address, size, forced): (u32, u32, bool)| {
                host.invalidate_icache(address, size, forced);
                Ok(())
            },
        )?)?;
        Ok(())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Store `func` under `name` plus its `typeof_<name>` signature.
/// Kind id passed from script code. Anything that is not a whole number in
/// `u16` range yields `None` and the mask call does nothing.
fn event_id(value: &Value) -> Option<u16> {
    match *value {
        Value::Integer(i) => u16::try_from(i).ok(),
        Value::Number(n) if n.fract() == 0.0 && n >= 0.0 && n <= u16::MAX as f64 => {
            Some(n as u16)
        }
        _ => None,
    }
}

fn bind(raw: &Table, name: &str, func: Function) -> LuaResult<()> {
    let signature = signature_of(name).ok_or_else(|| {
        mlua::Error::RuntimeError(format!("capability {name} has no signature"))
    })?;
    raw.set(name, func)?;
    raw.set(format!("typeof_{name}"), signature)?;
    Ok(())
}

/// Empty proxy that reads through to `raw` and rejects every assignment.
fn read_only(lua: &Lua, raw: Table) -> LuaResult<Table> {
    let meta = lua.create_table()?;
    meta.set("__index", raw)?;
    meta.set("__newindex", lua.create_function(|_, (_t, key, _v): (Value, Value, Value)| {
        let key = match key {
            Value::String(s) => s.to_string_lossy(),
            other => format!("{other:?}"),
        };
        Err::<(), _>(mlua::Error::RuntimeError(format!(
            "capability table is read-only (tried to set {key})"
        )))
    })?)?;
    meta.set("__metatable", false)?;

    let proxy = lua.create_table()?;
    proxy.set_metatable(Some(meta));
    Ok(proxy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{Event, EventKind};
    use std::collections::HashMap;

    /// Records every call; memory is a plain map keyed by address.
    #[derive(Default)]
    struct FakeHost {
        logs: Mutex<Vec<(LogLevel, String)>>,
        alerts: Mutex<Vec<(bool, AlertStyle, String)>>,
        mem: Mutex<HashMap<u32, u64>>,
        icache: Mutex<Vec<(u32, u32, bool)>>,
    }

    impl FakeHost {
        fn get(&self, address: u32) -> u64 {
            self.mem.lock().unwrap().get(&address).copied().unwrap_or(0)
        }
        fn put(&self, address: u32, value: u64) {
            self.mem.lock().unwrap().insert(address, value);
        }
    }

    impl HostCapabilities for FakeHost {
        fn log(&self, level: LogLevel, text: &str) {
            self.logs.lock().unwrap().push((level, text.to_string()));
        }
        fn alert(&self, yes_no: bool, style: AlertStyle, message: &str) -> bool {
            self.alerts.lock().unwrap().push((yes_no, style, message.to_string()));
            yes_no
        }
        fn is_ram_address(&self, address: u32) -> bool {
            address >= 0x8000_0000
        }
        fn read_u8(&self, address: u32) -> u8 {
            self.get(address) as u8
        }
        fn read_u16(&self, address: u32) -> u16 {
            self.get(address) as u16
        }
        fn read_u32(&self, address: u32) -> u32 {
            self.get(address) as u32
        }
        fn read_u64(&self, address: u32) -> u64 {
            self.get(address)
        }
        fn write_u8(&self, value: u8, address: u32) {
            self.put(address, value as u64);
        }
        fn write_u16(&self, value: u16, address: u32) {
            self.put(address, value as u64);
        }
        fn write_u32(&self, value: u32, address: u32) {
            self.put(address, value as u64);
        }
        fn write_u64(&self, value: u64, address: u32) {
            self.put(address, value);
        }
        fn invalidate_icache(&self, address: u32, size: u32, forced: bool) {
            self.icache.lock().unwrap().push((address, size, forced));
        }
    }

    struct Fixture {
        lua: Lua,
        host: Arc<FakeHost>,
        bridge: Arc<EventBridge>,
        cursor: Arc<Mutex<EventCursor>>,
    }

    fn fixture() -> Fixture {
        let lua = Lua::new();
        let host = Arc::new(FakeHost::default());
        let bridge = Arc::new(EventBridge::new());
        let cursor = Arc::new(Mutex::new(EventCursor::new()));
        let table = CapabilityExportTable::new(host.clone(), bridge.clone(), cursor.clone())
            .install(&lua)
            .unwrap();
        lua.globals().set("syms", table).unwrap();
        Fixture { lua, host, bridge, cursor }
    }

    #[test]
    fn every_export_is_callable_with_a_signature() {
        let f = fixture();
        for c in CapabilityExportTable::entries() {
            let kind: String = f
                .lua
                .load(format!("return type(syms.{})", c.name))
                .eval()
                .unwrap();
            assert_eq!(kind, "function", "{} should be a function", c.name);

            let sig: String = f
                .lua
                .load(format!("return syms.typeof_{}", c.name))
                .eval()
                .unwrap();
            assert_eq!(sig, c.signature);
        }
    }

    #[test]
    fn table_rejects_writes() {
        let f = fixture();
        let err = f.lua.load("syms.Log = nil").exec().unwrap_err();
        assert!(err.to_string().contains("read-only"), "got: {err}");

        let err = f.lua.load("syms.Extra = function() end").exec().unwrap_err();
        assert!(err.to_string().contains("Extra"), "got: {err}");

        let err = f.lua.load("setmetatable(syms, nil)").exec().unwrap_err();
        assert!(err.to_string().contains("protected"), "got: {err}");
    }

    #[test]
    fn mask_calls_reach_the_bridge() {
        let f = fixture();
        f.lua.load("syms.AddEventMask(2)").exec().unwrap();
        assert!(f.bridge.is_enabled(EventKind::Frame.id()));

        f.lua.load("syms.RemoveEventMask(2); syms.RemoveEventMask(0)").exec().unwrap();
        assert!(!f.bridge.is_enabled(EventKind::Frame.id()));
        assert!(f.bridge.is_enabled(EventKind::Stop.id()));
    }

    #[test]
    fn malformed_mask_ids_are_ignored() {
        let f = fixture();
        let before = f.bridge.mask().enabled_ids();

        f.lua
            .load(
                "syms.AddEventMask(70000); syms.RemoveEventMask(-1); \
                 syms.AddEventMask(2.5); syms.RemoveEventMask('1'); \
                 syms.AddEventMask(nil); syms.AddEventMask(9999)",
            )
            .exec()
            .unwrap();
        assert_eq!(f.bridge.mask().enabled_ids(), before);

        f.lua.load("syms.AddEventMask(2.0)").exec().unwrap();
        assert!(f.bridge.is_enabled(EventKind::Frame.id()));
    }

    #[test]
    fn wait_and_evaluate_script_follow_the_cursor() {
        let f = fixture();
        f.bridge.evaluate("return 42");

        let (kind, text): (u16, Option<String>) = f
            .lua
            .load("local k = syms.Wait(50); return k, syms.EvaluateScript()")
            .eval()
            .unwrap();
        assert_eq!(kind, EventKind::Evaluate.id());
        assert_eq!(text.as_deref(), Some("return 42"));

        let (kind, text): (u16, Option<String>) = f
            .lua
            .load("local k = syms.Wait(5); return k, syms.EvaluateScript()")
            .eval()
            .unwrap();
        assert_eq!(kind, EventKind::None.id());
        assert_eq!(text, None);
    }

    #[test]
    fn wait_records_stop_on_the_cursor() {
        let f = fixture();
        f.bridge.signal(Event::Stop);
        let kind: u16 = f.lua.load("return syms.Wait(50)").eval().unwrap();
        assert_eq!(kind, EventKind::Stop.id());
        assert!(f.cursor.lock().unwrap().stop_seen());
    }

    #[test]
    fn frame_hook_lives_in_the_registry() {
        let f = fixture();
        f.lua.load("syms.SetFrameHook(function() ticks = (ticks or 0) + 1 end)").exec().unwrap();

        let hook: Option<Function> = f.lua.named_registry_value(FRAME_HOOK_KEY).unwrap();
        hook.unwrap().call::<()>(()).unwrap();
        let ticks: i64 = f.lua.globals().get("ticks").unwrap();
        assert_eq!(ticks, 1);

        f.lua.load("syms.SetFrameHook(nil)").exec().unwrap();
        let hook: Option<Function> = f.lua.named_registry_value(FRAME_HOOK_KEY).unwrap();
        assert!(hook.is_none());
    }

    #[test]
    fn log_and_alert_pass_through() {
        let f = fixture();
        let answer: bool = f
            .lua
            .load(r#"syms.Log(3, "careful"); return syms.MsgAlert(true, 1, "continue?")"#)
            .eval()
            .unwrap();

        assert!(answer);
        assert_eq!(
            f.host.logs.lock().unwrap().as_slice(),
            &[(LogLevel::Warning, "careful".to_string())]
        );
        assert_eq!(
            f.host.alerts.lock().unwrap().as_slice(),
            &[(true, AlertStyle::Question, "continue?".to_string())]
        );
    }

    #[test]
    fn memory_accessors_route_to_host() {
        let f = fixture();
        f.lua
            .load(
                r#"
                syms.Mem_Write8(0xAB, 0x80000000)
                syms.Mem_Write16(0xBEEF, 0x80000010)
                syms.Mem_Write32(0xDEADBEEF, 0x80000020)
                syms.Mem_Write64(-1, 0x80000030)
                syms.Mem_InvalidateICache(0x80003000, 32, true)
            "#,
            )
            .exec()
            .unwrap();

        assert_eq!(f.host.get(0x8000_0000), 0xAB);
        assert_eq!(f.host.get(0x8000_0010), 0xBEEF);
        assert_eq!(f.host.get(0x8000_0020), 0xDEAD_BEEF);
        assert_eq!(f.host.get(0x8000_0030), u64::MAX);
        assert_eq!(f.host.icache.lock().unwrap().as_slice(), &[(0x8000_3000, 32, true)]);

        let (b, w, d, q, ram): (i64, i64, i64, i64, bool) = f
            .lua
            .load(
                r#"return syms.Mem_Read8(0x80000000), syms.Mem_Read16(0x80000010),
                          syms.Mem_Read32(0x80000020), syms.Mem_Read64(0x80000030),
                          syms.Mem_IsRamAddress(0x80000000)"#,
            )
            .eval()
            .unwrap();
        assert_eq!((b, w, d, q, ram), (0xAB, 0xBEEF, 0xDEAD_BEEF, -1, true));
    }

    #[test]
    fn unknown_codes_fall_back() {
        assert_eq!(LogLevel::from_code(42), LogLevel::Info);
        assert_eq!(AlertStyle::from_code(-1), AlertStyle::Information);
        assert_eq!(LogLevel::Error.as_log_level(), log::Level::Error);
    }
}
