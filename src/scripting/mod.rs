/// `scripting/` - Lua script host
///
/// One dedicated thread owns the Lua VM for its whole life. Host threads
/// talk to it only through the event bridge; script code talks back through
/// the capability export table. Script errors are logged and alerted, never
/// propagated to the threads that triggered them.
pub mod api;
pub mod cursor;
pub mod emulated;
pub mod engine;
mod runtime;
pub mod sandbox;

pub use api::{AlertStyle, Capability, CapabilityExportTable, HostCapabilities, LogLevel};
pub use emulated::EmulatedHost;
pub use engine::{HostState, ScriptHost};
