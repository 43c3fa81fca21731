pub mod bridge;
pub mod config;
pub mod error;
pub mod scripting;

pub use bridge::{Event, EventBridge, EventKind};
pub use config::HostConfig;
pub use error::HostError;
pub use scripting::{EmulatedHost, HostCapabilities, HostState, ScriptHost};
