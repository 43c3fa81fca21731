/// `scripting/cursor.rs` - The event the script thread is working on
///
/// Holds exactly one event at a time. Advancing drops the previous event
/// (and its payload) before pulling the next, so script code can read the
/// current `Evaluate` text without copying it and can never see a stale
/// one.
use std::time::Duration;

use crate::bridge::{Event, EventBridge, EventKind};

#[derive(Debug, Default)]
pub struct EventCursor {
    current: Event,
    stop_seen: bool,
}

impl EventCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, bridge: &EventBridge, timeout: Duration) -> EventKind {
        self.current = Event::None;
        self.current = bridge.wait(timeout);
        let kind = self.current.kind();
        if kind == EventKind::Stop {
            self.stop_seen = true;
        }
        kind
    }

    pub fn kind(&self) -> EventKind {
        self.current.kind()
    }

    pub fn script(&self) -> Option<&str> {
        self.current.script()
    }

    /// Whether `Stop` has been pulled, by the host loop or by script code.
    pub fn stop_seen(&self) -> bool {
        self.stop_seen
    }
}
