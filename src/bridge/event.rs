/// `bridge/event.rs` - Event kinds and the events that carry them
///
/// Every kind has a fixed numeric id shared with script code (scripts pass
/// these ids to `AddEventMask` / `RemoveEventMask` and receive them from
/// `Wait`). `None` is the sentinel returned on timeout; its id is the first
/// id outside the mask.
use std::fmt;

/// Number of distinct kind ids the mask can hold.
pub const MAX_EVENT_KINDS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventKind {
    Stop = 0,
    Evaluate = 1,
    Frame = 2,
    None = MAX_EVENT_KINDS as u16,
}

impl EventKind {
    pub const fn id(self) -> u16 {
        self as u16
    }

    /// Resolve a raw id to a real kind. The sentinel is not a real kind.
    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0 => Some(Self::Stop),
            1 => Some(Self::Evaluate),
            2 => Some(Self::Frame),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Evaluate => "evaluate",
            Self::Frame => "frame",
            Self::None => "none",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event travelling from a producer to the script thread.
///
/// Not `Clone`: the `Evaluate` payload belongs to exactly one event and is
/// freed when the consumer moves on to the next one.
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    /// Timeout sentinel, never queued.
    None,
    Stop,
    Evaluate { script: String },
    Frame,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::None => EventKind::None,
            Event::Stop => EventKind::Stop,
            Event::Evaluate { .. } => EventKind::Evaluate,
            Event::Frame => EventKind::Frame,
        }
    }

    pub fn evaluate(script: impl Into<String>) -> Self {
        Event::Evaluate { script: script.into() }
    }

    /// Script text carried by an `Evaluate` event.
    pub fn script(&self) -> Option<&str> {
        match self {
            Event::Evaluate { script } => Some(script.as_str()),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Event::None)
    }
}

impl Default for Event {
    fn default() -> Self {
        Event::None
    }
}
