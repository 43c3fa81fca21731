/// `bridge/` - Cross-thread event bridge
///
/// Producers on any host thread call `signal`; the single script thread
/// calls `wait`. The mask is checked before any locking so that kinds the
/// script has not subscribed to never reach the queue.
pub mod event;
pub mod mask;
pub mod queue;

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

pub use event::{Event, EventKind, MAX_EVENT_KINDS};
pub use mask::EventMask;
pub use queue::EventQueue;

/// Mask + queue façade shared between producers and the script thread.
pub struct EventBridge {
    mask: EventMask,
    queue: EventQueue,
    /// False while no consumer thread is alive; signals are dropped.
    accepting: AtomicBool,
}

impl EventBridge {
    /// A bridge with the default mask that accepts events immediately.
    pub fn new() -> Self {
        Self {
            mask: EventMask::new(),
            queue: EventQueue::new(),
            accepting: AtomicBool::new(true),
        }
    }

    /// A bridge that drops signals until `open` is called.
    pub fn closed() -> Self {
        let bridge = Self::new();
        bridge.close();
        bridge
    }

    // ── Producer side ─────────────────────────────────────────────────────

    /// Queue `event` if its kind is enabled. `Stop` is never filtered.
    pub fn signal(&self, event: Event) {
        let kind = event.kind();
        if kind == EventKind::None || !self.mask.is_enabled(kind.id()) {
            return;
        }
        if !self.is_accepting() {
            log::trace!("Dropping {kind} event: no script thread");
            return;
        }
        self.queue.push(event);
    }

    /// Build and queue an event only if `kind` is enabled, so a disabled
    /// kind never pays for its payload.
    pub fn signal_with<F>(&self, kind: EventKind, make_event: F)
    where
        F: FnOnce() -> Event,
    {
        if self.mask.is_enabled(kind.id()) {
            self.signal(make_event());
        }
    }

    /// Untyped entry point. Unknown ids are ignored, as is an `Evaluate`
    /// without script text.
    pub fn signal_kind(&self, id: u16, payload: Option<String>) {
        let Some(kind) = EventKind::from_id(id) else {
            return;
        };
        match kind {
            EventKind::Stop => self.signal(Event::Stop),
            EventKind::Frame => self.signal_with(kind, || Event::Frame),
            EventKind::Evaluate => match payload {
                Some(script) => self.signal_with(kind, || Event::Evaluate { script }),
                None => log::debug!("Ignoring evaluate signal without script text"),
            },
            EventKind::None => {}
        }
    }

    pub fn evaluate(&self, script: &str) {
        self.signal_with(EventKind::Evaluate, || Event::evaluate(script));
    }

    pub fn post_frame(&self) {
        self.signal_with(EventKind::Frame, || Event::Frame);
    }

    // ── Consumer side ─────────────────────────────────────────────────────

    /// Next event in FIFO order, or `Event::None` once `timeout` passes
    /// with nothing queued. Only the script thread may call this.
    pub fn wait(&self, timeout: Duration) -> Event {
        self.queue.pop_timeout(timeout).unwrap_or_default()
    }

    // ── Mask ──────────────────────────────────────────────────────────────

    pub fn enable(&self, id: u16) {
        self.mask.enable(id);
    }

    pub fn disable(&self, id: u16) {
        self.mask.disable(id);
    }

    pub fn is_enabled(&self, id: u16) -> bool {
        self.mask.is_enabled(id)
    }

    pub fn mask(&self) -> &EventMask {
        &self.mask
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drop queued events and restore the default mask.
    pub fn reset(&self) {
        self.queue.clear();
        self.mask.reset();
    }

    pub fn open(&self) {
        self.accepting.store(true, Ordering::Release);
    }

    pub fn close(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}
