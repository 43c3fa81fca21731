/// `bridge/mask.rs` - Lock-free subscription mask
///
/// One bit per event kind id, stored in eight 32-bit atomic words. Producers
/// read it before touching the queue so a kind nobody listens to costs a
/// single relaxed load. A signal racing a mask change may be dropped or
/// delivered; both outcomes are fine.
use std::sync::atomic::{AtomicU32, Ordering};

use super::event::{EventKind, MAX_EVENT_KINDS};

const WORD_BITS: usize = 32;
const WORDS: usize = MAX_EVENT_KINDS / WORD_BITS;

pub struct EventMask {
    words: [AtomicU32; WORDS],
}

impl EventMask {
    /// Mask with only the mandatory defaults (`Stop`, `Evaluate`) set.
    pub fn new() -> Self {
        let mask = Self {
            words: std::array::from_fn(|_| AtomicU32::new(0)),
        };
        mask.reset();
        mask
    }

    /// Clear every kind, then re-enable the defaults.
    pub fn reset(&self) {
        for word in &self.words {
            word.store(0, Ordering::Relaxed);
        }
        self.enable(EventKind::Stop.id());
        self.enable(EventKind::Evaluate.id());
    }

    pub fn enable(&self, id: u16) {
        if let Some((word, bit)) = slot(id) {
            self.words[word].fetch_or(bit, Ordering::Relaxed);
        }
    }

    /// `Stop` cannot be disabled.
    pub fn disable(&self, id: u16) {
        if id == EventKind::Stop.id() {
            return;
        }
        if let Some((word, bit)) = slot(id) {
            self.words[word].fetch_and(!bit, Ordering::Relaxed);
        }
    }

    pub fn is_enabled(&self, id: u16) -> bool {
        if id == EventKind::Stop.id() {
            return true;
        }
        match slot(id) {
            Some((word, bit)) => self.words[word].load(Ordering::Relaxed) & bit != 0,
            None => false,
        }
    }

    /// Ids currently enabled, ascending.
    pub fn enabled_ids(&self) -> Vec<u16> {
        (0..MAX_EVENT_KINDS as u16)
            .filter(|&id| self.is_enabled(id))
            .collect()
    }
}

impl Default for EventMask {
    fn default() -> Self {
        Self::new()
    }
}

fn slot(id: u16) -> Option<(usize, u32)> {
    let id = id as usize;
    if id >= MAX_EVENT_KINDS {
        return None;
    }
    Some((id / WORD_BITS, 1u32 << (id % WORD_BITS)))
}
