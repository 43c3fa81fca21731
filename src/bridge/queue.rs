/// `bridge/queue.rs` - Pending event FIFO
///
/// A `VecDeque` behind a mutex plus a condition variable. Producers hold the
/// lock only for the append; the single consumer blocks on the condvar with
/// a timeout. The queue is unbounded, producers never wait for space.
use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use super::event::Event;

pub struct EventQueue {
    pending: Mutex<VecDeque<Event>>,
    ready: Condvar,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    /// Append to the tail and wake one waiter.
    pub fn push(&self, event: Event) {
        self.lock().push_back(event);
        self.ready.notify_one();
    }

    /// Pop the head, blocking up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Event> {
        let guard = self.lock();
        let (mut guard, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |q| q.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        guard.pop_front()
    }

    pub fn try_pop(&self) -> Option<Event> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panic while holding the lock cannot leave the deque half-updated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Event>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
