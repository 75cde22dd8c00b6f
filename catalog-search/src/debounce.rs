//! Trailing-edge debounce for search input.
//!
//! Time is passed in by the host as a [`Duration`] since any fixed epoch
//! (`performance.now()` in a browser, a tokio `Instant` on the server), so the
//! timer never reads a clock itself.

use std::time::Duration;

/// Quiescence window before typed search text is committed.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// A cancellable one-shot timer carrying the value to emit when it fires.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<Pending<T>>,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    value: T,
    deadline: Duration,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Replaces any pending value and restarts the window from `now`.
    pub fn arm(&mut self, value: T, now: Duration) {
        self.pending = Some(Pending {
            value,
            deadline: now + self.window,
        });
    }

    /// Drops the pending value without emitting it.
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|pending| pending.value)
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    /// Emits the pending value once `now` has reached the deadline.
    pub fn poll(&mut self, now: Duration) -> Option<T> {
        match &self.pending {
            Some(pending) if now >= pending.deadline => self.cancel(),
            _ => None,
        }
    }
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}
