//! Deadline bookkeeping for the reset watchdog.
//!
//! A single deadline is armed when a sequence opens and disarmed when it
//! completes. Repeated edges on an open sequence do not push the deadline
//! back, so a sequence never stays open longer than one window.
use std::time::{Duration, Instant};

/// Reference window, long enough for a brisk manual turn.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(50);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Wait {
    /// Nothing armed, sleep until woken
    Idle,
    /// Armed, sleep at most this long
    For(Duration),
    /// The deadline passed
    Expired,
}

#[derive(Debug, Clone)]
pub(crate) struct Watchdog {
    window: Duration,
    deadline: Option<Instant>,
}

impl Watchdog {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub(crate) fn window(&self) -> Duration {
        self.window
    }

    /// Takes effect the next time the watchdog is armed.
    pub(crate) fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    pub(crate) fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub(crate) fn disarm(&mut self) {
        self.deadline = None;
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub(crate) fn poll(&self, now: Instant) -> Wait {
        match self.deadline {
            None => Wait::Idle,
            Some(deadline) if deadline <= now => Wait::Expired,
            Some(deadline) => Wait::For(deadline - now),
        }
    }
}
