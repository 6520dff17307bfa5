//! Deadline state machine for the reconnect delay and the invalidation debounce
//!
//! Both timers behave the same way: scheduling while pending replaces the
//! old deadline, so at most one firing is ever outstanding.

use std::time::Duration;

use tokio::time::Instant;

/// Timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Debounce {
    Idle,
    Pending { deadline: Instant },
}

/// Trailing-edge debouncer driven by an external clock
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    state: Debounce,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Debounce::Idle,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn state(&self) -> Debounce {
        self.state
    }

    /// (Re)arm the timer `window` after `now`
    pub fn trigger(&mut self, now: Instant) {
        self.state = Debounce::Pending {
            deadline: now + self.window,
        };
    }

    /// Disarm; returns whether a firing was pending
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.is_pending();
        self.state = Debounce::Idle;
        was_pending
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, Debounce::Pending { .. })
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            Debounce::Pending { deadline } => Some(deadline),
            Debounce::Idle => None,
        }
    }

    /// Fire if the deadline has passed. Returns true exactly once per arming.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            Debounce::Pending { deadline } if now >= deadline => {
                self.state = Debounce::Idle;
                true
            }
            _ => false,
        }
    }
}
