//! One-shot completion latch
//!
//! A [`LoadGate`] starts unset and is set exactly once when the load attempt
//! for its document finishes. It never goes back to unset, so anything that
//! has observed it set can rely on the document being published.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct LoadGate {
    set: Mutex<bool>,
    signal: Condvar,
}

impl LoadGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        *self.set.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the gate and wake every waiter. Setting twice is harmless.
    pub fn set(&self) {
        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        *set = true;
        self.signal.notify_all();
    }

    /// Block until the gate is set.
    pub fn wait(&self) {
        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        while !*set {
            set = self.signal.wait(set).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until the gate is set or `timeout` elapses. Returns whether it is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        while !*set {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .signal
                .wait_timeout(set, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            set = guard;
        }
        true
    }
}
