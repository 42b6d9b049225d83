//! Drain barrier
//!
//! Shared/exclusive permit pair wrapped around every request. Requests hold
//! a shared permit while they run; shutdown takes the exclusive side, which
//! waits for in-flight requests and keeps new ones from starting.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct BarrierState {
    /// Shared permits currently held
    in_flight: usize,

    /// Set once shutdown begins; never cleared
    draining: bool,
}

/// Outcome of [`DrainBarrier::drain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight request finished
    Drained,

    /// The deadline passed with requests still running
    TimedOut { in_flight: usize },
}

#[derive(Default)]
pub struct DrainBarrier {
    state: Mutex<BarrierState>,
    changed: Condvar,
}

impl DrainBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a shared permit. Blocks forever once draining has started.
    pub fn enter(&self) -> InFlight<'_> {
        let mut state = self.state.lock();
        while state.draining {
            self.changed.wait(&mut state);
        }
        state.in_flight += 1;
        InFlight { barrier: self }
    }

    /// Take a shared permit unless draining has started
    pub fn try_enter(&self) -> Option<InFlight<'_>> {
        let mut state = self.state.lock();
        if state.draining {
            return None;
        }
        state.in_flight += 1;
        Some(InFlight { barrier: self })
    }

    /// Take the exclusive side: stop admitting requests and wait up to
    /// `timeout` for the running ones.
    pub fn drain(&self, timeout: Duration) -> DrainOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        state.draining = true;

        while state.in_flight > 0 {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }

        match state.in_flight {
            0 => DrainOutcome::Drained,
            in_flight => DrainOutcome::TimedOut { in_flight },
        }
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    pub fn is_draining(&self) -> bool {
        self.state.lock().draining
    }

    fn leave(&self) {
        let mut state = self.state.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 {
            self.changed.notify_all();
        }
    }
}

/// A shared permit; released on drop
pub struct InFlight<'a> {
    barrier: &'a DrainBarrier,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.barrier.leave();
    }
}
