//! Counting wait with a close operation.
//!
//! A `Semaphore` tracks a non-negative number of permits. `acquire` blocks
//! while the count is zero. `close` wakes every waiter at once and makes all
//! later acquisitions fail, so a shutdown does not need to know how many
//! threads are parked here.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    #[error("semaphore closed")]
    Closed,
    #[error("timed out waiting for a permit")]
    TimedOut,
}

#[derive(Debug)]
struct State {
    permits: usize,
    closed: bool,
}

#[derive(Debug)]
pub struct Semaphore {
    state: Mutex<State>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(State {
                permits,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    // No user code runs under this lock, so a poisoned state is still consistent.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until a permit is taken or the semaphore is closed.
    pub fn acquire(&self) -> Result<(), AcquireError> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(AcquireError::Closed);
            }
            if state.permits > 0 {
                state.permits -= 1;
                return Ok(());
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn acquire_timeout(&self, timeout: Duration) -> Result<(), AcquireError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if state.closed {
                return Err(AcquireError::Closed);
            }
            if state.permits > 0 {
                state.permits -= 1;
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(AcquireError::TimedOut);
            }
            state = self
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    pub fn release(&self) {
        self.release_n(1);
    }

    pub fn release_n(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut state = self.lock();
        state.permits = state.permits.saturating_add(n);
        drop(state);
        if n == 1 {
            self.available.notify_one();
        } else {
            self.available.notify_all();
        }
    }

    /// Wakes all waiters; idempotent.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        drop(state);
        self.available.notify_all();
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn available_permits(&self) -> usize {
        self.lock().permits
    }
}
