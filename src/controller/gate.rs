//! # Gate: capacity-capped counting semaphore.
//!
//! Used purely as a binary rendezvous signal between the dispatcher and the
//! stepper. Built on [`tokio::sync::Semaphore`]:
//! - `acquire()` waits for a permit and consumes it (the permit is forgotten,
//!   not returned on drop);
//! - `release()` adds one permit **unless the gate is already at capacity**; it
//!   never errors and never accumulates beyond the cap;
//! - `try_acquire()` consumes a permit only if one is available;
//! - `close()` wakes all waiters; every later `acquire()` fails with [`GateClosed`].
//!
//! ```text
//!   capacity = 1
//!
//!   release ─► [ 0 → 1 ]   release ─► [ 1 → 1 ] (no-op)
//!   acquire ─► [ 1 → 0 ]   acquire ─► waits until the next release
//! ```

use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::Semaphore;

/// Returned by [`Gate::acquire`] once the gate has been closed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("gate closed")]
pub struct GateClosed;

/// Capacity-capped counting semaphore.
#[derive(Debug)]
pub struct Gate {
    permits: Semaphore,
    capacity: usize,
    // Serializes the check-then-add in `release`.
    release_lock: Mutex<()>,
}

impl Gate {
    /// Creates a gate holding `capacity` permits (full).
    pub fn new(capacity: usize) -> Self {
        Self::with_permits(capacity, capacity)
    }

    /// Creates a gate with `capacity` and `initial` available permits
    /// (`initial` is clamped to `capacity`, `capacity` to at least 1).
    pub fn with_permits(capacity: usize, initial: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Semaphore::new(initial.min(capacity)),
            capacity,
            release_lock: Mutex::new(()),
        }
    }

    /// Waits until a permit is available, then consumes it.
    pub async fn acquire(&self) -> Result<(), GateClosed> {
        let permit = self.permits.acquire().await.map_err(|_| GateClosed)?;
        permit.forget();
        Ok(())
    }

    /// Consumes a permit if one is available, without waiting.
    pub fn try_acquire(&self) -> bool {
        match self.permits.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Makes one permit available, capped at the gate capacity.
    pub fn release(&self) {
        let _guard = self
            .release_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.permits.available_permits() < self.capacity {
            self.permits.add_permits(1);
        }
    }

    /// Closes the gate, waking every pending `acquire()` with [`GateClosed`].
    pub fn close(&self) {
        self.permits.close();
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Number of permits currently available.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
