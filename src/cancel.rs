//! Cooperative cancellation shared between the UI thread and long-running work
//!
//! Used by the continuous-scroll render (checked once per page) and by the
//! thumbnail worker (checked before each decode and before each delivery).

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Cancellation flag; clones observe the same state.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Clear the flag so the token can be reused for the next operation.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}
