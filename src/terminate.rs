use std::sync::atomic::{AtomicBool, Ordering};

/// A polled cancellation signal.
pub trait HasTerminate: Send + Sync {
    fn is_terminated(&self) -> bool;
}

/// Termination flag shared by everything working on behalf of one search.
#[derive(Debug, Default)]
pub struct Terminator {
    terminated: AtomicBool,
}

impl Terminator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Returns `true` only for the call that raised it.
    pub fn terminate(&self) -> bool {
        !self.terminated.swap(true, Ordering::SeqCst)
    }
}

impl HasTerminate for Terminator {
    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

/// A signal that is never raised.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverTerminate;

impl HasTerminate for NeverTerminate {
    fn is_terminated(&self) -> bool {
        false
    }
}
