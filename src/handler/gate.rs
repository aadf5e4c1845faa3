use std::sync::atomic::{AtomicBool, Ordering};

/// Admits at most one merging thread at a time.
#[derive(Debug, Default)]
pub struct MergeGate {
    merging: AtomicBool,
}

impl MergeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to start merging (returns guard if successful)
    pub fn try_acquire(&self) -> Option<MergeGuard<'_>> {
        if self
            .merging
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Some(MergeGuard { gate: self })
        } else {
            None
        }
    }

    pub fn is_held(&self) -> bool {
        self.merging.load(Ordering::SeqCst)
    }
}

/// RAII guard for a merge; releases the gate on drop, including on unwind.
pub struct MergeGuard<'a> {
    gate: &'a MergeGate,
}

impl Drop for MergeGuard<'_> {
    fn drop(&mut self) {
        self.gate.merging.store(false, Ordering::SeqCst);
    }
}
