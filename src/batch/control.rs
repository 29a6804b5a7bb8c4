//! Cooperative stop signal for runs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared continue signal polled by the dispatcher at batch boundaries.
///
/// Stopping never interrupts a batch already in flight.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    stopped: Arc<AtomicBool>,
}

impl RunControl {
    /// A control that has not been stopped
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop before its next batch
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Allow a stopped control to be reused for another run
    pub fn reset(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let control = RunControl::new();
        let handle = control.clone();
        assert!(!control.is_stopped());

        handle.stop();
        assert!(control.is_stopped());

        control.reset();
        assert!(!handle.is_stopped());
    }
}
