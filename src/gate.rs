//! Single-flight admission gate
//!
//! One pipeline execution is admitted at a time, process-wide. A second
//! request while the gate is held is rejected immediately (non-blocking
//! attempt), never queued. The permit releases on drop, so every exit path
//! out of the pipeline, including panics, returns the gate to idle.

use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide single-permit gate with non-blocking acquire
#[derive(Debug, Default)]
pub struct SearchGate {
    busy: AtomicBool,
}

impl SearchGate {
    pub fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Attempt to acquire the single permit.
    ///
    /// Returns `None` when another pipeline run is in flight. The permit is
    /// released when the returned guard drops.
    pub fn try_acquire(&self) -> Option<GatePermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| GatePermit { gate: self })
    }

    /// Whether a pipeline run currently holds the permit
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// RAII permit for one admitted pipeline run
#[derive(Debug)]
pub struct GatePermit<'a> {
    gate: &'a SearchGate,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_rejected_while_held() {
        let gate = SearchGate::new();
        let permit = gate.try_acquire();
        assert!(permit.is_some());
        assert!(gate.try_acquire().is_none());
        assert!(gate.is_busy());
    }

    #[test]
    fn test_permit_released_on_drop() {
        let gate = SearchGate::new();
        {
            let _permit = gate.try_acquire().unwrap();
            assert!(gate.is_busy());
        }
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_permit_released_on_panic() {
        let gate = SearchGate::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _permit = gate.try_acquire().unwrap();
            panic!("pipeline failure");
        }));
        assert!(result.is_err());
        assert!(!gate.is_busy(), "unwinding must release the permit");
    }
}
