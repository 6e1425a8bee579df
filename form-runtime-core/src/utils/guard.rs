//! Re-entrancy guard for synchronous fan-out and cascade paths

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// State of one guarded operation class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    InProgress,
}

/// Breaks synchronous call cycles: while a scope is held, further `try_enter` calls fail.
///
/// Clones share state, so a guard can be copied out of the structure it lives in before
/// that structure is borrowed mutably.
#[derive(Debug, Clone, Default)]
pub struct ReentrancyGuard {
    busy: Arc<AtomicBool>,
}

impl ReentrancyGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GuardState {
        if self.busy.load(Ordering::Acquire) {
            GuardState::InProgress
        } else {
            GuardState::Idle
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state() == GuardState::Idle
    }

    /// Enter the guarded section; `None` if it is already in progress
    pub fn try_enter(&self) -> Option<GuardScope> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GuardScope {
                busy: Arc::clone(&self.busy),
            })
    }
}

/// Held while a guarded section runs; dropping it resets the guard to `Idle`
#[must_use = "the guard resets as soon as the scope is dropped"]
#[derive(Debug)]
pub struct GuardScope {
    busy: Arc<AtomicBool>,
}

impl Drop for GuardScope {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
