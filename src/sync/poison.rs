use super::atomics::{AtomicCell, Ordering};
use super::errors::{LockResult, PoisonError};
use log::*;
use std::thread;

/// Snapshot of a lock's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked,
    /// A holder panicked inside the critical section. Sticky.
    Poisoned,
}

/// Sticky poison marker carried by every poisoning lock.
pub(crate) struct PoisonFlag {
    failed: AtomicCell<bool>,
}

/// Remembers whether the acquiring thread was already unwinding, so that a
/// guard taken during unwinding does not poison on release.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PanicMarker {
    panicking: bool,
}

impl PoisonFlag {
    pub(crate) fn new() -> Self {
        Self {
            failed: AtomicCell::new(false),
        }
    }

    ///
    /// Called on acquisition; wraps the guard into an error if poisoned.
    #[inline]
    pub(crate) fn guard<G>(&self, guard: G) -> LockResult<G> {
        if self.get() {
            Err(PoisonError::new(guard))
        } else {
            Ok(guard)
        }
    }

    #[inline]
    pub(crate) fn marker(&self) -> PanicMarker {
        PanicMarker {
            panicking: thread::panicking(),
        }
    }

    ///
    /// Called on release, before the lock is handed back.
    #[inline]
    pub(crate) fn done(&self, marker: &PanicMarker) {
        if !marker.panicking && thread::panicking() {
            warn!("poison::holder_panicked::{:?}", thread::current().id());
            self.failed.store(true, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn get(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}

///
/// Maps a result over its guard while keeping the poison flag.
pub(crate) fn map_result<T, U, F>(result: LockResult<T>, f: F) -> LockResult<U>
where
    F: FnOnce(T) -> U,
{
    match result {
        Ok(t) => Ok(f(t)),
        Err(err) => Err(PoisonError::new(f(err.into_inner()))),
    }
}
