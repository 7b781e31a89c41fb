use super::atomics::{AtomicCell, Ordering};
use std::fmt;
use std::sync::atomic;

/// Count of live handles to a shared resource.
///
/// Follows the `Arc` discipline: relaxed increments made from an existing
/// handle, release decrements, and an acquire fence before tearing down.
pub struct RefCount {
    count: AtomicCell<usize>,
}

impl RefCount {
    ///
    /// Starts with one live handle.
    pub fn new() -> Self {
        Self {
            count: AtomicCell::new(1),
        }
    }

    ///
    /// Registers a new handle cloned from a live one.
    ///
    /// Panics if the count was zero: a torn down resource is never revived.
    #[inline]
    pub fn acquire(&self) {
        let prev = self.count.fetch_add(1, Ordering::Relaxed);
        if prev == 0 || prev > isize::MAX as usize {
            panic!("reference count resurrected or overflowed ({})", prev);
        }
    }

    ///
    /// Drops one handle. Returns `true` for the last one, after which the
    /// caller owns the teardown and sees every write made through the other
    /// handles.
    #[inline]
    pub fn release(&self) -> bool {
        let prev = self.count.fetch_sub(1, Ordering::Release);
        assert!(prev > 0, "reference count released below zero");
        if prev == 1 {
            atomic::fence(Ordering::Acquire);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn get(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefCount").field(&self.get()).finish()
    }
}
