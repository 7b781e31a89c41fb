use super::condvar::Condvar;
use super::errors::{PoisonError, TimedOut};
use super::mutex::{Mutex, MutexGuard};
use std::fmt;
use std::time::Duration;

///
/// Counting semaphore.
///
/// Permits are not owned: [Semaphore::release] may be called by a different
/// thread than the one that acquired. A semaphore created with one permit is
/// a non-reentrant alternative to a mutex.
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    #[inline]
    fn permits(&self) -> MutexGuard<'_, usize> {
        // Only integer arithmetic runs under this lock.
        self.permits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    ///
    /// Takes a permit, blocking while none is available.
    pub fn acquire(&self) {
        let mut permits = self
            .available
            .wait_while(self.permits(), |permits| *permits == 0)
            .unwrap_or_else(PoisonError::into_inner);
        *permits -= 1;
    }

    ///
    /// Takes a permit only if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits();
        if *permits == 0 {
            false
        } else {
            *permits -= 1;
            true
        }
    }

    ///
    /// Blocks for at most `timeout`. On timeout the permit count is left
    /// untouched.
    pub fn try_acquire_for(&self, timeout: Duration) -> Result<(), TimedOut> {
        let (mut permits, result) = self
            .available
            .wait_timeout_while(self.permits(), timeout, |permits| *permits == 0)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() {
            return Err(TimedOut);
        }
        *permits -= 1;
        Ok(())
    }

    ///
    /// Returns a permit and wakes one blocked acquirer.
    pub fn release(&self) {
        self.release_many(1);
    }

    pub fn release_many(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut permits = self.permits();
        *permits = permits
            .checked_add(n)
            .unwrap_or_else(|| panic!("semaphore permit count overflow"));
        drop(permits);

        if n == 1 {
            self.available.notify_one();
        } else {
            self.available.notify_all();
        }
    }

    ///
    /// Acquires a permit returned automatically when the guard drops.
    pub fn access(&self) -> SemaphorePermit<'_> {
        self.acquire();
        SemaphorePermit { semaphore: self }
    }

    pub fn try_access(&self) -> Option<SemaphorePermit<'_>> {
        if self.try_acquire() {
            Some(SemaphorePermit { semaphore: self })
        } else {
            None
        }
    }

    pub fn available_permits(&self) -> usize {
        *self.permits()
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("permits", &self.available_permits())
            .finish()
    }
}

/// Scoped permit of a [Semaphore].
#[must_use = "if unused the permit is immediately released"]
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
}

impl SemaphorePermit<'_> {
    ///
    /// Consumes the permit without returning it to the semaphore.
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

impl fmt::Debug for SemaphorePermit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemaphorePermit").finish_non_exhaustive()
    }
}
