use super::condvar::Condvar;
use super::errors::PoisonError;
use super::mutex::{Mutex, MutexGuard};
use log::*;
use std::fmt;
use std::time::Duration;

///
/// Single-use countdown latch.
///
/// Opens for good when the count reaches zero. Unlike a
/// [Barrier](super::barrier::Barrier) it never resets, and a thread calling
/// [CountDownLatch::wait] after it opened returns at once.
pub struct CountDownLatch {
    count: Mutex<usize>,
    opened: Condvar,
}

impl CountDownLatch {
    pub fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            opened: Condvar::new(),
        }
    }

    #[inline]
    fn count_guard(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    ///
    /// Decrements the count, opening the latch when it hits zero. Counting
    /// down an open latch does nothing.
    pub fn count_down(&self) {
        let mut count = self.count_guard();
        match *count {
            0 => warn!("latch::count_down::already_open"),
            1 => {
                *count = 0;
                drop(count);
                debug!("latch::opened");
                self.opened.notify_all();
            }
            _ => *count -= 1,
        }
    }

    pub fn count(&self) -> usize {
        *self.count_guard()
    }

    ///
    /// Whether the latch is open, without blocking.
    pub fn try_wait(&self) -> bool {
        self.count() == 0
    }

    ///
    /// Blocks until the count reaches zero.
    pub fn wait(&self) {
        let _count = self
            .opened
            .wait_while(self.count_guard(), |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    ///
    /// Blocks for at most `timeout`. Returns whether the latch is open.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (_count, result) = self
            .opened
            .wait_timeout_while(self.count_guard(), timeout, |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
        !result.timed_out()
    }

    ///
    /// Counts down once, then waits for the latch to open.
    pub fn arrive_and_wait(&self) {
        self.count_down();
        self.wait();
    }
}

impl fmt::Debug for CountDownLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountDownLatch")
            .field("count", &self.count())
            .finish()
    }
}
