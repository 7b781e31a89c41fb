use super::atomics::{AtomicCell, Ordering};
use super::errors::{LockResult, PoisonError};
use super::mutex::MutexGuard;
use super::parking::{ParkOutcome, ParkingWaitQueue};
use super::poison;
use std::fmt;
use std::time::{Duration, Instant};

/// Whether a bounded condition variable wait ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimeoutResult(bool);

impl WaitTimeoutResult {
    pub fn timed_out(&self) -> bool {
        self.0
    }
}

///
/// Condition variable paired with a [Mutex](super::mutex::Mutex).
///
/// A wake does not mean the awaited condition holds; spurious wakeups are
/// legal. Waits are meant to be written as a loop re-checking a predicate,
/// which is what [Condvar::wait_while] does. A lone [Condvar::wait] outside
/// such a loop is a misuse.
///
/// One condition variable must only ever be used with one mutex at a time.
pub struct Condvar {
    /// Bumped by every notification; waiters park only while it is unchanged.
    seq: AtomicCell<u32>,
    queue: ParkingWaitQueue,
}

impl Condvar {
    pub fn new() -> Self {
        Self {
            seq: AtomicCell::new(0),
            queue: ParkingWaitQueue::new(),
        }
    }

    pub fn notify_one(&self) {
        self.seq.fetch_add(1, Ordering::Relaxed);
        self.queue.unpark_one();
    }

    pub fn notify_all(&self) {
        self.seq.fetch_add(1, Ordering::Relaxed);
        self.queue.unpark_all();
    }

    fn wait_until_internal<'a, T: ?Sized>(
        &self,
        guard: MutexGuard<'a, T>,
        deadline: Option<Instant>,
    ) -> (LockResult<MutexGuard<'a, T>>, bool) {
        // Read under the lock: a notification issued after the caller's
        // predicate check necessarily bumps it.
        let seq = self.seq.load(Ordering::Relaxed);

        let mutex = guard.mutex;
        drop(guard);

        let outcome = self
            .queue
            .park_while(|| self.seq.load(Ordering::Relaxed) == seq, deadline);

        (mutex.lock(), outcome == ParkOutcome::TimedOut)
    }

    ///
    /// Atomically releases the lock, suspends, and re-acquires the lock
    /// before returning. May return without any notification.
    pub fn wait<'a, T: ?Sized>(&self, guard: MutexGuard<'a, T>) -> LockResult<MutexGuard<'a, T>> {
        self.wait_until_internal(guard, None).0
    }

    ///
    /// Blocks while `condition` returns `true`, re-checking it after every
    /// wake with the lock held.
    pub fn wait_while<'a, T, F>(
        &self,
        mut guard: MutexGuard<'a, T>,
        mut condition: F,
    ) -> LockResult<MutexGuard<'a, T>>
    where
        T: ?Sized,
        F: FnMut(&mut T) -> bool,
    {
        let mut poisoned = false;
        while condition(&mut *guard) {
            guard = match self.wait(guard) {
                Ok(guard) => guard,
                Err(err) => {
                    poisoned = true;
                    err.into_inner()
                }
            };
        }

        if poisoned {
            Err(PoisonError::new(guard))
        } else {
            Ok(guard)
        }
    }

    ///
    /// Like [Condvar::wait], giving up after `timeout`.
    pub fn wait_timeout<'a, T: ?Sized>(
        &self,
        guard: MutexGuard<'a, T>,
        timeout: Duration,
    ) -> LockResult<(MutexGuard<'a, T>, WaitTimeoutResult)> {
        let deadline = Instant::now().checked_add(timeout);
        let (result, timed_out) = self.wait_until_internal(guard, deadline);
        poison::map_result(result, |guard| (guard, WaitTimeoutResult(timed_out)))
    }

    ///
    /// Like [Condvar::wait_while], giving up once `timeout` has elapsed. The
    /// result reports a timeout only if the condition still holds.
    pub fn wait_timeout_while<'a, T, F>(
        &self,
        mut guard: MutexGuard<'a, T>,
        timeout: Duration,
        mut condition: F,
    ) -> LockResult<(MutexGuard<'a, T>, WaitTimeoutResult)>
    where
        T: ?Sized,
        F: FnMut(&mut T) -> bool,
    {
        let deadline = Instant::now().checked_add(timeout);
        let mut poisoned = false;

        loop {
            if !condition(&mut *guard) {
                break;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    let res = (guard, WaitTimeoutResult(true));
                    return if poisoned {
                        Err(PoisonError::new(res))
                    } else {
                        Ok(res)
                    };
                }
            }

            let (result, _) = self.wait_until_internal(guard, deadline);
            guard = match result {
                Ok(guard) => guard,
                Err(err) => {
                    poisoned = true;
                    err.into_inner()
                }
            };
        }

        let res = (guard, WaitTimeoutResult(false));
        if poisoned {
            Err(PoisonError::new(res))
        } else {
            Ok(res)
        }
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Condvar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condvar").finish_non_exhaustive()
    }
}
