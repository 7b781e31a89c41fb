use super::atomics::{AtomicCell, Ordering};
use super::errors::{LockResult, TryLockError, TryLockResult};
use super::ifaces::LockIface;
use super::parking::{ParkOutcome, ParkingWaitQueue};
use super::poison::{self, LockState, PanicMarker, PoisonFlag};
use log::*;
use parking_lot_core::SpinWait;
use std::cell::UnsafeCell;
use std::fmt;
use std::{
    marker::PhantomData,
    ops::{Deref, DerefMut},
    time::{Duration, Instant},
};

const UNLOCKED: u8 = 0;
const LOCKED: u8 = 1;
/// Locked, and at least one thread may be parked.
const CONTENDED: u8 = 2;

/// Three-state parking mutex without an attached value.
pub struct RawMutex {
    state: AtomicCell<u8>,
    queue: ParkingWaitQueue,
}

impl RawMutex {
    pub fn new() -> Self {
        Self {
            state: AtomicCell::new(UNLOCKED),
            queue: ParkingWaitQueue::new(),
        }
    }

    #[inline]
    fn try_acquire(&self) -> bool {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[cold]
    fn lock_slow(&self, deadline: Option<Instant>) -> bool {
        let mut spinwait = SpinWait::new();
        loop {
            match self.state.load(Ordering::Relaxed) {
                UNLOCKED => {
                    if self.try_acquire() {
                        return true;
                    }
                }
                LOCKED if spinwait.spin() => {}
                _ => break,
            }
        }

        // From here on the state stays CONTENDED while anybody may be parked,
        // so every unlock wakes a waiter.
        loop {
            if self.state.swap(CONTENDED, Ordering::Acquire) == UNLOCKED {
                return true;
            }

            let outcome = self
                .queue
                .park_while(|| self.state.load(Ordering::Relaxed) == CONTENDED, deadline);
            if outcome == ParkOutcome::TimedOut {
                return false;
            }
        }
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl LockIface for RawMutex {
    #[inline]
    fn lock(&self) {
        if !self.try_acquire() {
            self.lock_slow(None);
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        let mut state = self.state.load(Ordering::Relaxed);
        loop {
            if state != UNLOCKED {
                return false;
            }
            match self.state.compare_exchange_weak(
                UNLOCKED,
                LOCKED,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => state = actual,
            }
        }
    }

    #[inline]
    fn try_lock_until(&self, deadline: Instant) -> bool {
        self.try_acquire() || self.lock_slow(Some(deadline))
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != UNLOCKED
    }

    #[inline]
    unsafe fn unlock(&self) {
        if self.state.swap(UNLOCKED, Ordering::Release) == CONTENDED {
            self.queue.unpark_one();
        }
    }
}

impl fmt::Debug for RawMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMutex")
            .field("locked", &self.is_locked())
            .finish()
    }
}

///
/// Mutual exclusion lock protecting a value of type `T`.
///
/// The value is reachable only through a [MutexGuard]. Contended callers are
/// suspended, not spun. A guard dropped while its thread panics poisons the
/// mutex for good: every later acquisition hands its guard back inside a
/// [PoisonError](super::errors::PoisonError).
pub struct Mutex<T: ?Sized> {
    raw: RawMutex,
    poison: PoisonFlag,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    #[inline]
    pub fn new(data: T) -> Self {
        Self {
            raw: RawMutex::new(),
            poison: PoisonFlag::new(),
            data: UnsafeCell::new(data),
        }
    }

    #[inline]
    pub fn into_inner(self) -> LockResult<T> {
        let poisoned = self.poison.get();
        let data = self.data.into_inner();
        if poisoned {
            Err(super::errors::PoisonError::new(data))
        } else {
            Ok(data)
        }
    }
}

impl<T: ?Sized> Mutex<T> {
    ///
    /// # Safety
    ///
    /// The raw lock must be held by the caller.
    #[inline]
    unsafe fn guard(&self) -> LockResult<MutexGuard<'_, T>> {
        let guard = MutexGuard {
            mutex: self,
            marker: self.poison.marker(),
            _not_send: PhantomData,
        };
        self.poison.guard(guard)
    }

    ///
    /// Blocks until the lock is acquired.
    #[inline]
    pub fn lock(&self) -> LockResult<MutexGuard<'_, T>> {
        self.raw.lock();
        // SAFETY: The lock is held, as required.
        unsafe { self.guard() }
    }

    ///
    /// Acquires the lock only if nobody holds it.
    #[inline]
    pub fn try_lock(&self) -> TryLockResult<MutexGuard<'_, T>> {
        if self.raw.try_lock() {
            // SAFETY: The lock is held, as required.
            Ok(unsafe { self.guard() }?)
        } else {
            Err(TryLockError::WouldBlock)
        }
    }

    ///
    /// Blocks for at most `timeout`. A timed out attempt leaves the mutex
    /// untouched.
    pub fn try_lock_for(&self, timeout: Duration) -> TryLockResult<MutexGuard<'_, T>> {
        let acquired = match Instant::now().checked_add(timeout) {
            Some(deadline) => self.raw.try_lock_until(deadline),
            None => {
                self.raw.lock();
                true
            }
        };

        if acquired {
            // SAFETY: The lock is held, as required.
            Ok(unsafe { self.guard() }?)
        } else {
            trace!("mutex::try_lock_for::timed_out::{:?}", timeout);
            Err(TryLockError::WouldBlock)
        }
    }

    ///
    /// Runs `f` with the lock held and releases it on every exit path,
    /// unwinding included.
    pub fn with_lock<R, F>(&self, f: F) -> LockResult<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        poison::map_result(self.lock(), |mut guard| f(&mut *guard))
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.poison.get()
    }

    ///
    /// Racy snapshot of the lock state, for diagnostics.
    pub fn state(&self) -> LockState {
        if self.is_poisoned() {
            LockState::Poisoned
        } else if self.is_locked() {
            LockState::Locked
        } else {
            LockState::Unlocked
        }
    }

    #[inline]
    pub fn get_mut(&mut self) -> LockResult<&mut T> {
        let data = self.data.get_mut();
        self.poison.guard(data)
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Mutex<T> {
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        match self.try_lock() {
            Ok(guard) => d.field("data", &&*guard),
            Err(TryLockError::Poisoned(err)) => d.field("data", &&**err.get_ref()),
            Err(TryLockError::WouldBlock) => d.field("data", &format_args!("<locked>")),
        };
        d.field("poisoned", &self.is_poisoned()).finish()
    }
}

/// Scoped exclusive access to the value of a [Mutex].
///
/// Releasing the guard, by drop or [MutexGuard::unlock], is the only way back
/// to the unlocked state. Guards stay on the thread that acquired them.
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized + 'a> {
    pub(crate) mutex: &'a Mutex<T>,
    marker: PanicMarker,
    _not_send: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync> Sync for MutexGuard<'_, T> {}

impl<'a, T: ?Sized + 'a> MutexGuard<'a, T> {
    ///
    /// Explicitly releases the lock.
    #[inline]
    pub fn unlock(guard: Self) {
        drop(guard);
    }
}

impl<'a, T: ?Sized + 'a> Deref for MutexGuard<'a, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: The guard exists only while the lock is held.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, T: ?Sized + 'a> DerefMut for MutexGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The guard exists only while the lock is held.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, T: ?Sized + 'a> Drop for MutexGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.mutex.poison.done(&self.marker);
        // SAFETY: The guard proves the lock is held.
        unsafe { self.mutex.raw.unlock() };
    }
}

impl<'a, T: fmt::Debug + ?Sized + 'a> fmt::Debug for MutexGuard<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<'a, T: fmt::Display + ?Sized + 'a> fmt::Display for MutexGuard<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}
