use super::atomics::{AtomicCell, Ordering};
use super::constants::{SPIN_TEST_ROUNDS, SPIN_YIELD_EVERY};
use super::ifaces::LockIface;
use std::fmt;
use std::{cell::UnsafeCell, hint};
use std::{
    marker::PhantomData as marker,
    ops::{Deref, DerefMut},
    time::{Duration, Instant},
};

pub struct SpinLockGuard<'a, T: ?Sized> {
    lock: &'a SpinLock<T>,
    marker: marker<(&'a mut T, *const ())>,
}

unsafe impl<T: ?Sized + Sync> Sync for SpinLockGuard<'_, T> {}

impl<'a, T: ?Sized + 'a> SpinLockGuard<'a, T> {
    ///
    /// Explicitly releases the lock.
    #[inline]
    pub fn unlock(guard: Self) {
        drop(guard);
    }
}

impl<'a, T: ?Sized + 'a> Deref for SpinLockGuard<'a, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T: ?Sized + 'a> DerefMut for SpinLockGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T: ?Sized + 'a> Drop for SpinLockGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: The guard proves the lock is held.
        unsafe { <SpinLock<T> as LockIface>::unlock(self.lock) };
    }
}

impl<'a, T: fmt::Debug + ?Sized + 'a> fmt::Debug for SpinLockGuard<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<'a, T: fmt::Display + ?Sized + 'a> fmt::Display for SpinLockGuard<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

///
/// Test-and-test-and-set spin lock.
///
/// Never suspends: a contended caller burns CPU until the holder releases.
/// Only worth it for critical sections shorter than a park/unpark round
/// trip. Holding it across anything that blocks (I/O, another lock, a
/// channel receive) stalls every contender for as long; nothing detects it.
pub struct SpinLock<T>
where
    T: ?Sized,
{
    acquired: AtomicCell<bool>,
    data: UnsafeCell<T>,
}

impl<T> SpinLock<T> {
    #[inline]
    pub fn new(data: T) -> Self {
        Self {
            acquired: AtomicCell::new(false),
            data: UnsafeCell::new(data),
        }
    }

    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> SpinLock<T> {
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    #[inline]
    unsafe fn guard(&self) -> SpinLockGuard<'_, T> {
        SpinLockGuard { lock: self, marker }
    }

    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        <Self as LockIface>::lock(self);
        // SAFETY: The lock is held, as required.
        unsafe { self.guard() }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        if <Self as LockIface>::try_lock(self) {
            // SAFETY: The lock is held, as required.
            Some(unsafe { self.guard() })
        } else {
            None
        }
    }

    ///
    /// Spins for at most `timeout`, yielding the core now and then.
    #[inline]
    pub fn try_lock_for(&self, timeout: Duration) -> Option<SpinLockGuard<'_, T>> {
        let acquired = match Instant::now().checked_add(timeout) {
            Some(deadline) => <Self as LockIface>::try_lock_until(self, deadline),
            None => {
                <Self as LockIface>::lock(self);
                true
            }
        };
        if acquired {
            // SAFETY: The lock is held, as required.
            Some(unsafe { self.guard() })
        } else {
            None
        }
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        <Self as LockIface>::is_locked(self)
    }

    ///
    /// # Safety
    ///
    /// Only sound when the lock was acquired and its guard forgotten.
    #[inline]
    pub unsafe fn force_unlock(&self) {
        <Self as LockIface>::unlock(self);
    }
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

unsafe impl<T> LockIface for SpinLock<T>
where
    T: ?Sized,
{
    #[inline]
    fn lock(&self) {
        'lock: loop {
            // Test with plain loads so waiters share the cache line instead
            // of bouncing it with failed exchanges.
            let mut rounds = 0;
            while rounds < SPIN_TEST_ROUNDS && self.acquired.load(Ordering::Relaxed) {
                hint::spin_loop();
                rounds += 1;
            }
            if self
                .acquired
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                break 'lock;
            }
        }
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.acquired
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn try_lock_until(&self, deadline: Instant) -> bool {
        let mut attempts = 0_u32;
        loop {
            if !self.acquired.load(Ordering::Relaxed) && <Self as LockIface>::try_lock(self) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            attempts = attempts.wrapping_add(1);
            if attempts % SPIN_YIELD_EVERY == 0 {
                std::thread::yield_now();
            } else {
                hint::spin_loop();
            }
        }
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.acquired.load(Ordering::Relaxed)
    }

    #[inline]
    unsafe fn unlock(&self) {
        self.acquired.store(false, Ordering::Release);
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("SpinLock").field("data", &&*guard).finish(),
            None => f
                .debug_struct("SpinLock")
                .field("data", &format_args!("<locked>"))
                .finish(),
        }
    }
}

#[cfg(test)]
mod test_spin_lock {
    use super::*;
    use std::thread;

    #[test]
    fn spin_lock_create_and_lock() {
        let lock = SpinLock::new(42);
        let data = lock.try_lock();
        assert!(data.is_some());
        assert_eq!(*data.unwrap(), 42);
    }

    #[test]
    fn mutual_exclusion() {
        let lock = SpinLock::new(1);
        let data = lock.try_lock();

        assert!(data.is_some());

        assert!(lock.try_lock().is_none());
        assert!(lock.try_lock().is_none());

        core::mem::drop(data);

        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn three_locks() {
        let lock1 = SpinLock::new(1);
        let lock2 = SpinLock::new(2);
        let lock3 = SpinLock::new(3);

        let data1 = lock1.try_lock();
        let data2 = lock2.try_lock();
        let data3 = lock3.try_lock();

        assert!(data1.is_some());
        assert!(data2.is_some());
        assert!(data3.is_some());

        assert!(lock1.try_lock().is_none());
        assert!(lock2.try_lock().is_none());
        assert!(lock3.try_lock().is_none());

        SpinLockGuard::unlock(data3.unwrap());

        assert!(lock3.try_lock().is_some());
    }

    #[test]
    fn try_lock_for_gives_up() {
        let lock = SpinLock::new(());
        let _held = lock.lock();
        let start = Instant::now();
        assert!(lock.try_lock_for(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn try_lock_for_acquires_free_lock() {
        let lock = SpinLock::new(5);
        let guard = lock.try_lock_for(Duration::from_millis(10)).unwrap();
        assert!(lock.is_locked());
        assert!(lock.try_lock().is_none());
        assert_eq!(*guard, 5);
        drop(guard);
        assert!(!lock.is_locked());
    }

    #[test]
    fn force_unlock_after_forget() {
        let lock = SpinLock::new(0);
        std::mem::forget(lock.lock());
        assert!(lock.is_locked());
        unsafe { lock.force_unlock() };
        assert!(!lock.is_locked());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn contended_counter() {
        let counter = SpinLock::new(0_usize);
        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..10_000 {
                        *counter.lock() += 1;
                    }
                });
            }
        });
        assert_eq!(counter.into_inner(), 40_000);
    }
}
