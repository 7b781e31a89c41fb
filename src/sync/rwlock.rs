use super::atomics::{AtomicCell, Ordering};
use super::constants::{MAX_READERS, ONE_READER, WRITER_ACTIVE};
use super::errors::{LockResult, PoisonError, TryLockError, TryLockResult};
use super::ifaces::RwLockIface;
use super::parking::{ParkOutcome, ParkingWaitQueue};
use super::poison::{LockState, PanicMarker, PoisonFlag};
use log::*;
use std::cell::UnsafeCell;
use std::fmt;
use std::{
    marker::PhantomData,
    ops::{Deref, DerefMut},
    time::{Duration, Instant},
};

/// Writer-priority reader/writer lock without an attached value.
///
/// The state word holds the reader count above bit 0 and the
/// writer-active flag in bit 0. Once any writer is waiting, new readers
/// block until it has had its turn, so a steady stream of readers cannot
/// starve writers.
pub struct RawRwLock {
    state: AtomicCell<usize>,
    writers_waiting: AtomicCell<usize>,
    readers: ParkingWaitQueue,
    writers: ParkingWaitQueue,
}

impl RawRwLock {
    pub fn new() -> Self {
        Self {
            state: AtomicCell::new(0),
            writers_waiting: AtomicCell::new(0),
            readers: ParkingWaitQueue::new(),
            writers: ParkingWaitQueue::new(),
        }
    }

    #[inline]
    fn reader_admissible(&self, state: usize) -> bool {
        state & WRITER_ACTIVE == 0 && self.writers_waiting.load(Ordering::Relaxed) == 0
    }

    fn lock_shared_internal(&self, deadline: Option<Instant>) -> bool {
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if self.reader_admissible(state) {
                assert!(state >> 1 < MAX_READERS, "too many readers");
                if self
                    .state
                    .compare_exchange_weak(
                        state,
                        state + ONE_READER,
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    return true;
                }
                continue;
            }

            let outcome = self.readers.park_while(
                || !self.reader_admissible(self.state.load(Ordering::Relaxed)),
                deadline,
            );
            if outcome == ParkOutcome::TimedOut {
                return false;
            }
        }
    }

    fn lock_exclusive_internal(&self, deadline: Option<Instant>) -> bool {
        self.writers_waiting.fetch_add(1, Ordering::Relaxed);
        loop {
            if self
                .state
                .compare_exchange(0, WRITER_ACTIVE, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                self.writers_waiting.fetch_sub(1, Ordering::Relaxed);
                return true;
            }

            let outcome = self
                .writers
                .park_while(|| self.state.load(Ordering::Relaxed) != 0, deadline);
            if outcome == ParkOutcome::TimedOut {
                self.writers_waiting.fetch_sub(1, Ordering::Relaxed);
                // Readers may have queued behind this writer.
                self.readers.unpark_all();
                return false;
            }
        }
    }

    #[inline]
    pub fn reader_count(&self) -> usize {
        self.state.load(Ordering::Relaxed) >> 1
    }

    #[inline]
    pub fn is_write_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) & WRITER_ACTIVE != 0
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != 0
    }
}

impl Default for RawRwLock {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl RwLockIface for RawRwLock {
    #[inline]
    fn lock_shared(&self) {
        self.lock_shared_internal(None);
    }

    #[inline]
    fn try_lock_shared(&self) -> bool {
        let state = self.state.load(Ordering::Relaxed);
        self.reader_admissible(state)
            && state >> 1 < MAX_READERS
            && self
                .state
                .compare_exchange(
                    state,
                    state + ONE_READER,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                )
                .is_ok()
    }

    #[inline]
    fn try_lock_shared_until(&self, deadline: Instant) -> bool {
        self.lock_shared_internal(Some(deadline))
    }

    #[inline]
    unsafe fn unlock_shared(&self) {
        let prev = self.state.fetch_sub(ONE_READER, Ordering::Release);
        debug_assert!(prev >> 1 > 0, "read unlock without readers");
        if prev == ONE_READER {
            self.writers.unpark_one();
        }
    }

    #[inline]
    fn lock_exclusive(&self) {
        self.lock_exclusive_internal(None);
    }

    #[inline]
    fn try_lock_exclusive(&self) -> bool {
        self.state
            .compare_exchange(0, WRITER_ACTIVE, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    fn try_lock_exclusive_until(&self, deadline: Instant) -> bool {
        self.lock_exclusive_internal(Some(deadline))
    }

    #[inline]
    unsafe fn unlock_exclusive(&self) {
        self.state.store(0, Ordering::Release);
        // Which kind waits is unknown here; woken readers re-check for
        // waiting writers and park again if one is queued.
        self.writers.unpark_one();
        self.readers.unpark_all();
    }
}

impl fmt::Debug for RawRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRwLock")
            .field("readers", &self.reader_count())
            .field("writer_active", &self.is_write_locked())
            .field(
                "writers_waiting",
                &self.writers_waiting.load(Ordering::Relaxed),
            )
            .finish()
    }
}

// Write Guard

#[must_use = "if unused the RwLock will immediately unlock"]
pub struct WriteGuard<'a, T: ?Sized>
where
    RwLock<T>: 'a,
{
    lock: &'a RwLock<T>,
    marker: PanicMarker,
    _not_send: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync> Sync for WriteGuard<'_, T> {}

impl<'a, T: ?Sized> Deref for WriteGuard<'a, T>
where
    RwLock<T>: 'a,
{
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: The write guard excludes every other guard.
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T: ?Sized> DerefMut for WriteGuard<'a, T>
where
    RwLock<T>: 'a,
{
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The write guard excludes every other guard.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T: ?Sized> Drop for WriteGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.poison.done(&self.marker);
        // SAFETY: The guard proves the exclusive lock is held.
        unsafe { self.lock.raw.unlock_exclusive() };
    }
}

impl<'a, T> fmt::Debug for WriteGuard<'a, T>
where
    T: fmt::Debug + ?Sized + 'a,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<'a, T> fmt::Display for WriteGuard<'a, T>
where
    T: fmt::Display + ?Sized + 'a,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

// Read Guard

#[must_use = "if unused the RwLock will immediately unlock"]
pub struct ReadGuard<'a, T: ?Sized>
where
    RwLock<T>: 'a,
{
    lock: &'a RwLock<T>,
    _not_send: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync> Sync for ReadGuard<'_, T> {}

impl<'a, T: ?Sized> Deref for ReadGuard<'a, T>
where
    RwLock<T>: 'a,
{
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: Read guards only coexist with other read guards.
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T: ?Sized> Drop for ReadGuard<'a, T> {
    fn drop(&mut self) {
        // SAFETY: The guard proves a shared lock is held.
        unsafe { self.lock.raw.unlock_shared() };
    }
}

impl<'a, T> fmt::Debug for ReadGuard<'a, T>
where
    T: fmt::Debug + ?Sized + 'a,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<'a, T> fmt::Display for ReadGuard<'a, T>
where
    T: fmt::Display + ?Sized + 'a,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

///
/// Reader/writer lock protecting a value of type `T`.
///
/// Any number of [ReadGuard]s may coexist; a [WriteGuard] excludes every
/// other guard. Writers take priority: a waiting writer holds back newly
/// arriving readers. Only a write guard released during a panic poisons the
/// lock, since readers cannot have changed the value.
///
/// Read locks are not reentrant. A thread already holding a [ReadGuard] that
/// calls [RwLock::read] again deadlocks once a writer is queued: the second
/// read waits behind the writer, and the writer waits for the first guard.
pub struct RwLock<T>
where
    T: ?Sized,
{
    raw: RawRwLock,
    poison: PoisonFlag,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for RwLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            raw: RawRwLock::new(),
            poison: PoisonFlag::new(),
            data: UnsafeCell::new(data),
        }
    }

    #[inline]
    pub fn into_inner(self) -> LockResult<T> {
        let poisoned = self.poison.get();
        let data = self.data.into_inner();
        if poisoned {
            Err(PoisonError::new(data))
        } else {
            Ok(data)
        }
    }
}

impl<T> RwLock<T>
where
    T: ?Sized,
{
    #[inline]
    pub fn get_mut(&mut self) -> LockResult<&mut T> {
        let data = self.data.get_mut();
        self.poison.guard(data)
    }

    /// # Safety
    ///
    /// A shared lock must be held.
    #[inline]
    unsafe fn read_guard(&self) -> LockResult<ReadGuard<'_, T>> {
        self.poison.guard(ReadGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    /// # Safety
    ///
    /// The exclusive lock must be held.
    #[inline]
    unsafe fn write_guard(&self) -> LockResult<WriteGuard<'_, T>> {
        self.poison.guard(WriteGuard {
            lock: self,
            marker: self.poison.marker(),
            _not_send: PhantomData,
        })
    }

    // Exposed methods

    #[inline]
    pub fn read(&self) -> LockResult<ReadGuard<'_, T>> {
        self.raw.lock_shared();
        // SAFETY: The shared lock is held, as required.
        unsafe { self.read_guard() }
    }

    #[inline]
    pub fn try_read(&self) -> TryLockResult<ReadGuard<'_, T>> {
        if self.raw.try_lock_shared() {
            // SAFETY: The shared lock is held, as required.
            Ok(unsafe { self.read_guard() }?)
        } else {
            Err(TryLockError::WouldBlock)
        }
    }

    #[inline]
    pub fn write(&self) -> LockResult<WriteGuard<'_, T>> {
        self.raw.lock_exclusive();
        // SAFETY: The exclusive lock is held, as required.
        unsafe { self.write_guard() }
    }

    #[inline]
    pub fn try_write(&self) -> TryLockResult<WriteGuard<'_, T>> {
        if self.raw.try_lock_exclusive() {
            // SAFETY: The exclusive lock is held, as required.
            Ok(unsafe { self.write_guard() }?)
        } else {
            Err(TryLockError::WouldBlock)
        }
    }

    pub fn try_read_for(&self, timeout: Duration) -> TryLockResult<ReadGuard<'_, T>> {
        let acquired = match Instant::now().checked_add(timeout) {
            Some(deadline) => self.raw.try_lock_shared_until(deadline),
            None => {
                self.raw.lock_shared();
                true
            }
        };
        if acquired {
            // SAFETY: The shared lock is held, as required.
            Ok(unsafe { self.read_guard() }?)
        } else {
            trace!("rwlock::try_read_for::timed_out::{:?}", timeout);
            Err(TryLockError::WouldBlock)
        }
    }

    pub fn try_write_for(&self, timeout: Duration) -> TryLockResult<WriteGuard<'_, T>> {
        let acquired = match Instant::now().checked_add(timeout) {
            Some(deadline) => self.raw.try_lock_exclusive_until(deadline),
            None => {
                self.raw.lock_exclusive();
                true
            }
        };
        if acquired {
            // SAFETY: The exclusive lock is held, as required.
            Ok(unsafe { self.write_guard() }?)
        } else {
            trace!("rwlock::try_write_for::timed_out::{:?}", timeout);
            Err(TryLockError::WouldBlock)
        }
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.poison.get()
    }

    #[inline]
    pub fn reader_count(&self) -> usize {
        self.raw.reader_count()
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
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for RwLock<T> {
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for RwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("RwLock");
        match self.try_read() {
            Ok(guard) => d.field("data", &&*guard),
            Err(TryLockError::Poisoned(err)) => d.field("data", &&**err.get_ref()),
            Err(TryLockError::WouldBlock) => d.field("data", &format_args!("<locked>")),
        };
        d.field("poisoned", &self.is_poisoned()).finish()
    }
}
