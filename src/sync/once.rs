use super::atomics::{AtomicCell, Ordering};
use super::parking::ParkingWaitQueue;
use log::*;
use std::cell::UnsafeCell;
use std::convert::Infallible;
use std::fmt;
use std::mem::{self, MaybeUninit};

const UNINITIALIZED: u8 = 0;
const INITIALIZING: u8 = 1;
const DONE: u8 = 2;

/// Snapshot of a [OnceCell]'s initialization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnceState {
    Uninitialized,
    /// One thread is running the initializer; the rest block.
    Initializing,
    Done,
}

///
/// Write-once cell initialized by exactly one thread.
///
/// The `Uninitialized -> Initializing` transition is a compare-exchange, so
/// exactly one caller runs its initializer; everybody else observing
/// `Initializing` parks until the value is published. Reading a `Done` cell is
/// a single acquire load.
///
/// An initializer that panics or fails puts the cell back to
/// `Uninitialized` and wakes the parked threads, one of which then runs its
/// own initializer. The cell never reaches `Done` without a value.
///
/// Meant to be constructed explicitly and owned, e.g. by the component that
/// needs the lazily built resource, rather than as an implicit global.
pub struct OnceCell<T> {
    state: AtomicCell<u8>,
    queue: ParkingWaitQueue,
    value: UnsafeCell<MaybeUninit<T>>,
}

unsafe impl<T: Send> Send for OnceCell<T> {}
unsafe impl<T: Send + Sync> Sync for OnceCell<T> {}

/// Reverts an abandoned initialization.
struct Abandon<'a, T> {
    cell: &'a OnceCell<T>,
}

impl<T> Drop for Abandon<'_, T> {
    fn drop(&mut self) {
        warn!("once_cell::initializer_abandoned");
        self.cell.state.store(UNINITIALIZED, Ordering::Release);
        self.cell.queue.unpark_all();
    }
}

impl<T> OnceCell<T> {
    pub fn new() -> Self {
        Self {
            state: AtomicCell::new(UNINITIALIZED),
            queue: ParkingWaitQueue::new(),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    pub fn state(&self) -> OnceState {
        match self.state.load(Ordering::Acquire) {
            UNINITIALIZED => OnceState::Uninitialized,
            INITIALIZING => OnceState::Initializing,
            _ => OnceState::Done,
        }
    }

    /// # Safety
    ///
    /// The state must be `DONE`, observed with acquire ordering.
    #[inline]
    unsafe fn get_unchecked(&self) -> &T {
        (*self.value.get()).assume_init_ref()
    }

    ///
    /// The value, if initialization has completed.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == DONE {
            // SAFETY: DONE is published after the value is written.
            Some(unsafe { self.get_unchecked() })
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        if *self.state.get_mut() == DONE {
            // SAFETY: Exclusive access and the value is initialized.
            Some(unsafe { self.value.get_mut().assume_init_mut() })
        } else {
            None
        }
    }

    ///
    /// Returns the value, running `init` first if the cell is empty.
    ///
    /// Blocks while another thread is initializing.
    pub fn get_or_init<F>(&self, init: F) -> &T
    where
        F: FnOnce() -> T,
    {
        match self.get_or_try_init(|| Ok::<T, Infallible>(init())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    ///
    /// Like [OnceCell::get_or_init] with a fallible initializer. An error is
    /// returned to the caller that ran `init` and leaves the cell empty.
    pub fn get_or_try_init<F, E>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.get() {
            return Ok(value);
        }
        self.initialize(init)?;
        // SAFETY: `initialize` returns Ok only once DONE was observed with
        // acquire ordering or stored by this thread.
        Ok(unsafe { self.get_unchecked() })
    }

    #[cold]
    fn initialize<F, E>(&self, init: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        loop {
            match self.state.compare_exchange(
                UNINITIALIZED,
                INITIALIZING,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(DONE) => return Ok(()),
                Err(_) => {
                    trace!("once_cell::waiting_for_initializer");
                    self.queue.park_while(
                        || self.state.load(Ordering::Relaxed) == INITIALIZING,
                        None,
                    );
                }
            }
        }

        let abandon = Abandon { cell: self };
        let value = init()?;
        // SAFETY: INITIALIZING grants this thread exclusive write access.
        unsafe { (*self.value.get()).write(value) };
        mem::forget(abandon);

        self.state.store(DONE, Ordering::Release);
        debug!("once_cell::initialized");
        self.queue.unpark_all();
        Ok(())
    }

    ///
    /// Stores `value` if the cell is empty, handing it back otherwise.
    pub fn set(&self, value: T) -> Result<(), T> {
        let mut slot = Some(value);
        self.get_or_init(|| match slot.take() {
            Some(value) => value,
            None => unreachable!("initializer runs at most once"),
        });
        match slot {
            None => Ok(()),
            Some(value) => Err(value),
        }
    }

    ///
    /// Empties the cell, returning the value if there was one.
    pub fn take(&mut self) -> Option<T> {
        if *self.state.get_mut() == DONE {
            *self.state.get_mut() = UNINITIALIZED;
            // SAFETY: The value was initialized and the state no longer says so.
            Some(unsafe { self.value.get_mut().assume_init_read() })
        } else {
            None
        }
    }

    pub fn into_inner(mut self) -> Option<T> {
        self.take()
    }
}

impl<T> Drop for OnceCell<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == DONE {
            // SAFETY: The value is initialized and dropped exactly once.
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

impl<T> Default for OnceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<T> for OnceCell<T> {
    fn from(value: T) -> Self {
        Self {
            state: AtomicCell::new(DONE),
            queue: ParkingWaitQueue::new(),
            value: UnsafeCell::new(MaybeUninit::new(value)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for OnceCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_tuple("OnceCell");
        match self.get() {
            Some(value) => d.field(value),
            None => d.field(&self.state()),
        };
        d.finish()
    }
}
