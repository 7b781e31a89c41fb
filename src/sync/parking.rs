//! Thread suspension backend shared by every blocking primitive.
//!
//! Wraps `parking_lot_core`: the address of a [ParkingWaitQueue] is the key
//! under which threads are parked. The record parking_lot_core keeps for each
//! parked thread is the wait queue node; it holds the wake token and lives
//! exactly as long as the thread is suspended.

use log::*;
use parking_lot_core::{
    park, unpark_all, unpark_one, ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN,
};
use std::fmt;
use std::time::Instant;

/// Outcome of a [ParkingWaitQueue::park_while] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParkOutcome {
    /// Another thread woke this one.
    Woken,
    /// The condition no longer held, the thread never suspended.
    Skipped,
    /// The deadline passed before any wake arrived.
    TimedOut,
}

/// A queue of suspended threads.
///
/// Wakes are never lost: the park condition is evaluated while the queue's
/// bucket is locked, and wakers take the same lock. A woken thread must still
/// re-check its own condition, since parking_lot_core may wake spuriously
/// and another thread may win the race for the resource.
pub struct ParkingWaitQueue {
    // Keeps the queue non zero-sized so every instance owns a distinct key.
    _slot: u8,
}

impl ParkingWaitQueue {
    #[inline]
    pub fn new() -> Self {
        Self { _slot: 0 }
    }

    #[inline]
    fn key(&self) -> usize {
        self as *const Self as usize
    }

    ///
    /// Suspends the calling thread while `should_park` returns `true`.
    ///
    /// `should_park` runs with the queue locked, so a concurrent
    /// [ParkingWaitQueue::unpark_one] or [ParkingWaitQueue::unpark_all]
    /// issued after the caller changed the observed state either happens
    /// before the check or finds this thread queued.
    pub fn park_while<F>(&self, should_park: F, deadline: Option<Instant>) -> ParkOutcome
    where
        F: FnOnce() -> bool,
    {
        // SAFETY: The callbacks neither panic nor call into parking_lot_core.
        let result = unsafe {
            park(
                self.key(),
                should_park,
                || {},
                |_, _| {},
                DEFAULT_PARK_TOKEN,
                deadline,
            )
        };

        match result {
            ParkResult::Unparked(_) => ParkOutcome::Woken,
            ParkResult::Invalid => ParkOutcome::Skipped,
            ParkResult::TimedOut => {
                trace!("parking::timed_out::{:#x}", self.key());
                ParkOutcome::TimedOut
            }
        }
    }

    ///
    /// Wakes at most one parked thread. Returns whether a thread was woken.
    pub fn unpark_one(&self) -> bool {
        // SAFETY: The callback neither panics nor calls into parking_lot_core.
        let result = unsafe { unpark_one(self.key(), |_| DEFAULT_UNPARK_TOKEN) };
        result.unparked_threads > 0
    }

    ///
    /// Wakes every parked thread. Returns how many were woken.
    pub fn unpark_all(&self) -> usize {
        // SAFETY: The queue address is only used as a key.
        let woken = unsafe { unpark_all(self.key(), DEFAULT_UNPARK_TOKEN) };
        if woken > 0 {
            trace!("parking::unpark_all::{:#x}::{}", self.key(), woken);
        }
        woken
    }
}

impl Default for ParkingWaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParkingWaitQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParkingWaitQueue")
            .field("key", &format_args!("{:#x}", self.key()))
            .finish()
    }
}
