use std::fmt;
use std::result;
use thiserror::Error;

/// Returned by lock acquisitions whose previous holder panicked inside the
/// critical section.
///
/// The guard is still handed out; the caller has to acknowledge the possibly
/// inconsistent value through [PoisonError::into_inner] and friends.
#[derive(Error)]
#[error("lock poisoned: a previous holder panicked inside the critical section")]
pub struct PoisonError<G> {
    guard: G,
}

impl<G> PoisonError<G> {
    pub fn new(guard: G) -> Self {
        Self { guard }
    }

    pub fn into_inner(self) -> G {
        self.guard
    }

    pub fn get_ref(&self) -> &G {
        &self.guard
    }

    pub fn get_mut(&mut self) -> &mut G {
        &mut self.guard
    }
}

impl<G> fmt::Debug for PoisonError<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoisonError").finish_non_exhaustive()
    }
}

#[derive(Error)]
pub enum TryLockError<G> {
    #[error("{0}")]
    Poisoned(PoisonError<G>),
    #[error("lock acquisition would block")]
    WouldBlock,
}

impl<G> From<PoisonError<G>> for TryLockError<G> {
    fn from(err: PoisonError<G>) -> Self {
        TryLockError::Poisoned(err)
    }
}

impl<G> fmt::Debug for TryLockError<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryLockError::Poisoned(..) => f.write_str("Poisoned(..)"),
            TryLockError::WouldBlock => f.write_str("WouldBlock"),
        }
    }
}

pub type LockResult<G> = result::Result<G, PoisonError<G>>;

pub type TryLockResult<G> = result::Result<G, TryLockError<G>>;

/// A bounded wait expired before the acquisition completed.
#[derive(Clone, Copy, Error, Debug, PartialEq, Eq)]
#[error("timed out waiting for the primitive")]
pub struct TimedOut;

/// The channel is closed; the unsent value is handed back.
#[derive(Clone, Copy, Error, PartialEq, Eq)]
#[error("sending on a closed channel")]
pub struct SendError<T>(pub T);

#[derive(Clone, Copy, Error, PartialEq, Eq)]
pub enum TrySendError<T> {
    #[error("sending on a full channel")]
    Full(T),
    #[error("sending on a closed channel")]
    Closed(T),
}

#[derive(Clone, Copy, Error, PartialEq, Eq)]
pub enum SendTimeoutError<T> {
    #[error("timed out sending on a full channel")]
    Timeout(T),
    #[error("sending on a closed channel")]
    Closed(T),
}

/// The channel is empty and closed; no value will ever arrive.
#[derive(Clone, Copy, Error, Debug, PartialEq, Eq)]
#[error("receiving on an empty and closed channel")]
pub struct RecvError;

#[derive(Clone, Copy, Error, Debug, PartialEq, Eq)]
pub enum TryRecvError {
    #[error("receiving on an empty channel")]
    Empty,
    #[error("receiving on an empty and closed channel")]
    Closed,
}

#[derive(Clone, Copy, Error, Debug, PartialEq, Eq)]
pub enum RecvTimeoutError {
    #[error("timed out waiting on an empty channel")]
    Timeout,
    #[error("receiving on an empty and closed channel")]
    Closed,
}

impl<T> SendError<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> TrySendError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(v) | TrySendError::Closed(v) => v,
        }
    }
}

impl<T> SendTimeoutError<T> {
    pub fn into_inner(self) -> T {
        match self {
            SendTimeoutError::Timeout(v) | SendTimeoutError::Closed(v) => v,
        }
    }
}

impl<T> From<SendError<T>> for TrySendError<T> {
    fn from(err: SendError<T>) -> Self {
        TrySendError::Closed(err.0)
    }
}

impl<T> From<SendError<T>> for SendTimeoutError<T> {
    fn from(err: SendError<T>) -> Self {
        SendTimeoutError::Closed(err.0)
    }
}

impl From<RecvError> for TryRecvError {
    fn from(_: RecvError) -> Self {
        TryRecvError::Closed
    }
}

impl From<RecvError> for RecvTimeoutError {
    fn from(_: RecvError) -> Self {
        RecvTimeoutError::Closed
    }
}

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SendError(..)")
    }
}

impl<T> fmt::Debug for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(..) => f.write_str("Full(..)"),
            TrySendError::Closed(..) => f.write_str("Closed(..)"),
        }
    }
}

impl<T> fmt::Debug for SendTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendTimeoutError::Timeout(..) => f.write_str("Timeout(..)"),
            SendTimeoutError::Closed(..) => f.write_str("Closed(..)"),
        }
    }
}
