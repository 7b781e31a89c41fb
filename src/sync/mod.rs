/// Ifaces for raw lock implementations
pub mod ifaces;

/// Atomic cells with explicit memory ordering
pub mod atomics;
/// Per-architecture atomic word configuration
pub mod config;
pub(crate) mod constants;
/// Errors and result aliases of the blocking primitives
pub mod errors;
/// Thread parking backend of every blocking primitive
pub mod parking;
pub(crate) mod poison;
/// Shared handle counting
pub mod refcount;

/// Parking mutex with poisoning
pub mod mutex;
/// Writer-priority reader/writer lock
pub mod rwlock;
/// Condition variable paired with [Mutex](mutex::Mutex)
pub mod condvar;
/// Multi-producer single-consumer channels
pub mod channel;
/// Counting semaphore
pub mod semaphore;
/// TTas based spin lock implementation
pub mod ttas;
/// Cyclic barrier
pub mod barrier;
/// Single-use countdown latch
pub mod latch;
/// Exactly-once initialization cell
pub mod once;

pub use poison::LockState;

///
/// Prelude for the synchronization primitives
pub mod prelude {
    pub use super::atomics::{AtomicCell, Ordering};
    pub use super::barrier::*;
    pub use super::channel::*;
    pub use super::condvar::*;
    pub use super::errors::*;
    pub use super::ifaces::*;
    pub use super::latch::*;
    pub use super::mutex::*;
    pub use super::once::*;
    pub use super::poison::LockState;
    pub use super::rwlock::*;
    pub use super::semaphore::*;
    pub use super::ttas::*;
}
