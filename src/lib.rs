//!
//! Blocking synchronization primitives for threaded systems.
//!
//! Every blocking primitive here suspends the calling thread through
//! [ParkingWaitQueue](sync::parking::ParkingWaitQueue) instead of spinning,
//! except [SpinLock](sync::ttas::SpinLock), which never suspends. A successful
//! acquire of any lock or permit happens-after the matching release.
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use tether::prelude::*;
//!
//! let counter = Arc::new(Mutex::new(0_u64));
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let counter = counter.clone();
//!         thread::spawn(move || *counter.lock().unwrap() += 1)
//!     })
//!     .collect();
//! for h in handles {
//!     h.join().unwrap();
//! }
//! assert_eq!(*counter.lock().unwrap(), 4);
//! ```
//!
//! The protected value is only reachable through a guard, and a guard
//! cannot outlive its lock:
//!
//! ```compile_fail
//! use tether::prelude::*;
//!
//! let guard = {
//!     let lock = Mutex::new(1);
//!     lock.lock().unwrap()
//! };
//! assert_eq!(*guard, 1);
//! ```
//!
//! Lock guards stay on the thread that acquired them:
//!
//! ```compile_fail
//! use std::thread;
//! use tether::prelude::*;
//!
//! let lock = Box::leak(Box::new(Mutex::new(1)));
//! let guard = lock.lock().unwrap();
//! thread::spawn(move || drop(guard));
//! ```
//!
//! Neither can a spin lock guard:
//!
//! ```compile_fail
//! use std::thread;
//! use tether::prelude::*;
//!
//! let lock = Box::leak(Box::new(SpinLock::new(1)));
//! let guard = lock.lock();
//! thread::spawn(move || drop(guard));
//! ```

/// Synchronization primitives exposed by Tether
pub mod sync;

///
/// Prelude for the synchronization primitives
pub mod prelude {
    pub use crate::sync::prelude::*;
}
