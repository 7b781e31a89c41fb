//! Word-sized atomic cell with explicit memory ordering.
//!
//! Every blocking primitive in this crate keeps its state in an [AtomicCell].
//! Orderings are always passed by the caller. Pairing an `Acquire` load with a
//! `Relaxed` store compiles and runs, but silently loses the happens-before
//! edge between the two threads; nothing here detects it.

use super::config;
use std::fmt;
use std::sync::atomic::{
    AtomicBool, AtomicI16, AtomicI32, AtomicI8, AtomicIsize, AtomicU16, AtomicU32, AtomicU8,
    AtomicUsize,
};
#[cfg(target_has_atomic = "64")]
use std::sync::atomic::{AtomicI64, AtomicU64};

pub use std::sync::atomic::Ordering;

mod private {
    pub trait Sealed {}
}

/// Values that can live inside an [AtomicCell].
///
/// Implemented for `bool` and the integer types the target can update with a
/// single native instruction. The trait is sealed.
pub trait AtomicValue: Copy + private::Sealed {
    #[doc(hidden)]
    type Repr: Send + Sync;

    #[doc(hidden)]
    fn wrap(value: Self) -> Self::Repr;
    #[doc(hidden)]
    fn unwrap(repr: Self::Repr) -> Self;
    #[doc(hidden)]
    fn repr_mut(repr: &mut Self::Repr) -> &mut Self;
    #[doc(hidden)]
    fn load(repr: &Self::Repr, order: Ordering) -> Self;
    #[doc(hidden)]
    fn store(repr: &Self::Repr, value: Self, order: Ordering);
    #[doc(hidden)]
    fn swap(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
    #[doc(hidden)]
    fn compare_exchange(
        repr: &Self::Repr,
        current: Self,
        new: Self,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self>;
    #[doc(hidden)]
    fn compare_exchange_weak(
        repr: &Self::Repr,
        current: Self,
        new: Self,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self>;
}

/// Integer payloads supporting arithmetic read-modify-write operations.
pub trait AtomicInteger: AtomicValue {
    #[doc(hidden)]
    fn fetch_add(repr: &Self::Repr, delta: Self, order: Ordering) -> Self;
    #[doc(hidden)]
    fn fetch_sub(repr: &Self::Repr, delta: Self, order: Ordering) -> Self;
    #[doc(hidden)]
    fn fetch_max(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
    #[doc(hidden)]
    fn fetch_min(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
}

/// Payloads supporting bitwise read-modify-write operations.
pub trait AtomicBits: AtomicValue {
    #[doc(hidden)]
    fn fetch_and(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
    #[doc(hidden)]
    fn fetch_or(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
    #[doc(hidden)]
    fn fetch_xor(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
}

macro_rules! atomic_value {
    ($t:ty, $atomic:ty) => {
        const _: () = assert!(
            config::fits_atomic_word::<$t>(),
            "atomic value wider than the native atomic word"
        );

        impl private::Sealed for $t {}

        impl AtomicValue for $t {
            type Repr = $atomic;

            #[inline]
            fn wrap(value: Self) -> Self::Repr {
                <$atomic>::new(value)
            }

            #[inline]
            fn unwrap(repr: Self::Repr) -> Self {
                repr.into_inner()
            }

            #[inline]
            fn repr_mut(repr: &mut Self::Repr) -> &mut Self {
                repr.get_mut()
            }

            #[inline]
            fn load(repr: &Self::Repr, order: Ordering) -> Self {
                repr.load(order)
            }

            #[inline]
            fn store(repr: &Self::Repr, value: Self, order: Ordering) {
                repr.store(value, order)
            }

            #[inline]
            fn swap(repr: &Self::Repr, value: Self, order: Ordering) -> Self {
                repr.swap(value, order)
            }

            #[inline]
            fn compare_exchange(
                repr: &Self::Repr,
                current: Self,
                new: Self,
                success: Ordering,
                failure: Ordering,
            ) -> Result<Self, Self> {
                repr.compare_exchange(current, new, success, failure)
            }

            #[inline]
            fn compare_exchange_weak(
                repr: &Self::Repr,
                current: Self,
                new: Self,
                success: Ordering,
                failure: Ordering,
            ) -> Result<Self, Self> {
                repr.compare_exchange_weak(current, new, success, failure)
            }
        }

        impl AtomicBits for $t {
            #[inline]
            fn fetch_and(repr: &Self::Repr, value: Self, order: Ordering) -> Self {
                repr.fetch_and(value, order)
            }

            #[inline]
            fn fetch_or(repr: &Self::Repr, value: Self, order: Ordering) -> Self {
                repr.fetch_or(value, order)
            }

            #[inline]
            fn fetch_xor(repr: &Self::Repr, value: Self, order: Ordering) -> Self {
                repr.fetch_xor(value, order)
            }
        }
    };
}

macro_rules! atomic_integer {
    ($($t:ty => $atomic:ty),* $(,)?) => {
        $(
            atomic_value!($t, $atomic);

            impl AtomicInteger for $t {
                #[inline]
                fn fetch_add(repr: &Self::Repr, delta: Self, order: Ordering) -> Self {
                    repr.fetch_add(delta, order)
                }

                #[inline]
                fn fetch_sub(repr: &Self::Repr, delta: Self, order: Ordering) -> Self {
                    repr.fetch_sub(delta, order)
                }

                #[inline]
                fn fetch_max(repr: &Self::Repr, value: Self, order: Ordering) -> Self {
                    repr.fetch_max(value, order)
                }

                #[inline]
                fn fetch_min(repr: &Self::Repr, value: Self, order: Ordering) -> Self {
                    repr.fetch_min(value, order)
                }
            }
        )*
    };
}

atomic_value!(bool, AtomicBool);

atomic_integer! {
    u8 => AtomicU8,
    i8 => AtomicI8,
    u16 => AtomicU16,
    i16 => AtomicI16,
    u32 => AtomicU32,
    i32 => AtomicI32,
    usize => AtomicUsize,
    isize => AtomicIsize,
}

#[cfg(target_has_atomic = "64")]
atomic_integer! {
    u64 => AtomicU64,
    i64 => AtomicI64,
}

///
/// Strongest failure ordering allowed for a compare-exchange with the given
/// success ordering.
pub fn failure_ordering(success: Ordering) -> Ordering {
    use Ordering::*;
    match success {
        Release => Relaxed,
        Relaxed => Relaxed,
        SeqCst => SeqCst,
        Acquire => Acquire,
        AcqRel => Acquire,
        _ => SeqCst,
    }
}

/// Atomic load/store/read-modify-write cell over a word-sized value.
///
/// ```
/// use tether::sync::atomics::{AtomicCell, Ordering};
///
/// let cell = AtomicCell::new(5_usize);
/// assert_eq!(cell.fetch_add(2, Ordering::AcqRel), 5);
/// assert_eq!(cell.compare_exchange(7, 1, Ordering::AcqRel, Ordering::Acquire), Ok(7));
/// assert_eq!(cell.load(Ordering::Acquire), 1);
/// ```
pub struct AtomicCell<T: AtomicValue> {
    repr: T::Repr,
}

impl<T: AtomicValue> AtomicCell<T> {
    ///
    /// Creates a new cell holding `value`.
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            repr: T::wrap(value),
        }
    }

    ///
    /// Always `true`. Every [AtomicValue] implementation is checked at compile
    /// time against the target's native atomic word, so no cell falls back to
    /// a lock; a type that does not fit fails the build instead.
    pub const fn is_lock_free() -> bool {
        config::fits_atomic_word::<T>()
    }

    #[inline]
    pub fn into_inner(self) -> T {
        T::unwrap(self.repr)
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        T::repr_mut(&mut self.repr)
    }

    ///
    /// Loads the value. `order` must not be `Release` or `AcqRel`.
    #[inline]
    pub fn load(&self, order: Ordering) -> T {
        T::load(&self.repr, order)
    }

    ///
    /// Stores a value. `order` must not be `Acquire` or `AcqRel`.
    #[inline]
    pub fn store(&self, value: T, order: Ordering) {
        T::store(&self.repr, value, order)
    }

    #[inline]
    pub fn swap(&self, value: T, order: Ordering) -> T {
        T::swap(&self.repr, value, order)
    }

    ///
    /// Stores `new` if the cell holds `current`.
    ///
    /// Returns `Ok(previous)` on success and `Err(actual)` on failure.
    #[inline]
    pub fn compare_exchange(
        &self,
        current: T,
        new: T,
        success: Ordering,
        failure: Ordering,
    ) -> Result<T, T> {
        T::compare_exchange(&self.repr, current, new, success, failure)
    }

    ///
    /// Like [AtomicCell::compare_exchange] but allowed to fail spuriously,
    /// meant for retry loops.
    #[inline]
    pub fn compare_exchange_weak(
        &self,
        current: T,
        new: T,
        success: Ordering,
        failure: Ordering,
    ) -> Result<T, T> {
        T::compare_exchange_weak(&self.repr, current, new, success, failure)
    }

    ///
    /// Applies `f` in a compare-exchange loop until it succeeds or `f`
    /// returns `None`.
    pub fn fetch_update<F>(&self, set_order: Ordering, fetch_order: Ordering, mut f: F) -> Result<T, T>
    where
        F: FnMut(T) -> Option<T>,
    {
        let mut prev = self.load(fetch_order);
        while let Some(next) = f(prev) {
            match self.compare_exchange_weak(prev, next, set_order, fetch_order) {
                Ok(x) => return Ok(x),
                Err(actual) => prev = actual,
            }
        }
        Err(prev)
    }
}

impl<T: AtomicInteger> AtomicCell<T> {
    ///
    /// Adds `delta` with wrapping, returning the previous value.
    #[inline]
    pub fn fetch_add(&self, delta: T, order: Ordering) -> T {
        T::fetch_add(&self.repr, delta, order)
    }

    ///
    /// Subtracts `delta` with wrapping, returning the previous value.
    #[inline]
    pub fn fetch_sub(&self, delta: T, order: Ordering) -> T {
        T::fetch_sub(&self.repr, delta, order)
    }

    #[inline]
    pub fn fetch_max(&self, value: T, order: Ordering) -> T {
        T::fetch_max(&self.repr, value, order)
    }

    #[inline]
    pub fn fetch_min(&self, value: T, order: Ordering) -> T {
        T::fetch_min(&self.repr, value, order)
    }
}

impl<T: AtomicBits> AtomicCell<T> {
    #[inline]
    pub fn fetch_and(&self, value: T, order: Ordering) -> T {
        T::fetch_and(&self.repr, value, order)
    }

    #[inline]
    pub fn fetch_or(&self, value: T, order: Ordering) -> T {
        T::fetch_or(&self.repr, value, order)
    }

    #[inline]
    pub fn fetch_xor(&self, value: T, order: Ordering) -> T {
        T::fetch_xor(&self.repr, value, order)
    }
}

impl<T: AtomicValue + Default> Default for AtomicCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: AtomicValue> From<T> for AtomicCell<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: AtomicValue + fmt::Debug> fmt::Debug for AtomicCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.load(Ordering::Relaxed), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn atomic_cell_load_store() {
        let cell = AtomicCell::new(1024_u32);
        assert_eq!(cell.load(Ordering::Acquire), 1024);

        cell.store(2048, Ordering::Release);
        assert_eq!(cell.load(Ordering::Acquire), 2048);
        assert_eq!(cell.swap(1, Ordering::AcqRel), 2048);
        assert_eq!(cell.into_inner(), 1);
    }

    #[test]
    fn atomic_cell_compare_exchange() {
        let cell = AtomicCell::new(false);
        assert_eq!(
            cell.compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire),
            Err(false)
        );
        assert_eq!(
            cell.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire),
            Ok(false)
        );
        assert!(cell.load(Ordering::Relaxed));
    }

    #[test]
    fn atomic_cell_fetch_ops_return_old_value() {
        let cell = AtomicCell::new(10_i64);
        assert_eq!(cell.fetch_add(5, Ordering::Relaxed), 10);
        assert_eq!(cell.fetch_sub(20, Ordering::Relaxed), 15);
        assert_eq!(cell.load(Ordering::Relaxed), -5);
        assert_eq!(cell.fetch_max(3, Ordering::Relaxed), -5);
        assert_eq!(cell.fetch_min(-7, Ordering::Relaxed), 3);
        assert_eq!(cell.load(Ordering::Relaxed), -7);

        let bits = AtomicCell::new(0b1100_u8);
        assert_eq!(bits.fetch_or(0b0011, Ordering::Relaxed), 0b1100);
        assert_eq!(bits.fetch_and(0b0110, Ordering::Relaxed), 0b1111);
        assert_eq!(bits.fetch_xor(0b0110, Ordering::Relaxed), 0b0110);
        assert_eq!(bits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn atomic_cell_fetch_update() {
        let cell = AtomicCell::new(7_usize);
        assert_eq!(
            cell.fetch_update(Ordering::AcqRel, Ordering::Acquire, |x| x.checked_sub(7)),
            Ok(7)
        );
        assert_eq!(
            cell.fetch_update(Ordering::AcqRel, Ordering::Acquire, |x| x.checked_sub(1)),
            Err(0)
        );
    }

    #[test]
    fn failure_ordering_is_never_stronger_than_allowed() {
        assert_eq!(failure_ordering(Ordering::Release), Ordering::Relaxed);
        assert_eq!(failure_ordering(Ordering::AcqRel), Ordering::Acquire);
        assert_eq!(failure_ordering(Ordering::SeqCst), Ordering::SeqCst);
    }

    #[test]
    fn every_value_type_is_lock_free() {
        const WORD: bool = AtomicCell::<usize>::is_lock_free();
        assert!(WORD);
        assert!(AtomicCell::<bool>::is_lock_free());
        assert!(AtomicCell::<u8>::is_lock_free());
        assert!(AtomicCell::<i16>::is_lock_free());
        assert!(AtomicCell::<u32>::is_lock_free());
        assert!(AtomicCell::<isize>::is_lock_free());
        #[cfg(target_has_atomic = "64")]
        {
            assert!(AtomicCell::<u64>::is_lock_free());
            assert!(AtomicCell::<i64>::is_lock_free());
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn atomic_cell_threaded_contention() {
        let cell = Arc::new(AtomicCell::new(0_usize));
        let thread_num = 10;
        let mut guards = Vec::new();
        let barrier = Arc::new(std::sync::Barrier::new(thread_num));

        for _ in 0..thread_num {
            let b = Arc::clone(&barrier);
            let cpy = cell.clone();
            guards.push(thread::spawn(move || {
                b.wait();
                for _ in 0..1000 {
                    cpy.fetch_add(100, Ordering::Relaxed);
                }
            }));
        }

        for g in guards {
            g.join().unwrap();
        }

        assert_eq!(cell.load(Ordering::Acquire), thread_num * 1000 * 100);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn release_acquire_publishes_preceding_writes() {
        let data = Arc::new(AtomicCell::new(0_u32));
        let ready = Arc::new(AtomicCell::new(false));

        let (d, r) = (data.clone(), ready.clone());
        let producer = thread::spawn(move || {
            d.store(42, Ordering::Relaxed);
            r.store(true, Ordering::Release);
        });

        while !ready.load(Ordering::Acquire) {
            std::hint::spin_loop();
        }
        assert_eq!(data.load(Ordering::Relaxed), 42);
        producer.join().unwrap();
    }
}
