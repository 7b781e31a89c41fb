use std::time::Instant;

/// Raw exclusive lock without an attached value.
///
/// # Safety
///
/// Implementors must guarantee that at most one caller holds the lock between
/// a successful acquisition and the matching [LockIface::unlock], and that the
/// acquisition synchronizes-with the previous release.
pub unsafe trait LockIface {
    fn lock(&self);

    fn try_lock(&self) -> bool;

    /// Keeps trying until `deadline`. A `false` return leaves no trace.
    fn try_lock_until(&self, deadline: Instant) -> bool;

    fn is_locked(&self) -> bool;

    /// # Safety
    ///
    /// The lock must be held by the caller.
    unsafe fn unlock(&self);
}

/// Raw shared/exclusive lock without an attached value.
///
/// # Safety
///
/// Implementors must guarantee that an exclusive holder never coexists with
/// any other holder, and that every acquisition synchronizes-with the
/// releases preceding it.
pub unsafe trait RwLockIface {
    fn lock_shared(&self);

    fn try_lock_shared(&self) -> bool;

    fn try_lock_shared_until(&self, deadline: Instant) -> bool;

    /// # Safety
    ///
    /// A shared lock must be held by the caller.
    unsafe fn unlock_shared(&self);

    fn lock_exclusive(&self);

    fn try_lock_exclusive(&self) -> bool;

    fn try_lock_exclusive_until(&self, deadline: Instant) -> bool;

    /// # Safety
    ///
    /// The exclusive lock must be held by the caller.
    unsafe fn unlock_exclusive(&self);
}
