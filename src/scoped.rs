//! RAII scoped-acquisition guards (§6, §9 design note).
//!
//! These wrap a borrowed [`Handle`] reference, acquiring on construction and
//! releasing on drop. They deliberately do not implement `Clone`/`Copy`: a
//! guard represents a single live acquisition and must not be duplicated,
//! though like any Rust value it may still be moved — ownership transfer is
//! harmless here since `Drop` still runs exactly once.

use crate::handle::{Exclusive, Handle, SharedLockable};

/// An RAII exclusive-acquisition guard.
#[must_use = "the lock is released as soon as this guard is dropped"]
pub struct ScopedLock<'h, 'm, M: Exclusive> {
    handle: &'h Handle<'m, M>,
}

impl<'h, 'm, M: Exclusive> ScopedLock<'h, 'm, M> {
    /// Acquire `handle`'s mutex exclusively, releasing it when the returned
    /// guard is dropped.
    #[inline]
    pub fn new(handle: &'h Handle<'m, M>) -> Self {
        handle.mutex().lock(handle);
        Self { handle }
    }

    /// The handle this guard is holding the lock through.
    #[inline]
    pub fn handle(&self) -> &'h Handle<'m, M> {
        self.handle
    }
}

impl<M: Exclusive> Drop for ScopedLock<'_, '_, M> {
    #[inline]
    fn drop(&mut self) {
        self.handle.mutex().unlock(self.handle);
    }
}

/// An RAII shared-acquisition guard.
#[must_use = "the lock is released as soon as this guard is dropped"]
pub struct ScopedSharedLock<'h, 'm, M: SharedLockable> {
    handle: &'h Handle<'m, M>,
}

impl<'h, 'm, M: SharedLockable> ScopedSharedLock<'h, 'm, M> {
    /// Acquire `handle`'s mutex for shared access, releasing it when the
    /// returned guard is dropped.
    #[inline]
    pub fn new(handle: &'h Handle<'m, M>) -> Self {
        handle.mutex().lock_shared(handle);
        Self { handle }
    }

    /// The handle this guard is holding the lock through.
    #[inline]
    pub fn handle(&self) -> &'h Handle<'m, M> {
        self.handle
    }
}

impl<M: SharedLockable> Drop for ScopedSharedLock<'_, '_, M> {
    #[inline]
    fn drop(&mut self) {
        self.handle.mutex().unlock_shared(self.handle);
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::mutex::SpinMutex;
    use crate::shared_mutex::RwMutex;

    #[test]
    fn scoped_lock_releases_on_drop() {
        let mutex = SpinMutex::new();
        let handle = Handle::new(&mutex, None);
        {
            let _guard = ScopedLock::new(&handle);
            assert_eq!(
                handle.status(),
                crate::handle::HandleStatus::LockedUnique
            );
        }
        assert_eq!(handle.status(), crate::handle::HandleStatus::Unlocked);
    }

    #[test]
    fn scoped_shared_lock_releases_on_drop() {
        let mutex = RwMutex::new();
        let handle = Handle::new(&mutex, None);
        {
            let _guard = ScopedSharedLock::new(&handle);
            assert_eq!(
                handle.status(),
                crate::handle::HandleStatus::LockedShared
            );
        }
        assert_eq!(handle.status(), crate::handle::HandleStatus::Unlocked);
    }
}
