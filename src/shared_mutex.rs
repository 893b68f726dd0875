//! Null and plain (non-HTM) shared mutex kinds.

use crate::handle::{assert_handle_state, Exclusive, Handle, HandleStatus, Lockable, SharedLockable};
use crate::profile::{NullProfile, PlainProfile, Profile};
use crate::rwlock::RawRwLock;

/// A shared mutex that performs no synchronization at all.
#[derive(Debug, Default)]
pub struct NullSharedMutex;

impl NullSharedMutex {
    /// Create a new null shared mutex.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Lockable for NullSharedMutex {
    type Profile = NullProfile;
}

impl Exclusive for NullSharedMutex {
    fn lock(&self, handle: &Handle<'_, Self>) {
        handle.enter();
        assert_handle_state!(
            handle.status() == HandleStatus::Unlocked,
            "lock() on a handle that is not unlocked"
        );
        handle.set_status(HandleStatus::LockedUnique);
    }

    fn unlock(&self, handle: &Handle<'_, Self>) {
        assert_handle_state!(
            handle.status() == HandleStatus::LockedUnique,
            "unlock() on a handle that was not locked"
        );
        handle.set_status(HandleStatus::Unlocked);
        if let Some(profile) = handle.profile() {
            profile.note_unlock();
        }
    }
}

impl SharedLockable for NullSharedMutex {
    fn lock_shared(&self, handle: &Handle<'_, Self>) {
        handle.enter();
        assert_handle_state!(
            handle.status() == HandleStatus::Unlocked,
            "lock_shared() on a handle that is not unlocked"
        );
        handle.set_status(HandleStatus::LockedShared);
    }

    fn unlock_shared(&self, handle: &Handle<'_, Self>) {
        assert_handle_state!(
            handle.status() == HandleStatus::LockedShared,
            "unlock_shared() on a handle that was not locked"
        );
        handle.set_status(HandleStatus::Unlocked);
        if let Some(profile) = handle.profile() {
            profile.note_unlock();
        }
    }
}

/// A shared mutex backed by the reader/writer spinlock (C3), with no HTM
/// elision attempted.
#[derive(Debug, Default)]
pub struct RwMutex {
    lock: RawRwLock,
}

impl RwMutex {
    /// Create a new, unlocked reader/writer mutex.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lock: RawRwLock::new(),
        }
    }
}

impl Lockable for RwMutex {
    type Profile = PlainProfile;
}

impl Exclusive for RwMutex {
    fn lock(&self, handle: &Handle<'_, Self>) {
        handle.enter();
        assert_handle_state!(
            handle.status() == HandleStatus::Unlocked,
            "lock() on a handle that is not unlocked"
        );
        self.lock.write_acquire();
        handle.set_status(HandleStatus::LockedUnique);
    }

    fn unlock(&self, handle: &Handle<'_, Self>) {
        assert_handle_state!(
            handle.status() == HandleStatus::LockedUnique,
            "unlock() on a handle that was not locked for writing"
        );
        self.lock.write_release();
        handle.set_status(HandleStatus::Unlocked);
        if let Some(profile) = handle.profile() {
            profile.note_unlock();
        }
    }
}

impl SharedLockable for RwMutex {
    fn lock_shared(&self, handle: &Handle<'_, Self>) {
        handle.enter();
        assert_handle_state!(
            handle.status() == HandleStatus::Unlocked,
            "lock_shared() on a handle that is not unlocked"
        );
        self.lock.read_acquire();
        handle.set_status(HandleStatus::LockedShared);
    }

    fn unlock_shared(&self, handle: &Handle<'_, Self>) {
        assert_handle_state!(
            handle.status() == HandleStatus::LockedShared,
            "unlock_shared() on a handle that was not locked for reading"
        );
        self.lock.read_release();
        handle.set_status(HandleStatus::Unlocked);
        if let Some(profile) = handle.profile() {
            profile.note_unlock();
        }
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn null_shared_mutex_round_trips_both_modes() {
        let mutex = NullSharedMutex::new();
        let handle = Handle::new(&mutex, None);
        mutex.lock_shared(&handle);
        assert_eq!(handle.status(), HandleStatus::LockedShared);
        mutex.unlock_shared(&handle);
        mutex.lock(&handle);
        assert_eq!(handle.status(), HandleStatus::LockedUnique);
        mutex.unlock(&handle);
    }

    #[test]
    fn rw_mutex_exclusive_round_trip() {
        let mutex = RwMutex::new();
        let profile = PlainProfile::default();
        let handle = Handle::new(&mutex, Some(&profile));
        mutex.lock(&handle);
        assert!(mutex.lock.is_locked());
        mutex.unlock(&handle);
        assert!(!mutex.lock.is_locked());
        assert_eq!(profile.locks_acquired(), 1);
    }

    #[test]
    fn rw_mutex_shared_round_trip_allows_concurrent_readers() {
        let mutex = RwMutex::new();
        let a = Handle::new(&mutex, None);
        let b = Handle::new(&mutex, None);
        mutex.lock_shared(&a);
        mutex.lock_shared(&b);
        assert_eq!(mutex.lock.reader_count(), 2);
        mutex.unlock_shared(&a);
        mutex.unlock_shared(&b);
        assert!(!mutex.lock.is_locked());
    }
}
