//! Null and plain (non-HTM) exclusive mutex kinds (C4's baseline variants).

use crate::handle::{assert_handle_state, Exclusive, Handle, HandleStatus, Lockable};
use crate::profile::{NullProfile, PlainProfile, Profile};
use crate::spinlock::RawSpinLock;

/// An exclusive mutex that performs no synchronization at all.
///
/// Exists as the bottom rung of the capability ladder: a baseline for
/// measuring the overhead every other kind adds, and a stand-in for code
/// paths that are provably single-threaded.
#[derive(Debug, Default)]
pub struct NullMutex;

impl NullMutex {
    /// Create a new null mutex.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Lockable for NullMutex {
    type Profile = NullProfile;
}

impl Exclusive for NullMutex {
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

/// An exclusive mutex backed by the test-and-set spinlock (C2), with no
/// HTM elision attempted.
#[derive(Debug, Default)]
pub struct SpinMutex {
    lock: RawSpinLock,
}

impl SpinMutex {
    /// Create a new, unlocked spin mutex.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lock: RawSpinLock::new(),
        }
    }
}

impl Lockable for SpinMutex {
    type Profile = PlainProfile;
}

impl Exclusive for SpinMutex {
    fn lock(&self, handle: &Handle<'_, Self>) {
        handle.enter();
        assert_handle_state!(
            handle.status() == HandleStatus::Unlocked,
            "lock() on a handle that is not unlocked"
        );
        self.lock.acquire();
        handle.set_status(HandleStatus::LockedUnique);
    }

    fn unlock(&self, handle: &Handle<'_, Self>) {
        assert_handle_state!(
            handle.status() == HandleStatus::LockedUnique,
            "unlock() on a handle that was not locked"
        );
        self.lock.release();
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
    fn null_mutex_round_trip() {
        let mutex = NullMutex::new();
        let handle = Handle::new(&mutex, None);
        mutex.lock(&handle);
        assert_eq!(handle.status(), HandleStatus::LockedUnique);
        mutex.unlock(&handle);
        assert_eq!(handle.status(), HandleStatus::Unlocked);
    }

    #[test]
    fn spin_mutex_round_trip_updates_profile() {
        let mutex = SpinMutex::new();
        let profile = PlainProfile::default();
        let handle = Handle::new(&mutex, Some(&profile));

        for _ in 0..3 {
            mutex.lock(&handle);
            mutex.unlock(&handle);
        }

        assert_eq!(profile.locks_acquired(), 3);
        assert!(profile.consistent(3));
    }

    #[cfg(feature = "std")]
    #[test]
    fn spin_mutex_excludes_concurrent_holders() {
        extern crate std;
        use std::sync::Arc;
        use std::thread;

        let mutex = Arc::new(SpinMutex::new());
        let counter = Arc::new(core::sync::atomic::AtomicUsize::new(0));
        let mut handles = std::vec::Vec::new();

        for _ in 0..4 {
            let mutex = Arc::clone(&mutex);
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                let handle = Handle::new(&*mutex, None);
                for _ in 0..5_000 {
                    mutex.lock(&handle);
                    counter.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
                    mutex.unlock(&handle);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counter.load(core::sync::atomic::Ordering::Relaxed), 20_000);
    }
}
