//! HTM-elided exclusive mutex (C4 §4.4).
//!
//! Wraps a single fallback spinlock (C2). `lock` attempts up to `retry_limit`
//! hardware transactions that subscribe to the fallback's lock word as their
//! read-set; only once the budget is exhausted, or an abort is reported as
//! non-restartable, does it fall back to actually acquiring the spinlock.

use crate::handle::{Exclusive, Handle, HandleStatus, Lockable};
use crate::htm;
use crate::profile::{HtmProfile, Profile};
use crate::spinlock::RawSpinLock;

/// Explicit-abort code used when a transaction observes the fallback lock
/// held by another holder — distinguishes "someone else has it for real"
/// from every other abort cause.
const FALLBACK_HELD_ABORT_CODE: u8 = 1;

/// An exclusive mutex that speculatively elides its fallback spinlock via
/// hardware transactional memory.
#[derive(Debug)]
pub struct HtmMutex {
    fallback: RawSpinLock,
    retry_limit: u32,
}

impl HtmMutex {
    /// Create a new mutex using the default retry limit
    /// ([`crate::config::HTM_EXCLUSIVE_RETRY_LIMIT`]).
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::with_retry_limit(crate::config::HTM_EXCLUSIVE_RETRY_LIMIT)
    }

    /// Create a new mutex with an explicit retry limit.
    ///
    /// A limit of `0` always falls back to the spinlock without ever
    /// attempting a transaction.
    #[inline]
    #[must_use]
    pub const fn with_retry_limit(retry_limit: u32) -> Self {
        Self {
            fallback: RawSpinLock::new(),
            retry_limit,
        }
    }

    /// The configured retry limit.
    #[inline]
    #[must_use]
    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }
}

impl Default for HtmMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Lockable for HtmMutex {
    type Profile = HtmProfile;
}

impl Exclusive for HtmMutex {
    fn lock(&self, handle: &Handle<'_, Self>) {
        handle.enter();
        assert!(
            handle.status() == HandleStatus::Unlocked,
            "lock() on a handle that is not unlocked"
        );

        for _ in 0..self.retry_limit {
            self.fallback.unlock_wait();

            let status = htm::begin();
            if status.is_started() {
                if self.fallback.is_locked() {
                    // The fallback is genuinely held; abort explicitly
                    // rather than spin inside the transaction.
                    htm::user_abort(FALLBACK_HELD_ABORT_CODE);
                }
                handle.set_status(HandleStatus::Elided);
                return;
            }

            if let Some(profile) = handle.profile() {
                profile.note_abort(status.abort_bucket());
            }
            if !htm::is_restartable(status) {
                break;
            }
        }

        self.fallback.acquire();
        handle.set_status(HandleStatus::LockedUnique);
    }

    fn unlock(&self, handle: &Handle<'_, Self>) {
        match handle.status() {
            HandleStatus::Elided => {
                htm::commit();
                // A nested transaction's commit just resumes the enclosing
                // one; only the outermost commit actually elided a lock.
                if !htm::in_transaction() {
                    if let Some(profile) = handle.profile() {
                        profile.note_commit();
                    }
                }
            }
            HandleStatus::LockedUnique => {
                self.fallback.release();
                if let Some(profile) = handle.profile() {
                    profile.note_unlock();
                }
            }
            other => panic!("unlock() on a handle in state {other:?}"),
        }
        handle.set_status(HandleStatus::Unlocked);
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn zero_retry_limit_always_falls_back() {
        let mutex = HtmMutex::with_retry_limit(0);
        let profile = HtmProfile::default();
        let handle = Handle::new(&mutex, Some(&profile));

        mutex.lock(&handle);
        assert_eq!(handle.status(), HandleStatus::LockedUnique);
        mutex.unlock(&handle);

        assert_eq!(profile.locks_acquired(), 1);
        assert_eq!(profile.locks_elided(), 0);
        assert!(profile.consistent(1));
    }

    #[test]
    fn repeated_lock_unlock_cycles_stay_consistent() {
        let mutex = HtmMutex::new();
        let profile = HtmProfile::default();
        let handle = Handle::new(&mutex, Some(&profile));

        for _ in 0..50 {
            mutex.lock(&handle);
            mutex.unlock(&handle);
        }

        assert!(profile.consistent(50));
    }

    #[cfg(feature = "std")]
    #[test]
    fn mutual_exclusion_under_contention() {
        extern crate std;
        use std::sync::Arc;
        use std::thread;

        // Retry limit 0 forces every acquisition through the fallback
        // spinlock, so this exercises the same mutual-exclusion contract
        // as the plain mutex without depending on HTM hardware support.
        let mutex = Arc::new(HtmMutex::with_retry_limit(0));
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
