//! Test-and-set spinlock with `unlock_wait` (C2).
//!
//! This is the fallback lock every HTM-elided mutex (C4) falls back to, and
//! the lock whose word every elided transaction subscribes to in its
//! read-set. Its contract is intentionally small: `acquire`/`release` behave
//! like any spinlock, but `is_locked`/`unlock_wait` are load-only observers
//! that never mutate the lock word, which is what lets a hardware
//! transaction read this word without being forced to abort just because
//! someone else is briefly spinning on it.

#[cfg(not(loom))]
use core::sync::atomic::{AtomicBool, Ordering};
#[cfg(loom)]
use loom::sync::atomic::{AtomicBool, Ordering};

use crate::backoff::Backoff;

/// A test-and-set spinlock: an atomic word with a single meaningful bit.
///
/// Unlike a typical Rust `Mutex<T>`, this type owns no protected data — it is
/// the bare lock word that higher-level primitives wrap around, and is
/// itself the building block the HTM-elided mutex and the writer-flag of the
/// HTM-elided shared mutex are built from.
#[repr(transparent)]
#[derive(Debug)]
pub struct RawSpinLock {
    locked: AtomicBool,
}

impl RawSpinLock {
    /// Create a new, unlocked spinlock.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Blocks until the caller holds the lock.
    ///
    /// On success, all subsequent memory operations by this thread
    /// happen-after the last release by any previous holder.
    #[inline]
    pub fn acquire(&self) {
        let mut backoff = Backoff::new();
        while self.locked.swap(true, Ordering::Acquire) {
            // Spin on a load, not a write: a failed exchange still dirties
            // the cache line for every other spinner, so once contended we
            // only re-attempt the exchange after the load looks free.
            while self.locked.load(Ordering::Relaxed) {
                backoff.spin();
            }
        }
    }

    /// Marks the lock free with release ordering.
    ///
    /// May only be called by the current holder.
    #[inline]
    pub fn release(&self) {
        self.locked.store(false, Ordering::Release);
    }

    /// Equivalent to [`release`](Self::release), but documents that the
    /// caller has established there are no waiters.
    ///
    /// Used only by the HTM-elided shared mutex's writer-flag release: once
    /// a writer holds the reader/writer lock exclusively, it is the sole
    /// possible setter of the writer flag, so the release can never race a
    /// concurrent acquire attempt.
    #[inline]
    pub fn release_uncontended(&self) {
        self.locked.store(false, Ordering::Release);
    }

    /// Equivalent to [`acquire`](Self::acquire), but documents that the
    /// caller has established the lock is currently free and uncontended —
    /// a plain store suffices, with no exchange-then-spin needed.
    ///
    /// Used only by the HTM-elided shared mutex's writer-flag acquire: the
    /// reader/writer lock's exclusive section already serializes writers, so
    /// setting the writer flag afterward can never race a concurrent setter.
    #[inline]
    pub fn acquire_uncontended(&self) {
        // Release, not Acquire: a store cannot carry acquire semantics. The
        // happens-after guarantee this thread needs already comes from the
        // `write_acquire` on `state` that the caller performed first; this
        // store only needs to publish the flag to later observers.
        self.locked.store(true, Ordering::Release);
    }

    /// `true` iff the lock is held at the observation instant.
    ///
    /// Load-only; never mutates the lock word.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Busy-waits until the lock is observed free at least once, without
    /// ever mutating it.
    ///
    /// Returns immediately if the lock is already free. This is the
    /// cornerstone of HTM elision: it lets a transaction begin only once the
    /// fallback looks free, without wasting the retry budget on a begin that
    /// is certain to abort.
    #[inline]
    pub fn unlock_wait(&self) {
        let mut backoff = Backoff::new();
        while self.locked.load(Ordering::Acquire) {
            backoff.spin();
        }
    }
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: the lock word itself is the only state, and every access to it is
// atomic; there is no protected data here for `Send`/`Sync` to reason about.
unsafe impl Send for RawSpinLock {}
unsafe impl Sync for RawSpinLock {}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn new_is_unlocked() {
        let lock = RawSpinLock::new();
        assert!(!lock.is_locked());
    }

    #[test]
    fn acquire_then_release() {
        let lock = RawSpinLock::new();
        lock.acquire();
        assert!(lock.is_locked());
        lock.release();
        assert!(!lock.is_locked());
    }

    #[test]
    fn unlock_wait_on_unlocked_returns_immediately() {
        let lock = RawSpinLock::new();
        lock.unlock_wait();
    }

    #[test]
    fn acquire_uncontended_matches_acquire() {
        let lock = RawSpinLock::new();
        lock.acquire_uncontended();
        assert!(lock.is_locked());
        lock.release();
    }

    #[test]
    fn release_uncontended_matches_release() {
        let lock = RawSpinLock::new();
        lock.acquire();
        lock.release_uncontended();
        assert!(!lock.is_locked());
    }

    #[cfg(feature = "std")]
    #[test]
    fn mutual_exclusion_under_contention() {
        extern crate std;
        use std::sync::Arc;
        use std::thread;

        let lock = Arc::new(RawSpinLock::new());
        let counter = Arc::new(core::sync::atomic::AtomicUsize::new(0));
        let mut handles = std::vec::Vec::new();

        for _ in 0..8 {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..10_000 {
                    lock.acquire();
                    let before = counter.load(Ordering::Relaxed);
                    counter.store(before + 1, Ordering::Relaxed);
                    lock.release();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counter.load(Ordering::Relaxed), 80_000);
    }
}

#[cfg(loom)]
#[cfg(test)]
mod loom_tests {
    extern crate std;

    use super::*;
    use loom::sync::Arc;
    use loom::thread;
    use std::vec::Vec;

    #[test]
    fn loom_mutual_exclusion() {
        loom::model(|| {
            let lock = Arc::new(RawSpinLock::new());
            let flag = Arc::new(loom::sync::atomic::AtomicUsize::new(0));

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let lock = lock.clone();
                    let flag = flag.clone();
                    thread::spawn(move || {
                        lock.acquire();
                        let prev = flag.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(prev, 0);
                        flag.fetch_sub(1, Ordering::SeqCst);
                        lock.release();
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        });
    }
}
