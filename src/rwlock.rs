//! Reader/writer spinlock with writer priority and `unlock_wait` (C3).
//!
//! A single atomic word is packed as:
//! - bit 0 — *active writer* (an exclusive holder is present),
//! - bit 1 — *pending writer* (a writer has announced intent; new readers
//!   must wait),
//! - bits 2.. — the count of *active readers*.
//!
//! Once a writer is pending, readers that have not yet incremented the count
//! must wait. A reader that optimistically incremented anyway, then observed
//! an active writer, decrements and retries — this race is benign and
//! lock-free. Writer release clears both the active and pending bits in one
//! atomic step, which is what gives waiting readers priority over any
//! newly-arriving writer.

#[cfg(not(loom))]
use core::sync::atomic::{AtomicUsize, Ordering};
#[cfg(loom)]
use loom::sync::atomic::{AtomicUsize, Ordering};

use crate::backoff::Backoff;

/// Active-writer bit.
const WRITER: usize = 1 << 0;
/// Pending-writer bit.
const PENDING: usize = 1 << 1;
/// Reader-count increment.
const READER_UNIT: usize = 1 << 2;

/// A reader/writer spinlock over a single packed machine word.
///
/// Like [`RawSpinLock`](crate::spinlock::RawSpinLock), this owns no protected
/// data: it is the `state` word the HTM-elided shared mutex (C4 §4.5) wraps,
/// plus the separate `is_locked`/`unlock_wait` observers that make read-set
/// subscription possible.
#[repr(transparent)]
#[derive(Debug)]
pub struct RawRwLock {
    state: AtomicUsize,
}

impl RawRwLock {
    /// Create a new, unlocked reader/writer lock.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicUsize::new(0),
        }
    }

    /// Blocks until no writer is active or pending, then increments the
    /// reader count.
    ///
    /// On return, this thread's subsequent reads happen-after the prior
    /// writer's release.
    #[inline]
    pub fn read_acquire(&self) {
        let mut backoff = Backoff::new();
        loop {
            while self.state.load(Ordering::Relaxed) & (WRITER | PENDING) != 0 {
                backoff.spin();
            }

            let old = self.state.fetch_add(READER_UNIT, Ordering::Acquire);
            if old & WRITER != 0 {
                // Raced a writer that became active between our spin-check
                // and the increment. Benign and lock-free: back out and
                // retry rather than blocking inside the read-modify-write.
                self.state.fetch_sub(READER_UNIT, Ordering::Relaxed);
                backoff.spin();
                continue;
            }
            return;
        }
    }

    /// Decrements the reader count with release ordering.
    #[inline]
    pub fn read_release(&self) {
        self.state.fetch_sub(READER_UNIT, Ordering::Release);
    }

    /// Blocks until no writer is active and no readers are active.
    ///
    /// While waiting, sets the pending-writer bit so no new readers start,
    /// then transitions to active-writer atomically once the word (modulo
    /// the pending bit) is zero.
    #[inline]
    pub fn write_acquire(&self) {
        let mut backoff = Backoff::new();
        loop {
            let snapshot = self.state.load(Ordering::Relaxed);
            if snapshot & !PENDING == 0 {
                if self
                    .state
                    .compare_exchange(
                        snapshot,
                        snapshot | WRITER,
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    return;
                }
            } else if snapshot & PENDING == 0 {
                self.state.fetch_or(PENDING, Ordering::Relaxed);
            }
            backoff.spin();
        }
    }

    /// Clears the active-writer and pending-writer bits in one atomic step.
    ///
    /// Clearing both together gives waiting readers a chance to start before
    /// any newly-arriving writer observes the state — readers are preferred
    /// on writer release, which bounds writer starvation of readers.
    #[inline]
    pub fn write_release(&self) {
        self.state.fetch_and(!(WRITER | PENDING), Ordering::Release);
    }

    /// `true` iff the lock is held — by a writer, a pending writer, or any
    /// reader — at the observation instant.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Acquire) != 0
    }

    /// Busy-waits until the packed word is observed all-zero at least once,
    /// without ever mutating it.
    #[inline]
    pub fn unlock_wait(&self) {
        let mut backoff = Backoff::new();
        while self.state.load(Ordering::Acquire) != 0 {
            backoff.spin();
        }
    }

    /// Current reader count, for diagnostics and tests.
    #[inline]
    pub fn reader_count(&self) -> usize {
        self.state.load(Ordering::Relaxed) >> 2
    }
}

impl Default for RawRwLock {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: the packed word is the only state, and every access is atomic.
unsafe impl Send for RawRwLock {}
unsafe impl Sync for RawRwLock {}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn new_is_unlocked() {
        let lock = RawRwLock::new();
        assert!(!lock.is_locked());
        assert_eq!(lock.reader_count(), 0);
    }

    #[test]
    fn multiple_readers() {
        let lock = RawRwLock::new();
        lock.read_acquire();
        lock.read_acquire();
        lock.read_acquire();
        assert_eq!(lock.reader_count(), 3);
        assert!(lock.is_locked());
        lock.read_release();
        lock.read_release();
        lock.read_release();
        assert!(!lock.is_locked());
    }

    #[test]
    fn writer_excludes_readers() {
        let lock = RawRwLock::new();
        lock.write_acquire();
        assert!(lock.is_locked());
        lock.write_release();
        assert!(!lock.is_locked());
    }

    #[test]
    fn unlock_wait_on_unlocked_returns_immediately() {
        let lock = RawRwLock::new();
        lock.unlock_wait();
    }

    #[cfg(feature = "std")]
    #[test]
    fn writers_and_readers_do_not_overlap() {
        extern crate std;
        use core::sync::atomic::AtomicUsize as StdAtomicUsize;
        use std::sync::Arc;
        use std::thread;

        let lock = Arc::new(RawRwLock::new());
        let counter = Arc::new(StdAtomicUsize::new(0));
        let observed_during_write = Arc::new(StdAtomicUsize::new(0));
        let mut handles = std::vec::Vec::new();

        for _ in 0..2 {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..2_000 {
                    lock.write_acquire();
                    counter.fetch_add(1, Ordering::Relaxed);
                    lock.write_release();
                }
            }));
        }

        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let observed_during_write = Arc::clone(&observed_during_write);
            handles.push(thread::spawn(move || {
                for _ in 0..2_000 {
                    lock.read_acquire();
                    if lock.state.load(Ordering::Relaxed) & WRITER != 0 {
                        observed_during_write.fetch_add(1, Ordering::Relaxed);
                    }
                    lock.read_release();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counter.load(Ordering::Relaxed), 4_000);
        assert_eq!(observed_during_write.load(Ordering::Relaxed), 0);
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
    fn loom_reader_writer_exclusion() {
        loom::model(|| {
            let lock = Arc::new(RawRwLock::new());

            let writer = {
                let lock = lock.clone();
                thread::spawn(move || {
                    lock.write_acquire();
                    assert_eq!(lock.state.load(Ordering::SeqCst) & WRITER, WRITER);
                    lock.write_release();
                })
            };

            let readers: Vec<_> = (0..2)
                .map(|_| {
                    let lock = lock.clone();
                    thread::spawn(move || {
                        lock.read_acquire();
                        lock.read_release();
                    })
                })
                .collect();

            writer.join().unwrap();
            for r in readers {
                r.join().unwrap();
            }
        });
    }
}
