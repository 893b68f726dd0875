//! Profile counters: the observability surface for lock acquisition and
//! elision (C5 §4.6).
//!
//! Counters are cache-line aligned and touched only by the thread that owns
//! the handle they are attached to — all updates use relaxed ordering, and
//! aggregation across threads happens by summing independent blocks after
//! the owning threads have joined, never concurrently.

#[cfg(not(loom))]
use core::sync::atomic::{AtomicU64, Ordering};
#[cfg(loom)]
use loom::sync::atomic::{AtomicU64, Ordering};

use crate::htm::AbortBucket;

/// Common operations every profile kind supports.
///
/// Kinds that do not track a given event (a plain mutex never commits a
/// transaction; the null mutex tracks nothing at all) simply leave the
/// corresponding method at its no-op default.
pub trait Profile {
    /// Record a fallback-path lock acquisition followed by its unlock.
    fn note_unlock(&self) {}

    /// Record an outermost HTM transaction commit (an elided acquisition).
    fn note_commit(&self) {}

    /// Record an HTM transaction abort, bucketed by cause.
    fn note_abort(&self, _bucket: AbortBucket) {}

    /// Merge another block's counts into this one.
    ///
    /// Intended for post-join aggregation across per-thread blocks, not for
    /// concurrent use — `other` must not be mutated by another thread while
    /// this runs.
    fn accumulate(&self, other: &Self)
    where
        Self: Sized;

    /// Check this block's internal consistency against the number of lock
    /// operations the caller performed in total.
    fn consistent(&self, total_lock_operations: u64) -> bool;
}

/// Tracks nothing. Used by the null mutex kind, and as the default when no
/// profiling is wanted.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct NullProfile;

impl Profile for NullProfile {
    fn accumulate(&self, _other: &Self) {}

    fn consistent(&self, _total_lock_operations: u64) -> bool {
        true
    }
}

/// Tracks only fallback-path acquisitions. Used by the plain (non-HTM)
/// exclusive and shared mutex kinds.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct PlainProfile {
    locks_acquired: AtomicU64,
}

impl PlainProfile {
    /// Number of fallback-path acquisitions recorded so far.
    #[inline]
    pub fn locks_acquired(&self) -> u64 {
        self.locks_acquired.load(Ordering::Relaxed)
    }
}

impl Profile for PlainProfile {
    fn note_unlock(&self) {
        self.locks_acquired.fetch_add(1, Ordering::Relaxed);
    }

    fn accumulate(&self, other: &Self) {
        self.locks_acquired
            .fetch_add(other.locks_acquired(), Ordering::Relaxed);
    }

    fn consistent(&self, total_lock_operations: u64) -> bool {
        self.locks_acquired() == total_lock_operations
    }
}

/// Tracks fallback-path acquisitions, elided commits, and aborts bucketed by
/// cause. Used by the HTM-elided exclusive and shared mutex kinds.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct HtmProfile {
    locks_acquired: AtomicU64,
    locks_elided: AtomicU64,
    explicit: AtomicU64,
    conflict: AtomicU64,
    capacity: AtomicU64,
    nested: AtomicU64,
    other: AtomicU64,
}

impl HtmProfile {
    /// Number of fallback-path acquisitions.
    #[inline]
    pub fn locks_acquired(&self) -> u64 {
        self.locks_acquired.load(Ordering::Relaxed)
    }

    /// Number of elided (HTM-committed) acquisitions.
    #[inline]
    pub fn locks_elided(&self) -> u64 {
        self.locks_elided.load(Ordering::Relaxed)
    }

    /// Aborts bucketed as explicit (the lock was observed held inside a
    /// transaction, forcing a user abort).
    #[inline]
    pub fn explicit(&self) -> u64 {
        self.explicit.load(Ordering::Relaxed)
    }

    /// Aborts bucketed as a data conflict with another thread.
    #[inline]
    pub fn conflict(&self) -> u64 {
        self.conflict.load(Ordering::Relaxed)
    }

    /// Aborts bucketed as exceeding the hardware transaction's capacity.
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Aborts bucketed as a disallowed nested transaction.
    #[inline]
    pub fn nested(&self) -> u64 {
        self.nested.load(Ordering::Relaxed)
    }

    /// Aborts that fit none of the other buckets (debug traps, interrupts,
    /// or an unclassifiable status).
    #[inline]
    pub fn other(&self) -> u64 {
        self.other.load(Ordering::Relaxed)
    }

    /// Sum of every abort bucket.
    #[inline]
    pub fn total_aborts(&self) -> u64 {
        self.explicit() + self.conflict() + self.capacity() + self.nested() + self.other()
    }
}

impl Profile for HtmProfile {
    fn note_unlock(&self) {
        self.locks_acquired.fetch_add(1, Ordering::Relaxed);
    }

    fn note_commit(&self) {
        self.locks_elided.fetch_add(1, Ordering::Relaxed);
    }

    fn note_abort(&self, bucket: AbortBucket) {
        let counter = match bucket {
            AbortBucket::Explicit => &self.explicit,
            AbortBucket::Conflict => &self.conflict,
            AbortBucket::Capacity => &self.capacity,
            AbortBucket::Nested => &self.nested,
            AbortBucket::Other => &self.other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn accumulate(&self, other: &Self) {
        self.locks_acquired
            .fetch_add(other.locks_acquired(), Ordering::Relaxed);
        self.locks_elided
            .fetch_add(other.locks_elided(), Ordering::Relaxed);
        self.explicit.fetch_add(other.explicit(), Ordering::Relaxed);
        self.conflict.fetch_add(other.conflict(), Ordering::Relaxed);
        self.capacity.fetch_add(other.capacity(), Ordering::Relaxed);
        self.nested.fetch_add(other.nested(), Ordering::Relaxed);
        self.other.fetch_add(other.other(), Ordering::Relaxed);
    }

    /// Two predicates must hold: every lock operation ended up either
    /// acquired via the fallback or elided (never lost), and a thread could
    /// only have acquired the fallback if some prior attempt actually
    /// aborted out of a transaction (or elision was never attempted at all).
    fn consistent(&self, total_lock_operations: u64) -> bool {
        let acquired = self.locks_acquired();
        let elided = self.locks_elided();
        let aborts = self.total_aborts();
        acquired + elided == total_lock_operations
            && (acquired <= aborts || (aborts == 0 && elided == 0))
    }
}
