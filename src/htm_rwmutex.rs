//! HTM-elided shared mutex (C4 §4.5).
//!
//! Two lock words back this mutex: the reader/writer spinlock (C3) that the
//! fallback path uses directly, and a separate single-bit `writer_flag` that
//! both the fallback writer and every elided acquisition (read or write)
//! subscribe to. Splitting the writer flag out from the reader count is what
//! lets two elided readers run concurrently without conflicting with each
//! other: an elided read only ever reads `writer_flag`, never the reader
//! count `state` carries.

use crate::handle::{Exclusive, Handle, HandleStatus, Lockable, SharedLockable};
use crate::htm;
use crate::profile::{HtmProfile, Profile};
use crate::rwlock::RawRwLock;
use crate::spinlock::RawSpinLock;

/// Explicit-abort code used when an elided writer observes either lock word
/// already held.
const WRITE_CONFLICT_ABORT_CODE: u8 = 1;
/// Explicit-abort code used when an elided reader observes an active writer.
const READ_CONFLICT_ABORT_CODE: u8 = 2;

/// A shared mutex that speculatively elides both its read and write paths
/// via hardware transactional memory.
#[derive(Debug)]
pub struct HtmRwMutex {
    state: RawRwLock,
    writer_flag: RawSpinLock,
    write_retry_limit: u32,
    read_retry_limit: u32,
}

impl HtmRwMutex {
    /// Create a new mutex using the default retry limits
    /// ([`crate::config::HTM_SHARED_WRITE_RETRY_LIMIT`] and
    /// [`crate::config::HTM_SHARED_READ_RETRY_LIMIT`]).
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::with_retry_limits(
            crate::config::HTM_SHARED_WRITE_RETRY_LIMIT,
            crate::config::HTM_SHARED_READ_RETRY_LIMIT,
        )
    }

    /// Create a new mutex with explicit retry limits.
    #[inline]
    #[must_use]
    pub const fn with_retry_limits(write_retry_limit: u32, read_retry_limit: u32) -> Self {
        Self {
            state: RawRwLock::new(),
            writer_flag: RawSpinLock::new(),
            write_retry_limit,
            read_retry_limit,
        }
    }
}

impl Default for HtmRwMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Lockable for HtmRwMutex {
    type Profile = HtmProfile;
}

impl Exclusive for HtmRwMutex {
    fn lock(&self, handle: &Handle<'_, Self>) {
        handle.enter();
        assert!(
            handle.status() == HandleStatus::Unlocked,
            "lock() on a handle that is not unlocked"
        );

        for _ in 0..self.write_retry_limit {
            // Only `state` is read before beginning: the writer flag exists
            // for readers' benefit, and an elided writer's own read-set
            // subscription to `state` already covers every other writer and
            // every fallback reader.
            self.state.unlock_wait();

            let status = htm::begin();
            if status.is_started() {
                if self.state.is_locked() {
                    htm::user_abort(WRITE_CONFLICT_ABORT_CODE);
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

        self.state.write_acquire();
        // Uncontended: `state`'s exclusive section already serializes
        // writers, so no other thread can be setting the flag concurrently.
        self.writer_flag.acquire_uncontended();
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
                // The writer flag and the reader/writer word's writer bit
                // were both set by this same exclusive acquisition, so this
                // release can never race a concurrent setter.
                self.writer_flag.release_uncontended();
                self.state.write_release();
                if let Some(profile) = handle.profile() {
                    profile.note_unlock();
                }
            }
            other => panic!("unlock() on a handle in state {other:?}"),
        }
        handle.set_status(HandleStatus::Unlocked);
    }
}

impl SharedLockable for HtmRwMutex {
    fn lock_shared(&self, handle: &Handle<'_, Self>) {
        handle.enter();
        assert!(
            handle.status() == HandleStatus::Unlocked,
            "lock_shared() on a handle that is not unlocked"
        );

        for _ in 0..self.read_retry_limit {
            self.writer_flag.unlock_wait();

            let status = htm::begin();
            if status.is_started() {
                if self.writer_flag.is_locked() {
                    htm::user_abort(READ_CONFLICT_ABORT_CODE);
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

        self.state.read_acquire();
        handle.set_status(HandleStatus::LockedShared);
    }

    fn unlock_shared(&self, handle: &Handle<'_, Self>) {
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
            HandleStatus::LockedShared => {
                self.state.read_release();
                if let Some(profile) = handle.profile() {
                    profile.note_unlock();
                }
            }
            other => panic!("unlock_shared() on a handle in state {other:?}"),
        }
        handle.set_status(HandleStatus::Unlocked);
    }
}
