//! Per-thread handle state machine and the lockable capability traits (C5 +
//! the generic-mutex-family design note in §9).
//!
//! A handle is per-thread, per-mutex state: it is not shared across threads,
//! so every field here is plain (`Cell`), never atomic. Multiple handles may
//! reference one mutex — each thread gets its own — but a given handle is
//! used by exactly one thread.

use core::cell::Cell;

use crate::profile::Profile;

/// Handle lifecycle status (§3).
///
/// A handle transitions `Unknown -> Unlocked` on first use, then oscillates
/// among `Unlocked`, `LockedUnique`/`LockedShared`/`Elided`. It may only be
/// destroyed while `Unlocked` (or still `Unknown`, if it was never used).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStatus {
    /// Never yet used.
    Unknown,
    /// Not currently holding the mutex.
    Unlocked,
    /// Holding the mutex exclusively via the fallback lock.
    LockedUnique,
    /// Holding the mutex for reading via the fallback lock.
    LockedShared,
    /// Holding the mutex via a live (or just-committed) HTM transaction.
    Elided,
}

/// Asserts a handle-state precondition.
///
/// Non-elided variants gate this behind the `debug-handle-state` feature
/// (§6's `DEBUG_HANDLE_STATE` knob — independent of Rust's own
/// `debug_assertions`, since a caller may want contract checking in an
/// optimized build too, or may want it off even in a debug build). The
/// HTM-elided variants never use this macro: their unlock must dispatch on
/// status correctly to function at all, so the check there is unconditional.
macro_rules! assert_handle_state {
    ($cond:expr, $($arg:tt)*) => {
        if crate::config::debug_handle_state_enabled() {
            assert!($cond, $($arg)*);
        }
    };
}
pub(crate) use assert_handle_state;

/// Per-thread, per-mutex state (C5).
///
/// Holds a non-owning reference to the mutex it is bound to, its own status,
/// and an optional reference to a profile block the owning thread keeps
/// alive for at least as long as the handle (profiles are per-handle, not
/// per-mutex, so that independent threads' counters can simply be summed
/// after joining — see [`Profile::accumulate`]).
pub struct Handle<'m, M: Lockable + ?Sized> {
    mutex: &'m M,
    status: Cell<HandleStatus>,
    profile: Option<&'m M::Profile>,
}

impl<'m, M: Lockable + ?Sized> Handle<'m, M> {
    /// Bind a new handle to `mutex`, optionally attaching a profile block.
    #[inline]
    pub fn new(mutex: &'m M, profile: Option<&'m M::Profile>) -> Self {
        Self {
            mutex,
            status: Cell::new(HandleStatus::Unknown),
            profile,
        }
    }

    /// The mutex this handle is bound to.
    #[inline]
    pub fn mutex(&self) -> &'m M {
        self.mutex
    }

    /// The current lifecycle status.
    #[inline]
    pub fn status(&self) -> HandleStatus {
        self.status.get()
    }

    /// The attached profile block, if any.
    #[inline]
    pub fn profile(&self) -> Option<&'m M::Profile> {
        self.profile
    }

    /// Transitions `Unknown -> Unlocked` on first use; otherwise a no-op.
    #[inline]
    pub(crate) fn enter(&self) {
        if self.status.get() == HandleStatus::Unknown {
            self.status.set(HandleStatus::Unlocked);
        }
    }

    #[inline]
    pub(crate) fn set_status(&self, status: HandleStatus) {
        self.status.set(status);
    }
}

impl<M: Lockable + ?Sized> Drop for Handle<'_, M> {
    fn drop(&mut self) {
        debug_assert!(
            matches!(
                self.status.get(),
                HandleStatus::Unknown | HandleStatus::Unlocked
            ),
            "handle destroyed while still locked"
        );
    }
}

/// A mutex kind that can be used with a [`Handle`].
///
/// This is the capability the generic-programming shim in the original
/// library would have layered its six mutex kinds onto; here it is a plain
/// trait with an associated [`Profile`] type, so a handle's profile pointer
/// is statically tied to the kind of mutex it is bound to.
pub trait Lockable {
    /// The profile-counter type this mutex kind uses.
    type Profile: Profile;
}

/// A [`Lockable`] that supports exclusive acquisition.
pub trait Exclusive: Lockable {
    /// Acquire the mutex exclusively, blocking until it is held.
    fn lock(&self, handle: &Handle<'_, Self>)
    where
        Self: Sized;

    /// Release an exclusive hold acquired via [`lock`](Self::lock).
    fn unlock(&self, handle: &Handle<'_, Self>)
    where
        Self: Sized;
}

/// A [`Lockable`] that additionally supports shared (reader) acquisition.
pub trait SharedLockable: Lockable {
    /// Acquire the mutex for shared (read) access, blocking until held.
    fn lock_shared(&self, handle: &Handle<'_, Self>)
    where
        Self: Sized;

    /// Release a shared hold acquired via [`lock_shared`](Self::lock_shared).
    fn unlock_shared(&self, handle: &Handle<'_, Self>)
    where
        Self: Sized;
}
