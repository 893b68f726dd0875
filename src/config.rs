//! Compile-time defaults (§6).
//!
//! These are the defaults every HTM-elided mutex is constructed with; each
//! constructor also accepts an explicit override (`with_retry_limit`), since
//! the retry budget is the one knob worth tuning per call site without a
//! rebuild.

/// Default number of transaction attempts for the HTM-elided exclusive mutex
/// before falling back to the plain spinlock.
pub const HTM_EXCLUSIVE_RETRY_LIMIT: u32 = 10;

/// Default number of transaction attempts for an HTM-elided shared mutex's
/// writer path before falling back to the reader/writer lock's write side.
pub const HTM_SHARED_WRITE_RETRY_LIMIT: u32 = 10;

/// Default number of transaction attempts for an HTM-elided shared mutex's
/// reader path before falling back to the reader/writer lock's read side.
pub const HTM_SHARED_READ_RETRY_LIMIT: u32 = 10;

/// `true` iff the `debug-handle-state` feature is enabled, i.e. handle
/// lifecycle preconditions are asserted (not just `debug_assert!`ed) on the
/// non-elided mutex kinds.
#[inline]
#[must_use]
pub const fn debug_handle_state_enabled() -> bool {
    cfg!(feature = "debug-handle-state")
}
