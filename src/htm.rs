//! Hardware transactional memory intrinsic layer (C1).
//!
//! Four operations — `begin`, `commit`, `in_transaction`, `user_abort` — plus
//! a status-code taxonomy and the platform-dependent `is_restartable`
//! predicate. This module models the capability interface described in the
//! design notes: a portable, always-unavailable default, specialized at
//! compile time by an ISA-specific implementation when one is enabled. The
//! ISA lowering itself (RTM on x86_64, TME on AArch64) is a thin shim over
//! the hardware contract, not the interesting part of this module — the
//! interesting part is the status taxonomy and `is_restartable`, which the
//! elision protocol in [`htm_mutex`](crate::htm_mutex) and
//! [`htm_rwmutex`](crate::htm_rwmutex) consumes directly.

/// A bitset describing why a transaction did not commit, or that it is
/// currently executing.
///
/// `STARTED` is a sentinel distinct from every abort code: no abort path may
/// produce it, and `begin` returns exactly one of `STARTED` or a combination
/// of the abort bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(u32);

impl Status {
    /// Sentinel: the transaction is now executing.
    pub const STARTED: Status = Status(1 << 0);
    /// Hardware suggests the transaction may be profitably retried.
    pub const RETRY: Status = Status(1 << 1);
    /// `user_abort(code)` was executed; the code is embedded and extractable
    /// via [`Status::code`].
    pub const EXPLICIT: Status = Status(1 << 2);
    /// Data conflict with another hardware agent.
    pub const CONFLICT: Status = Status(1 << 3);
    /// Transactional footprint (cache capacity) exceeded.
    pub const CAPACITY: Status = Status(1 << 4);
    /// Abort originated from a nested transaction.
    pub const NESTED: Status = Status(1 << 5);
    /// A debug breakpoint inside the transaction fired.
    pub const DEBUG: Status = Status(1 << 6);
    /// The transaction was interrupted (e.g. by an asynchronous event).
    pub const INTERRUPT: Status = Status(1 << 7);
    /// A hardware-reported error not covered by the other buckets.
    pub const ERROR: Status = Status(1 << 8);
    /// No specific cause could be determined.
    pub const UNKNOWN: Status = Status(1 << 9);

    const EXPLICIT_CODE_SHIFT: u32 = 24;

    /// An empty status (no bits set).
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Status(0)
    }

    /// `true` iff every bit of `other` is set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Status) -> bool {
        self.0 & other.0 == other.0
    }

    /// Bitwise union of two statuses.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Status) -> Status {
        Status(self.0 | other.0)
    }

    /// `true` iff this is the `STARTED` sentinel.
    #[inline]
    #[must_use]
    pub const fn is_started(self) -> bool {
        self.0 == Self::STARTED.0
    }

    /// Build an `EXPLICIT` status carrying an 8-bit user abort code.
    #[inline]
    #[must_use]
    pub const fn with_code(code: u8) -> Self {
        Status(Self::EXPLICIT.0 | ((code as u32) << Self::EXPLICIT_CODE_SHIFT))
    }

    /// The embedded 8-bit code, if this status carries `EXPLICIT`.
    #[inline]
    #[must_use]
    pub const fn code(self) -> Option<u8> {
        if self.contains(Self::EXPLICIT) {
            Some((self.0 >> Self::EXPLICIT_CODE_SHIFT) as u8)
        } else {
            None
        }
    }

    /// Classify this status into exactly one profile-counter bucket.
    ///
    /// Hardware can report more than one bit at once; the profile only has
    /// one counter per bucket (§4.6), so ties are broken by priority:
    /// `EXPLICIT` (most actionable — the caller chose this), then
    /// `CAPACITY` (a durable signal unlikely to clear on retry), then
    /// `CONFLICT`, then `NESTED`, else `OTHER`.
    #[inline]
    #[must_use]
    pub const fn abort_bucket(self) -> AbortBucket {
        if self.contains(Self::EXPLICIT) {
            AbortBucket::Explicit
        } else if self.contains(Self::CAPACITY) {
            AbortBucket::Capacity
        } else if self.contains(Self::CONFLICT) {
            AbortBucket::Conflict
        } else if self.contains(Self::NESTED) {
            AbortBucket::Nested
        } else {
            AbortBucket::Other
        }
    }
}

/// The five abort-cause buckets an [`HtmProfile`](crate::profile::HtmProfile)
/// tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortBucket {
    /// `Status::EXPLICIT`.
    Explicit,
    /// `Status::CONFLICT`.
    Conflict,
    /// `Status::CAPACITY`.
    Capacity,
    /// `Status::NESTED`.
    Nested,
    /// Any other abort cause (`DEBUG`, `INTERRUPT`, `ERROR`, `UNKNOWN`, or a
    /// bare `RETRY` with no other bucket set).
    Other,
}

/// `true` when `status` indicates the transaction may be profitably retried.
///
/// The mask is platform-dependent: on x86_64/RTM, `EXPLICIT | RETRY |
/// CONFLICT` are all considered worth another attempt (RTM's own abort-status
/// convention marks plain conflicts and explicit aborts as commonly
/// transient); on other platforms, only an explicit `RETRY` hint is trusted.
#[inline]
#[must_use]
pub fn is_restartable(status: Status) -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        status.contains(Status::EXPLICIT)
            || status.contains(Status::RETRY)
            || status.contains(Status::CONFLICT)
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        status.contains(Status::RETRY)
    }
}

/// `true` iff this platform/build exposes a hardware transactional memory
/// facility that `begin`/`commit`/`in_transaction`/`user_abort` can use.
///
/// Matches §6's platform requirement: in the absence of HTM, callers must
/// fall back to the null/plain variants (or, for the HTM-elided types, the
/// retry loop degenerates to a single unconditional fallback acquire with no
/// aborts counted — see `htm_mutex`/`htm_rwmutex`).
#[inline]
#[must_use]
pub const fn is_available() -> bool {
    cfg!(all(target_arch = "x86_64", target_feature = "rtm"))
        || cfg!(all(target_arch = "aarch64", target_feature = "tme"))
}

/// Begin a hardware transaction on the calling thread.
///
/// Returns `Status::STARTED` when a transaction is now executing; otherwise
/// returns the abort status produced by the attempt. Must be called with no
/// transaction already open on this thread at the outermost elision layer
/// (callers ensure this by construction — the elision protocol never nests
/// user-level `begin` calls).
#[inline]
pub fn begin() -> Status {
    #[cfg(all(target_arch = "x86_64", target_feature = "rtm"))]
    {
        x86::begin()
    }
    #[cfg(all(target_arch = "aarch64", target_feature = "tme"))]
    {
        aarch64::begin()
    }
    #[cfg(not(any(
        all(target_arch = "x86_64", target_feature = "rtm"),
        all(target_arch = "aarch64", target_feature = "tme")
    )))]
    {
        portable::begin()
    }
}

/// Attempt to atomically publish all speculative side effects of the current
/// transaction.
///
/// Must only be called inside a live transaction (i.e. after `begin`
/// returned `STARTED` and before any `user_abort`). On failure, control does
/// not return here — the hardware restarts execution at the matching
/// `begin`, which then returns an abort status.
#[inline]
pub fn commit() {
    #[cfg(all(target_arch = "x86_64", target_feature = "rtm"))]
    {
        x86::commit()
    }
    #[cfg(all(target_arch = "aarch64", target_feature = "tme"))]
    {
        aarch64::commit()
    }
    #[cfg(not(any(
        all(target_arch = "x86_64", target_feature = "rtm"),
        all(target_arch = "aarch64", target_feature = "tme")
    )))]
    {
        portable::commit()
    }
}

/// `true` iff the calling thread is currently inside a transaction.
///
/// Used to distinguish an outermost commit from a commit that is merely
/// resuming an enclosing transaction (the elision protocol never creates the
/// latter case itself, but the primitive must still answer correctly).
#[inline]
#[must_use]
pub fn in_transaction() -> bool {
    #[cfg(all(target_arch = "x86_64", target_feature = "rtm"))]
    {
        x86::in_transaction()
    }
    #[cfg(all(target_arch = "aarch64", target_feature = "tme"))]
    {
        aarch64::in_transaction()
    }
    #[cfg(not(any(
        all(target_arch = "x86_64", target_feature = "rtm"),
        all(target_arch = "aarch64", target_feature = "tme")
    )))]
    {
        portable::in_transaction()
    }
}

/// Abort the current transaction, embedding an 8-bit code in the status the
/// matching `begin` returns.
///
/// Must only be called inside a live transaction.
#[inline]
pub fn user_abort(code: u8) -> ! {
    #[cfg(all(target_arch = "x86_64", target_feature = "rtm"))]
    {
        x86::user_abort(code)
    }
    #[cfg(all(target_arch = "aarch64", target_feature = "tme"))]
    {
        aarch64::user_abort(code)
    }
    #[cfg(not(any(
        all(target_arch = "x86_64", target_feature = "rtm"),
        all(target_arch = "aarch64", target_feature = "tme")
    )))]
    {
        portable::user_abort(code)
    }
}

/// The software fallback used whenever no HTM facility is compiled in.
///
/// `begin` never returns `STARTED`, so `commit`/`user_abort` are unreachable
/// in practice — the elision protocol only calls them after a `STARTED`
/// `begin`.
mod portable {
    use super::Status;

    pub fn begin() -> Status {
        Status::UNKNOWN
    }

    pub fn commit() {
        debug_assert!(false, "commit() called with no transaction open");
    }

    pub fn in_transaction() -> bool {
        false
    }

    pub fn user_abort(_code: u8) -> ! {
        unreachable!("user_abort() called with no transaction open")
    }
}

/// x86_64 lowering onto RTM (`XBEGIN`/`XEND`/`XABORT`/`XTEST`).
#[cfg(all(target_arch = "x86_64", target_feature = "rtm"))]
mod x86 {
    use super::Status;
    use core::arch::x86_64::{
        _XABORT_CAPACITY, _XABORT_CONFLICT, _XABORT_DEBUG, _XABORT_EXPLICIT, _XABORT_NESTED,
        _XABORT_RETRY, _xabort, _xbegin, _xend, _xtest,
    };

    const XBEGIN_STARTED: u32 = !0u32;

    pub fn begin() -> Status {
        // SAFETY: `_xbegin` is the RTM transaction-begin instruction; this
        // module is only compiled when the `rtm` target feature is enabled.
        let code = unsafe { _xbegin() };
        if code == XBEGIN_STARTED {
            return Status::STARTED;
        }
        classify(code)
    }

    fn classify(code: u32) -> Status {
        let mut status = Status::empty();
        if code & _XABORT_EXPLICIT != 0 {
            let user_code = (code >> 24) as u8;
            status = status.union(Status::with_code(user_code));
        }
        if code & _XABORT_RETRY != 0 {
            status = status.union(Status::RETRY);
        }
        if code & _XABORT_CONFLICT != 0 {
            status = status.union(Status::CONFLICT);
        }
        if code & _XABORT_CAPACITY != 0 {
            status = status.union(Status::CAPACITY);
        }
        if code & _XABORT_DEBUG != 0 {
            status = status.union(Status::DEBUG);
        }
        if code & _XABORT_NESTED != 0 {
            status = status.union(Status::NESTED);
        }
        if status == Status::empty() {
            status = Status::UNKNOWN;
        }
        status
    }

    pub fn commit() {
        // SAFETY: only called while a transaction started by `begin` is
        // live, per this module's contract.
        unsafe { _xend() }
    }

    pub fn in_transaction() -> bool {
        // SAFETY: `_xtest` may be called unconditionally; it reports whether
        // the calling thread is inside a transaction.
        unsafe { _xtest() != 0 }
    }

    pub fn user_abort(code: u8) -> ! {
        // SAFETY: only called while a transaction started by `begin` is
        // live. `_xabort` does not return; control resumes at `begin`.
        unsafe { _xabort(code) }
        unreachable!("_xabort does not return")
    }
}

/// AArch64 lowering onto TME (`TSTART`/`TCOMMIT`/`TCANCEL`/`TTEST`).
///
/// TME's failure-reason encoding in `Xt` after `TSTART` mirrors RTM's
/// abort-status bitset closely enough that the same [`Status`] taxonomy
/// applies; bit positions below follow the Arm Architecture Reference
/// Manual's `TMFailure` register layout.
#[cfg(all(target_arch = "aarch64", target_feature = "tme"))]
mod aarch64 {
    use super::Status;
    use core::arch::asm;

    const REASON_RETRY: u64 = 1 << 0;
    const REASON_CONFLICT: u64 = 1 << 5;
    const REASON_CAPACITY: u64 = 1 << 6;
    const REASON_DEBUG: u64 = 1 << 10;
    const REASON_NEST: u64 = 1 << 9;
    const REASON_EXPLICIT_SHIFT: u64 = 24;
    const REASON_EXPLICIT: u64 = 1 << 24;

    pub fn begin() -> Status {
        let reason: u64;
        // SAFETY: TSTART is only emitted when the `tme` target feature is
        // enabled; the destination register receives 0 on a successfully
        // started transaction and a failure-reason code otherwise.
        unsafe {
            asm!("tstart {0:x}", out(reg) reason, options(nostack));
        }
        if reason == 0 {
            return Status::STARTED;
        }
        classify(reason)
    }

    fn classify(reason: u64) -> Status {
        let mut status = Status::empty();
        if reason & REASON_EXPLICIT != 0 {
            let user_code = ((reason >> REASON_EXPLICIT_SHIFT) & 0xFF) as u8;
            status = status.union(Status::with_code(user_code));
        }
        if reason & REASON_RETRY != 0 {
            status = status.union(Status::RETRY);
        }
        if reason & REASON_CONFLICT != 0 {
            status = status.union(Status::CONFLICT);
        }
        if reason & REASON_CAPACITY != 0 {
            status = status.union(Status::CAPACITY);
        }
        if reason & REASON_DEBUG != 0 {
            status = status.union(Status::DEBUG);
        }
        if reason & REASON_NEST != 0 {
            status = status.union(Status::NESTED);
        }
        if status == Status::empty() {
            status = Status::UNKNOWN;
        }
        status
    }

    pub fn commit() {
        // SAFETY: only called while a transaction started by `begin` is
        // live.
        unsafe {
            asm!("tcommit", options(nostack));
        }
    }

    pub fn in_transaction() -> bool {
        let in_tx: u64;
        // SAFETY: TTEST may be called unconditionally.
        unsafe {
            asm!("ttest {0:x}", out(reg) in_tx, options(nostack, nomem, pure));
        }
        in_tx != 0
    }

    pub fn user_abort(code: u8) -> ! {
        let imm = (code as u64) << REASON_EXPLICIT_SHIFT | REASON_EXPLICIT;
        // SAFETY: only called while a transaction started by `begin` is
        // live. TCANCEL does not return; control resumes at `begin`.
        unsafe {
            asm!("tcancel {0}", in(reg) imm, options(noreturn));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn started_is_distinct_from_every_abort_bit() {
        assert!(Status::STARTED.is_started());
        assert!(!Status::RETRY.is_started());
        assert!(!Status::EXPLICIT.is_started());
    }

    #[test]
    fn explicit_code_round_trips() {
        let status = Status::with_code(42);
        assert_eq!(status.code(), Some(42));
        assert!(status.contains(Status::EXPLICIT));
    }

    #[test]
    fn non_explicit_status_has_no_code() {
        assert_eq!(Status::CONFLICT.code(), None);
    }

    #[test]
    fn abort_bucket_priority() {
        let both = Status::CAPACITY.union(Status::CONFLICT);
        assert_eq!(both.abort_bucket(), AbortBucket::Capacity);

        let explicit_and_capacity = Status::with_code(1).union(Status::CAPACITY);
        assert_eq!(explicit_and_capacity.abort_bucket(), AbortBucket::Explicit);

        assert_eq!(Status::NESTED.abort_bucket(), AbortBucket::Nested);
        assert_eq!(Status::DEBUG.abort_bucket(), AbortBucket::Other);
        assert_eq!(Status::RETRY.abort_bucket(), AbortBucket::Other);
    }

    #[cfg(not(any(
        all(target_arch = "x86_64", target_feature = "rtm"),
        all(target_arch = "aarch64", target_feature = "tme")
    )))]
    #[test]
    fn portable_begin_never_starts() {
        let status = begin();
        assert!(!status.is_started());
        assert!(!in_transaction());
    }

    #[test]
    fn is_restartable_treats_retry_as_restartable_everywhere() {
        assert!(is_restartable(Status::RETRY));
    }

    #[test]
    fn is_restartable_treats_unknown_as_terminal() {
        assert!(!is_restartable(Status::UNKNOWN));
    }
}
