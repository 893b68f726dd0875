//! Portable spin-wait primitive.
//!
//! `spinlock.rs` (C2) and `rwlock.rs` (C3) operate on their lock words
//! directly via `core::sync::atomic`/`loom::sync::atomic` — each lock word
//! has its own ordering discipline per bit, so a generic wrapper over it
//! would just be indirection. The one piece of genuinely portable, shared
//! behavior is the CPU pause/yield hint every spin loop in this crate backs
//! off with; that is what this module provides.

#[cfg(loom)]
use loom::thread;

/// CPU stall/pause hint for spin loops.
///
/// Reduces power consumption and resource contention in spin-wait loops
/// (`pause` on x86, the `yield`/`wfe` family on AArch64, a no-op elsewhere).
#[cfg(not(loom))]
#[inline(always)]
pub fn stall() {
    core::hint::spin_loop();
}

#[cfg(loom)]
#[inline(always)]
pub fn stall() {
    thread::yield_now();
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn stall_does_not_panic() {
        stall();
    }
}
