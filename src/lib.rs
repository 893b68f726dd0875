//! # tle
//!
//! User-space synchronization primitives with hardware transactional memory
//! (HTM) lock elision.
//!
//! This library provides spinlocks and reader/writer locks whose acquisition
//! can be speculatively elided via a hardware transaction (x86 RTM, AArch64
//! TME) instead of actually taking the fallback lock — so long as no other
//! thread is concurrently holding it. A transaction that aborts, or a
//! platform with no HTM support at all, simply falls back to acquiring the
//! real lock.
//!
//! ## Module organization
//!
//! ### Foundation
//! - [`pr`] — the portable spin-wait hint
//! - [`mod@backoff`] — exponential backoff for contention management
//!
//! ### Raw lock words
//! - [`spinlock`] — test-and-set spinlock with `unlock_wait`
//! - [`rwlock`] — reader/writer spinlock with writer priority
//! - [`htm`] — hardware transaction primitives and abort-status taxonomy
//!
//! ### Per-thread state and observability
//! - [`handle`] — handle lifecycle state machine and the `Lockable`/
//!   `Exclusive`/`SharedLockable` capability traits
//! - [`profile`] — lock-acquisition and elision counters
//! - [`config`] — compile-time defaults
//!
//! ### Mutex kinds
//! - [`mutex`] — null and plain (non-elided) exclusive mutexes
//! - [`shared_mutex`] — null and plain (non-elided) shared mutexes
//! - [`htm_mutex`] — HTM-elided exclusive mutex
//! - [`htm_rwmutex`] — HTM-elided shared mutex
//!
//! ### Ergonomics
//! - [`scoped`] — RAII scoped-acquisition guards
//!
//! ## Example
//!
//! ```
//! use tle::handle::Handle;
//! use tle::htm_mutex::HtmMutex;
//! use tle::scoped::ScopedLock;
//!
//! let mutex = HtmMutex::new();
//! let handle = Handle::new(&mutex, None);
//!
//! {
//!     let _guard = ScopedLock::new(&handle);
//!     // critical section
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "std", test))]
extern crate std;

// =============================================================================
// Foundation
// =============================================================================

/// The portable spin-wait hint.
pub mod pr;

/// Exponential backoff for contention management.
pub mod backoff;

// =============================================================================
// Raw lock words
// =============================================================================

/// Test-and-set spinlock with `unlock_wait`.
pub mod spinlock;

/// Reader/writer spinlock with writer priority.
pub mod rwlock;

/// Hardware transaction primitives and the abort-status taxonomy.
pub mod htm;

// =============================================================================
// Per-thread state and observability
// =============================================================================

/// Handle lifecycle state machine and lockable capability traits.
pub mod handle;

/// Lock-acquisition and elision profile counters.
pub mod profile;

/// Compile-time defaults.
pub mod config;

// =============================================================================
// Mutex kinds
// =============================================================================

/// Null and plain (non-elided) exclusive mutexes.
pub mod mutex;

/// Null and plain (non-elided) shared mutexes.
pub mod shared_mutex;

/// HTM-elided exclusive mutex.
#[cfg(feature = "htm")]
pub mod htm_mutex;

/// HTM-elided shared mutex.
#[cfg(feature = "htm")]
pub mod htm_rwmutex;

// =============================================================================
// Ergonomics
// =============================================================================

/// RAII scoped-acquisition guards.
pub mod scoped;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use handle::{Exclusive, Handle, HandleStatus, Lockable, SharedLockable};
#[cfg(feature = "htm")]
pub use htm_mutex::HtmMutex;
#[cfg(feature = "htm")]
pub use htm_rwmutex::HtmRwMutex;
pub use mutex::{NullMutex, SpinMutex};
pub use scoped::{ScopedLock, ScopedSharedLock};
pub use shared_mutex::{NullSharedMutex, RwMutex};
