//! Persistence layer for baton.
//!
//! - [`LockStore`]: one JSON record per locked path, replaced atomically
//! - [`KeyGuard`]: per-key OS file lock that serializes mutations
//!   of a single path without blocking other paths
//! - [`Journal`]: append-only NDJSON logs (audit events, preflight runs,
//!   handoff snapshots)
//!
//! Nothing here caches state in memory. Every read goes to disk, so a
//! restarted process sees exactly what was committed before the crash.

mod guard;
mod journal;
mod lock_table;


pub use guard::{GuardSettings, KeyGuard};
pub use journal::Journal;
pub use lock_table::{LockStore, record_key};
