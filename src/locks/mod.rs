//! Lock manager for baton.
//!
//! Locks are exclusive, per literal file path, and owned by an
//! `(agent_id, task_id)` pair. Every lock carries a ttl; there is no
//! wait-for-lock primitive. A denied caller retries later, picks different
//! files, or escalates outside baton.
//!
//! # Operations
//!
//! - [`LockManager::acquire`]: grant, re-enter, or deny; reclaims stale locks
//! - [`LockManager::acquire_batch`]: all-or-nothing acquire of several paths
//! - [`LockManager::release`] / [`LockManager::release_all`]
//! - [`LockManager::renew`]: extend the expiry of a held lock
//! - [`LockManager::sweep_expired`]: administrative stale-lock cleanup
//!
//! Each mutation runs under the per-key store guard of its path and is on
//! disk before the call returns.

mod manager;
mod path;
mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use manager::LockManager;
pub use path::normalize_path;
pub(crate) use types::format_duration;
pub use types::{
    AcquireOutcome, BatchOutcome, GrantKind, Lock, LockDenied, LockStatus, ReleaseOutcome,
    RenewOutcome,
};
