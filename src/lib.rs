//! Baton: file-backed coordination for agents sharing one repository.
//!
//! Agents take exclusive, ttl-bound locks on literal file paths, declare
//! their focus area, inspect conflicts before planning, run a preflight gate
//! before finishing, and record a handoff snapshot. All state lives under
//! `.baton/` and is read from disk on every call.

pub mod baton;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fingerprint;
pub mod fs;
pub mod handoff;
pub mod inspect;
pub mod locks;
pub mod preflight;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use baton::{Baton, StatusSummary};
