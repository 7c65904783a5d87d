//! Filesystem utilities for baton.
//!
//! Every durable record (lock, context, config) is written through
//! [`atomic_write`] so readers observe either the previous or the new content.

pub mod atomic;

pub use atomic::atomic_write;
pub use atomic::atomic_write_file;
