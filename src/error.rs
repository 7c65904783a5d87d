//! Error types for baton.
//!
//! Only failures that abort an operation live here. Lock denials, ownership
//! mismatches, gate failures and blocked handoffs are ordinary outcomes and are
//! returned as typed enums by the operations that produce them.

use crate::exit_codes;
use std::path::Path;
use thiserror::Error;

/// Main error type for baton operations.
#[derive(Error, Debug)]
pub enum BatonError {
    /// Invalid arguments, invalid configuration, or the store is missing.
    #[error("{0}")]
    UserError(String),

    /// Persistence failed. The operation was aborted before any partial
    /// record became visible.
    #[error("Lock store failure: {0}")]
    Store(String),

    /// The per-key guard for a path could not be taken in time.
    #[error("Timed out waiting for store guard on '{0}'")]
    GuardTimeout(String),
}

impl BatonError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            BatonError::UserError(_) => exit_codes::USER_ERROR,
            BatonError::Store(_) => exit_codes::STORE_FAILURE,
            BatonError::GuardTimeout(_) => exit_codes::STORE_FAILURE,
        }
    }

    /// Build a store error for an I/O failure on `path`.
    pub(crate) fn io(action: &str, path: &Path, err: std::io::Error) -> Self {
        BatonError::Store(format!("failed to {} '{}': {}", action, path.display(), err))
    }
}

/// Result type alias for baton operations.
pub type Result<T> = std::result::Result<T, BatonError>;
