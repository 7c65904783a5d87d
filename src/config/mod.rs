//! Configuration model for baton.
//!
//! This module defines the Config struct that represents `.baton/config.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! defaults for every field, and validation of config values.

mod model;
mod operations;
pub mod types;


// Re-export public API
pub use model::Config;
pub use operations::MAX_DURATION_SECS;
pub use types::SuiteConfig;
