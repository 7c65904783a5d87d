//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for a baton store.
///
/// This struct represents the contents of `.baton/config.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Lock ttl in seconds when the caller does not pass one.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Upper bound for a requested ttl; larger requests are clamped.
    #[serde(default = "default_max_ttl_secs")]
    pub max_ttl_secs: u64,

    /// Maximum time to wait for a per-key store guard.
    #[serde(default = "default_guard_timeout_ms")]
    pub guard_timeout_ms: u64,

    // =========================================================================
    // Context settings
    // =========================================================================
    /// Seconds after which an agent context is reported as stale.
    #[serde(default = "default_context_stale_secs")]
    pub context_stale_secs: u64,

    // =========================================================================
    // Preflight settings
    // =========================================================================
    /// Named suites available to the preflight gate.
    #[serde(default = "default_suites")]
    pub suites: BTreeMap<String, SuiteConfig>,

    /// Ordered suites run in `full` mode.
    #[serde(default = "default_full_suites")]
    pub full_suites: Vec<String>,

    /// Ordered suites run in `quick` mode. Must be a subset of `full_suites`.
    #[serde(default = "default_quick_suites")]
    pub quick_suites: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            max_ttl_secs: default_max_ttl_secs(),
            guard_timeout_ms: default_guard_timeout_ms(),
            context_stale_secs: default_context_stale_secs(),
            suites: default_suites(),
            full_suites: default_full_suites(),
            quick_suites: default_quick_suites(),
        }
    }
}
