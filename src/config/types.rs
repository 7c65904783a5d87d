//! Configuration types and defaults for baton.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named preflight suite: one command run from the repository root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Command to execute (shell-words parsed; no shell).
    pub command: String,

    /// Whether a failure of this suite fails the gate.
    #[serde(default = "default_true")]
    pub required: bool,

    /// Kill the command after this many seconds (no limit when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl SuiteConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            required: true,
            timeout_secs: None,
        }
    }
}

pub(crate) fn default_suites() -> BTreeMap<String, SuiteConfig> {
    let mut suites = BTreeMap::new();
    suites.insert("fmt".to_string(), SuiteConfig::new("cargo fmt --check"));
    suites.insert(
        "lint".to_string(),
        SuiteConfig::new("cargo clippy --all-targets -- -D warnings"),
    );
    suites.insert("build".to_string(), SuiteConfig::new("cargo build"));
    suites.insert("test".to_string(), SuiteConfig::new("cargo test"));
    suites
}

pub(crate) fn default_full_suites() -> Vec<String> {
    vec![
        "fmt".to_string(),
        "lint".to_string(),
        "build".to_string(),
        "test".to_string(),
    ]
}

pub(crate) fn default_quick_suites() -> Vec<String> {
    vec!["fmt".to_string(), "build".to_string()]
}

// Default value functions for serde
pub(crate) fn default_ttl_secs() -> u64 {
    900
}
pub(crate) fn default_max_ttl_secs() -> u64 {
    86_400
}
pub(crate) fn default_context_stale_secs() -> u64 {
    1_800
}
pub(crate) fn default_guard_timeout_ms() -> u64 {
    5_000
}
pub(crate) fn default_true() -> bool {
    true
}
