//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{BatonError, Result};
use chrono::Duration;
use std::path::Path;

/// Upper bound for any configured duration in seconds (100 years).
pub const MAX_DURATION_SECS: u64 = 100 * 365 * 86_400;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            BatonError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from `path`, or fall back to defaults when the file is absent.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| BatonError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| BatonError::UserError(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values.
    ///
    /// Validation rules:
    /// - ttl, staleness and guard settings must be positive
    /// - ttl and staleness settings must not exceed [`MAX_DURATION_SECS`]
    /// - `default_ttl_secs` must not exceed `max_ttl_secs`
    /// - every suite has a non-empty command and is not named `handoff`
    /// - `full_suites` and `quick_suites` only name configured suites
    /// - every quick suite is also a full suite
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("default_ttl_secs", self.default_ttl_secs),
            ("max_ttl_secs", self.max_ttl_secs),
            ("context_stale_secs", self.context_stale_secs),
            ("guard_timeout_ms", self.guard_timeout_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(invalid(format!("{} must be greater than 0", name)));
            }
        }

        let bounded = [
            ("default_ttl_secs", self.default_ttl_secs),
            ("max_ttl_secs", self.max_ttl_secs),
            ("context_stale_secs", self.context_stale_secs),
        ];
        for (name, value) in bounded {
            if value > MAX_DURATION_SECS {
                return Err(invalid(format!(
                    "{} ({}) must not exceed {}",
                    name, value, MAX_DURATION_SECS
                )));
            }
        }

        if self.default_ttl_secs > self.max_ttl_secs {
            return Err(invalid(format!(
                "default_ttl_secs ({}) must not exceed max_ttl_secs ({})",
                self.default_ttl_secs, self.max_ttl_secs
            )));
        }

        for (name, suite) in &self.suites {
            if name == crate::preflight::HANDOFF_SUITE {
                return Err(invalid(format!(
                    "suite name '{}' is reserved for the handoff self-check",
                    name
                )));
            }
            if suite.command.trim().is_empty() {
                return Err(invalid(format!("suite '{}' has an empty command", name)));
            }
        }

        for (list, names) in [("full_suites", &self.full_suites), ("quick_suites", &self.quick_suites)] {
            for name in names {
                if !self.suites.contains_key(name) {
                    return Err(invalid(format!("{} names unknown suite '{}'", list, name)));
                }
            }
        }

        if let Some(extra) = self
            .quick_suites
            .iter()
            .find(|name| !self.full_suites.contains(name))
        {
            return Err(invalid(format!(
                "quick suite '{}' is not part of full_suites",
                extra
            )));
        }

        Ok(())
    }

    /// Resolve a requested ttl in seconds against the configured default and cap.
    ///
    /// Returns an error for an explicit ttl of zero, or for a ttl above
    /// [`MAX_DURATION_SECS`] (only reachable with an unvalidated config).
    pub fn effective_ttl(&self, requested_secs: Option<u64>) -> Result<Duration> {
        let secs = match requested_secs {
            Some(0) => {
                return Err(BatonError::UserError(
                    "ttl must be greater than 0 seconds".to_string(),
                ));
            }
            Some(secs) => secs.min(self.max_ttl_secs),
            None => self.default_ttl_secs,
        };
        if secs > MAX_DURATION_SECS {
            return Err(BatonError::UserError(format!(
                "ttl of {} seconds exceeds the limit of {}",
                secs, MAX_DURATION_SECS
            )));
        }
        Ok(Duration::seconds(secs as i64))
    }

    /// Context staleness threshold as a duration.
    pub fn context_stale_after(&self) -> Duration {
        Duration::seconds(self.context_stale_secs.min(MAX_DURATION_SECS) as i64)
    }
}

fn invalid(msg: String) -> BatonError {
    BatonError::UserError(format!("config validation failed: {}", msg))
}
