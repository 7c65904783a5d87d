//! Preflight options, outcomes and run records.

use crate::error::BatonError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which configured suite list a run starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreflightMode {
    #[default]
    Full,
    Quick,
    /// Only the handoff self-check (plus any extra suites).
    HandoffOnly,
}

impl std::fmt::Display for PreflightMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreflightMode::Full => write!(f, "full"),
            PreflightMode::Quick => write!(f, "quick"),
            PreflightMode::HandoffOnly => write!(f, "handoff_only"),
        }
    }
}

impl FromStr for PreflightMode {
    type Err = BatonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "full" => Ok(PreflightMode::Full),
            "quick" => Ok(PreflightMode::Quick),
            "handoff_only" => Ok(PreflightMode::HandoffOnly),
            other => Err(BatonError::UserError(format!(
                "unknown preflight mode '{}' (expected full, quick or handoff_only)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreflightOptions {
    pub mode: PreflightMode,
    /// Appended after the mode's suites; always required.
    pub extra_suites: Vec<String>,
    pub skip_handoff: bool,
    /// The finishing agent. The handoff self-check fails without one.
    pub agent_id: Option<String>,
}

impl PreflightOptions {
    pub fn new(mode: PreflightMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_extra_suite(mut self, name: impl Into<String>) -> Self {
        self.extra_suites.push(name.into());
        self
    }

    pub fn skip_handoff(mut self) -> Self {
        self.skip_handoff = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteStatus {
    Pass,
    Fail,
}

/// Result of one suite within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteOutcome {
    pub name: String,
    pub required: bool,
    pub status: SuiteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    pub duration_ms: u64,
}

impl SuiteOutcome {
    pub fn pass(name: impl Into<String>, required: bool, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            required,
            status: SuiteStatus::Pass,
            cause: None,
            duration_ms,
        }
    }

    pub fn fail(
        name: impl Into<String>,
        required: bool,
        cause: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            required,
            status: SuiteStatus::Fail,
            cause: Some(cause.into()),
            duration_ms,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == SuiteStatus::Pass
    }

    /// A failed required suite fails the whole run.
    pub fn is_blocking(&self) -> bool {
        self.required && !self.passed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Passed => write!(f, "passed"),
            Verdict::Failed => write!(f, "failed"),
        }
    }
}

/// One recorded preflight run. Appended to the preflight history, never
/// rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreflightResult {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub mode: PreflightMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Suite names in execution-report order.
    pub suites_run: Vec<String>,
    pub outcomes: Vec<SuiteOutcome>,
    pub verdict: Verdict,
    /// Path of the run's output log, relative to the store directory.
    pub log_reference: String,
}

impl PreflightResult {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Passed
    }

    pub fn failed_suites(&self) -> Vec<&SuiteOutcome> {
        self.outcomes.iter().filter(|o| !o.passed()).collect()
    }
}

/// Lifecycle of a [`super::PreflightGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Running,
    Passed,
    Failed,
}

impl From<Verdict> for GateState {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Passed => GateState::Passed,
            Verdict::Failed => GateState::Failed,
        }
    }
}
