//! Preflight gate for baton.
//!
//! A preflight run executes named suites from configuration and then the
//! built-in handoff self-check. Command suites run in parallel; outcomes are
//! reported in declared order. The run's verdict is `failed` iff a required
//! suite failed.
//!
//! # Modes
//!
//! - `full`: the configured `full_suites`
//! - `quick`: the configured `quick_suites` (a subset of `full`)
//! - `handoff_only`: only the self-check
//!
//! Every run is appended to `history/preflight.ndjson` and its combined
//! output is written to `history/logs/<run_id>.log`.

mod gate;
mod runner;
mod types;


/// Reserved suite name of the built-in handoff self-check.
pub const HANDOFF_SUITE: &str = "handoff";

pub use gate::PreflightGate;
pub use runner::{SuiteRun, run_suite};
pub use types::{
    GateState, PreflightMode, PreflightOptions, PreflightResult, SuiteOutcome, SuiteStatus,
    Verdict,
};
