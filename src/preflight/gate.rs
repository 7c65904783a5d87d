//! The preflight gate: plan, run, record.

use super::HANDOFF_SUITE;
use super::runner::{SuiteRun, run_suite};
use super::types::{
    GateState, PreflightMode, PreflightOptions, PreflightResult, SuiteOutcome, Verdict,
};
use crate::config::{Config, SuiteConfig};
use crate::context::StoreContext;
use crate::error::{BatonError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::fs::atomic_write_file;
use crate::handoff::HandoffRecorder;
use crate::store::Journal;
use chrono::Utc;
use serde_json::json;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use uuid::Uuid;

/// One planned entry of a run.
#[derive(Debug, Clone)]
enum PlannedSuite {
    Command {
        name: String,
        suite: SuiteConfig,
        required: bool,
    },
    Unknown {
        name: String,
    },
}

/// Runs configured suites and the handoff self-check, and records results.
///
/// The gate only reads the lock table.
#[derive(Debug)]
pub struct PreflightGate {
    repo_root: PathBuf,
    store_dir: PathBuf,
    logs_dir: PathBuf,
    config: Config,
    handoffs: HandoffRecorder,
    history: Journal<PreflightResult>,
    events: EventLog,
    state: Mutex<GateState>,
}

impl PreflightGate {
    pub fn new(ctx: &StoreContext, config: Config, handoffs: HandoffRecorder) -> Self {
        Self {
            repo_root: ctx.repo_root.clone(),
            store_dir: ctx.store_dir.clone(),
            logs_dir: ctx.logs_dir(),
            config,
            handoffs,
            history: Journal::new(ctx.preflight_file()),
            events: EventLog::new(ctx),
            state: Mutex::new(GateState::Idle),
        }
    }

    pub fn state(&self) -> GateState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: GateState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Execute one preflight run and append it to the history.
    ///
    /// Suite failures are reported in the result's verdict. Only invalid
    /// options and store failures are errors.
    pub fn run(&self, options: &PreflightOptions) -> Result<PreflightResult> {
        let plan = self.plan(options)?;
        let run_handoff = !options.skip_handoff;

        let previous = self.state();
        self.set_state(GateState::Running);
        let result = self.execute(options, &plan, run_handoff);
        match &result {
            Ok(run) => self.set_state(run.verdict.into()),
            Err(_) => self.set_state(previous),
        }
        result
    }

    /// Resolve the ordered suite list for `options`.
    fn plan(&self, options: &PreflightOptions) -> Result<Vec<PlannedSuite>> {
        if options.mode == PreflightMode::HandoffOnly && options.skip_handoff {
            return Err(BatonError::UserError(
                "handoff_only with skip_handoff leaves nothing to run".to_string(),
            ));
        }
        if options.extra_suites.iter().any(|s| s == HANDOFF_SUITE) {
            return Err(BatonError::UserError(format!(
                "'{}' is the built-in self-check; it runs unless skipped",
                HANDOFF_SUITE
            )));
        }

        let base: &[String] = match options.mode {
            PreflightMode::Full => &self.config.full_suites,
            PreflightMode::Quick => &self.config.quick_suites,
            PreflightMode::HandoffOnly => &[],
        };

        let mut names: Vec<(&str, bool)> = base.iter().map(|n| (n.as_str(), false)).collect();
        for extra in &options.extra_suites {
            let extra = extra.trim();
            if !extra.is_empty() && !names.iter().any(|(n, _)| *n == extra) {
                names.push((extra, true));
            }
        }

        Ok(names
            .into_iter()
            .map(|(name, forced_required)| match self.config.suites.get(name) {
                Some(suite) => PlannedSuite::Command {
                    name: name.to_string(),
                    required: suite.required || forced_required,
                    suite: suite.clone(),
                },
                None => PlannedSuite::Unknown {
                    name: name.to_string(),
                },
            })
            .collect())
    }

    fn execute(
        &self,
        options: &PreflightOptions,
        plan: &[PlannedSuite],
        run_handoff: bool,
    ) -> Result<PreflightResult> {
        let run_id = Uuid::new_v4().to_string();
        let timestamp = Utc::now();
        tracing::info!(run_id = %run_id, mode = %options.mode, suites = plan.len(), "preflight started");

        let mut runs = self.run_commands(plan);

        if run_handoff {
            let started = Instant::now();
            let problems = self.handoffs.self_check(options.agent_id.as_deref(), &run_id)?;
            let duration_ms = started.elapsed().as_millis() as u64;
            let outcome = if problems.is_empty() {
                SuiteOutcome::pass(HANDOFF_SUITE, true, duration_ms)
            } else {
                SuiteOutcome::fail(HANDOFF_SUITE, true, problems.join("\n"), duration_ms)
            };
            runs.push(SuiteRun {
                output: outcome.cause.clone().unwrap_or_else(|| "ok".to_string()),
                command: "(built-in handoff self-check)".to_string(),
                outcome,
            });
        }

        let verdict = if runs.iter().any(|r| r.outcome.is_blocking()) {
            Verdict::Failed
        } else {
            Verdict::Passed
        };

        let log_relative = format!("history/logs/{}.log", run_id);
        let log_path = self.logs_dir.join(format!("{}.log", run_id));
        atomic_write_file(&log_path, &render_log(&run_id, options, &runs, verdict))?;

        let result = PreflightResult {
            run_id,
            timestamp,
            mode: options.mode,
            agent_id: options.agent_id.clone(),
            suites_run: runs.iter().map(|r| r.outcome.name.clone()).collect(),
            outcomes: runs.into_iter().map(|r| r.outcome).collect(),
            verdict,
            log_reference: log_relative,
        };

        self.history.append(&result)?;
        tracing::info!(run_id = %result.run_id, verdict = %result.verdict, "preflight finished");
        let actor = options
            .agent_id
            .clone()
            .unwrap_or_else(crate::events::default_actor);
        self.events.append_after_commit(
            &Event::new(EventAction::Preflight, actor).with_details(json!({
                "run_id": result.run_id,
                "mode": result.mode,
                "verdict": result.verdict,
                "failed": result.failed_suites().iter().map(|o| &o.name).collect::<Vec<_>>(),
            })),
        );
        Ok(result)
    }

    /// Run all command suites in parallel; results keep plan order.
    fn run_commands(&self, plan: &[PlannedSuite]) -> Vec<SuiteRun> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = plan
                .iter()
                .map(|planned| {
                    scope.spawn(move || match planned {
                        PlannedSuite::Command {
                            name,
                            suite,
                            required,
                        } => run_suite(name, suite, *required, &self.repo_root),
                        PlannedSuite::Unknown { name } => SuiteRun {
                            outcome: SuiteOutcome::fail(name, true, "unknown suite", 0),
                            command: String::new(),
                            output: String::new(),
                        },
                    })
                })
                .collect();

            handles
                .into_iter()
                .zip(plan)
                .map(|(handle, planned)| {
                    handle.join().unwrap_or_else(|_| {
                        let name = match planned {
                            PlannedSuite::Command { name, .. } | PlannedSuite::Unknown { name } => {
                                name
                            }
                        };
                        SuiteRun {
                            outcome: SuiteOutcome::fail(name, true, "suite runner panicked", 0),
                            command: String::new(),
                            output: String::new(),
                        }
                    })
                })
                .collect()
        })
    }

    /// All recorded runs, oldest first.
    pub fn list_runs(&self) -> Result<Vec<PreflightResult>> {
        self.history.read_all()
    }

    pub fn find_run(&self, run_id: &str) -> Result<Option<PreflightResult>> {
        Ok(self
            .history
            .read_all()?
            .into_iter()
            .rev()
            .find(|r| r.run_id == run_id))
    }

    pub fn latest_run(&self) -> Result<Option<PreflightResult>> {
        self.history.last()
    }

    /// Most recent run made on behalf of `agent_id`.
    pub fn latest_run_for(&self, agent_id: &str) -> Result<Option<PreflightResult>> {
        Ok(self
            .history
            .read_all()?
            .into_iter()
            .rev()
            .find(|run| run.agent_id.as_deref() == Some(agent_id)))
    }

    /// Absolute path of a run's log file.
    pub fn log_path(&self, result: &PreflightResult) -> PathBuf {
        self.store_dir.join(&result.log_reference)
    }
}

fn render_log(run_id: &str, options: &PreflightOptions, runs: &[SuiteRun], verdict: Verdict) -> String {
    let mut log = String::new();
    let _ = writeln!(log, "preflight run {}", run_id);
    let _ = writeln!(log, "mode: {}", options.mode);
    if let Some(agent) = &options.agent_id {
        let _ = writeln!(log, "agent: {}", agent);
    }
    for run in runs {
        let _ = writeln!(log);
        let _ = writeln!(
            log,
            "=== {} [{}] {} ({} ms)",
            run.outcome.name,
            if run.outcome.required { "required" } else { "optional" },
            if run.outcome.passed() { "PASS" } else { "FAIL" },
            run.outcome.duration_ms
        );
        if !run.command.is_empty() {
            let _ = writeln!(log, "$ {}", run.command);
        }
        if !run.output.is_empty() {
            let _ = writeln!(log, "{}", run.output.trim_end());
        }
        if let Some(cause) = &run.outcome.cause
            && run.output.is_empty()
        {
            let _ = writeln!(log, "{}", cause);
        }
    }
    let _ = writeln!(log);
    let _ = writeln!(log, "verdict: {}", verdict);
    log
}
