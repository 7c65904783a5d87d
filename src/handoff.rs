//! Session handoff recording.
//!
//! A handoff closes an agent's work session. It is recorded only when the
//! session's preflight run passed and the agent holds no live locks; `force`
//! records it anyway, marking the snapshot `forced` and listing what was
//! overridden. Snapshots are appended to `history/handoffs.ndjson` and never
//! rewritten.

use crate::context::StoreContext;
use crate::error::{BatonError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::locks::Lock;
use crate::preflight::{PreflightResult, Verdict};
use crate::store::{Journal, LockStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Why a handoff was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    /// The referenced preflight run did not pass.
    GateNotPassed { run_id: String, verdict: Verdict },
    /// The agent still holds live locks.
    ActiveLocks { paths: Vec<String> },
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::GateNotPassed { run_id, verdict } => {
                write!(f, "preflight run {} {}", run_id, verdict)
            }
            BlockReason::ActiveLocks { paths } => {
                write!(f, "agent still holds {} lock(s): {}", paths.len(), paths.join(", "))
            }
        }
    }
}

/// A recorded end-of-session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffSnapshot {
    pub session_id: String,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    /// The agent's live locks at recording time (non-empty only when forced).
    pub active_locks: Vec<Lock>,
    pub preflight_run_id: String,
    pub preflight_verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub forced: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub override_reasons: Vec<BlockReason>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffOutcome {
    Recorded(HandoffSnapshot),
    /// Nothing was written.
    Blocked(Vec<BlockReason>),
}

impl HandoffOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, HandoffOutcome::Recorded(_))
    }
}

/// Input to [`HandoffRecorder::record`].
#[derive(Debug, Clone)]
pub struct HandoffRequest {
    pub session_id: String,
    pub agent_id: String,
    pub preflight: PreflightResult,
    pub notes: Option<String>,
    pub force: bool,
}

impl HandoffRequest {
    pub fn new(
        session_id: impl Into<String>,
        agent_id: impl Into<String>,
        preflight: PreflightResult,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            agent_id: agent_id.into(),
            preflight,
            notes: None,
            force: false,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Appends handoff snapshots and checks their preconditions.
#[derive(Debug, Clone)]
pub struct HandoffRecorder {
    locks: LockStore,
    history: Journal<HandoffSnapshot>,
    events: EventLog,
}

impl HandoffRecorder {
    pub fn new(ctx: &StoreContext, locks: LockStore) -> Self {
        Self {
            locks,
            history: Journal::new(ctx.handoffs_file()),
            events: EventLog::new(ctx),
        }
    }

    /// Build the snapshot that would be recorded, without any checks.
    pub fn draft(
        &self,
        session_id: &str,
        agent_id: &str,
        preflight_run_id: &str,
        preflight_verdict: Verdict,
        notes: Option<&str>,
    ) -> Result<HandoffSnapshot> {
        Ok(HandoffSnapshot {
            session_id: session_id.to_string(),
            agent_id: agent_id.to_string(),
            timestamp: Utc::now(),
            active_locks: self.live_locks_of(agent_id)?,
            preflight_run_id: preflight_run_id.to_string(),
            preflight_verdict,
            notes: notes.map(str::to_string),
            forced: false,
            override_reasons: Vec::new(),
        })
    }

    /// Record a handoff, or report why it is blocked.
    pub fn record(&self, request: &HandoffRequest) -> Result<HandoffOutcome> {
        if request.session_id.trim().is_empty() {
            return Err(BatonError::UserError("session id must not be empty".to_string()));
        }
        if request.agent_id.trim().is_empty() {
            return Err(BatonError::UserError("agent id must not be empty".to_string()));
        }

        let mut snapshot = self.draft(
            &request.session_id,
            &request.agent_id,
            &request.preflight.run_id,
            request.preflight.verdict,
            request.notes.as_deref(),
        )?;

        let mut reasons = Vec::new();
        if !request.preflight.passed() {
            reasons.push(BlockReason::GateNotPassed {
                run_id: request.preflight.run_id.clone(),
                verdict: request.preflight.verdict,
            });
        }
        if !snapshot.active_locks.is_empty() {
            reasons.push(BlockReason::ActiveLocks {
                paths: snapshot
                    .active_locks
                    .iter()
                    .map(|l| l.file_path.clone())
                    .collect(),
            });
        }

        if !reasons.is_empty() {
            if !request.force {
                tracing::warn!(
                    agent = %request.agent_id,
                    session = %request.session_id,
                    reasons = reasons.len(),
                    "handoff blocked"
                );
                return Ok(HandoffOutcome::Blocked(reasons));
            }
            snapshot.forced = true;
            snapshot.override_reasons = reasons;
        }

        self.history.append(&snapshot)?;
        tracing::info!(
            agent = %snapshot.agent_id,
            session = %snapshot.session_id,
            forced = snapshot.forced,
            "handoff recorded"
        );
        self.events.append_after_commit(
            &Event::new(EventAction::Handoff, &snapshot.agent_id).with_details(json!({
                "session_id": snapshot.session_id,
                "preflight_run_id": snapshot.preflight_run_id,
                "forced": snapshot.forced,
                "overridden": snapshot.override_reasons,
            })),
        );
        Ok(HandoffOutcome::Recorded(snapshot))
    }

    /// All recorded snapshots, oldest first.
    pub fn list(&self) -> Result<Vec<HandoffSnapshot>> {
        self.history.read_all()
    }

    pub fn latest(&self) -> Result<Option<HandoffSnapshot>> {
        self.history.last()
    }

    /// Preflight self-check: a draft for `agent_id` can be built and
    /// serialized, and the agent holds no live locks. Returns the problems
    /// found; empty means the check passed. Never writes.
    pub fn self_check(&self, agent_id: Option<&str>, run_id: &str) -> Result<Vec<String>> {
        let agent_id = match agent_id {
            Some(agent) if !agent.trim().is_empty() => agent,
            _ => {
                return Ok(vec![
                    "no agent id given; cannot verify that the agent holds no locks".to_string(),
                ]);
            }
        };

        let mut problems = Vec::new();
        let draft = self.draft("self-check", agent_id, run_id, Verdict::Passed, None)?;
        if let Err(e) = serde_json::to_string(&draft) {
            problems.push(format!("handoff snapshot does not serialize: {}", e));
        }
        if !draft.active_locks.is_empty() {
            problems.push(
                BlockReason::ActiveLocks {
                    paths: draft.active_locks.iter().map(|l| l.file_path.clone()).collect(),
                }
                .to_string(),
            );
        }
        Ok(problems)
    }

    fn live_locks_of(&self, agent_id: &str) -> Result<Vec<Lock>> {
        let now = Utc::now();
        Ok(self
            .locks
            .list()?
            .into_iter()
            .filter(|l| l.owner_agent_id == agent_id && !l.is_expired_at(now))
            .collect())
    }
}
