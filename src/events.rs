//! Audit event log for baton.
//!
//! Every lock-table mutation, context update, preflight run and handoff is
//! recorded as one line in `.baton/history/events.ndjson`.
//!
//! # Event Format
//!
//! - `ts`: RFC3339 timestamp
//! - `action`: what happened (acquire, release, reclaim, ...)
//! - `actor`: the agent id that caused it
//! - `task`: optional task id
//! - `path`: optional locked file path
//! - `details`: freeform object with action-specific fields
//!
//! ```no_run
//! use baton::context::StoreContext;
//! use baton::events::{Event, EventAction, EventLog};
//! use serde_json::json;
//!
//! let ctx = StoreContext::resolve()?;
//! let log = EventLog::new(&ctx);
//! log.append(&Event::new(EventAction::Sweep, "janitor").with_details(json!({"reclaimed": 0})))?;
//! # Ok::<(), baton::error::BatonError>(())
//! ```

use crate::context::StoreContext;
use crate::error::Result;
use crate::store::Journal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Store created
    Init,
    /// Fresh lock granted
    Acquire,
    /// Holder re-acquired its own lock (ttl refreshed)
    Reacquire,
    /// Lock released by its owner
    Release,
    /// Lock expiry extended
    Renew,
    /// Stale lock removed (lazily on acquire, or by sweep)
    Reclaim,
    /// Bulk release at session end
    ReleaseAll,
    /// Batch acquire denied and its grants undone
    BatchRollback,
    /// Maintenance sweep finished
    Sweep,
    /// Agent focus area declared
    ContextUpdate,
    /// Preflight gate run recorded
    Preflight,
    /// Handoff snapshot recorded
    Handoff,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventAction::Init => "init",
            EventAction::Acquire => "acquire",
            EventAction::Reacquire => "reacquire",
            EventAction::Release => "release",
            EventAction::Renew => "renew",
            EventAction::Reclaim => "reclaim",
            EventAction::ReleaseAll => "release_all",
            EventAction::BatchRollback => "batch_rollback",
            EventAction::Sweep => "sweep",
            EventAction::ContextUpdate => "context_update",
            EventAction::Preflight => "preflight",
            EventAction::Handoff => "handoff",
        };
        f.write_str(s)
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// When the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// The agent that performed the action.
    pub actor: String,

    /// Task id, for task-scoped events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    /// Locked file path, for per-path events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event stamped with the current time.
    pub fn new(action: EventAction, actor: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: actor.into(),
            task: None,
            path: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task = Some(task_id.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Actor string for callers that have no agent id (`user@HOST`).
pub fn default_actor() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// The audit log of a store.
#[derive(Debug, Clone)]
pub struct EventLog {
    journal: Journal<Event>,
}

impl EventLog {
    pub fn new(ctx: &StoreContext) -> Self {
        Self {
            journal: Journal::new(ctx.events_file()),
        }
    }

    /// Append an event. Fails if the event cannot be durably written.
    pub fn append(&self, event: &Event) -> Result<()> {
        self.journal.append(event)
    }

    /// Append an event that describes a mutation which has already been
    /// committed. A write failure is logged instead of returned, because the
    /// caller's operation did succeed.
    pub(crate) fn append_after_commit(&self, event: &Event) {
        if let Err(e) = self.journal.append(event) {
            tracing::error!(action = %event.action, error = %e, "failed to record audit event");
        }
    }

    /// All events, oldest first.
    pub fn read_all(&self) -> Result<Vec<Event>> {
        self.journal.read_all()
    }

    /// The last `n` events, oldest first.
    pub fn tail(&self, n: usize) -> Result<Vec<Event>> {
        let events = self.read_all()?;
        let skip = events.len().saturating_sub(n);
        Ok(events.into_iter().skip(skip).collect())
    }
}
