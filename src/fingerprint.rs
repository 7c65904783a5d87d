//! Agent focus areas and their fingerprints.
//!
//! An agent declares what it is working on as a task id plus a set of files.
//! The fingerprint is a SHA-256 over that pair, independent of the order the
//! files were given in, so two agents (or two sessions of one agent) can
//! compare focus areas by hash. Contexts are advisory: nothing here blocks a
//! lock acquire.
//!
//! Layout: `contexts/<sha256(agent_id)>.json`, one record per agent, last
//! write wins.

use crate::context::StoreContext;
use crate::error::{BatonError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::fs::atomic_write;
use crate::locks::normalize_path;
use crate::store::{GuardSettings, KeyGuard, record_key};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Compute the focus fingerprint for `task_id` and `files`.
///
/// Files are sorted and deduplicated first; the same set in any order yields
/// the same hash.
pub fn fingerprint<S: AsRef<str>>(task_id: &str, files: &[S]) -> String {
    let sorted: BTreeSet<&str> = files.iter().map(|f| f.as_ref()).collect();
    fingerprint_set(task_id, sorted.iter().copied())
}

fn fingerprint_set<'a>(task_id: &str, sorted: impl Iterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(task_id.as_bytes());
    for file in sorted {
        // NUL cannot appear in a path, so entries cannot run together.
        hasher.update([0u8]);
        hasher.update(file.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// An agent's declared focus area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentContext {
    pub agent_id: String,
    pub task_id: String,
    pub fingerprint: String,
    pub focus_files: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
}

impl AgentContext {
    /// First 12 hex digits, for display.
    pub fn short_fingerprint(&self) -> &str {
        &self.fingerprint[..self.fingerprint.len().min(12)]
    }

    /// Whether the context was last updated more than `stale_after` before `now`.
    pub fn is_stale_at(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        now.signed_duration_since(self.updated_at) > stale_after
    }

    pub fn focuses_on(&self, file_path: &str) -> bool {
        self.focus_files.contains(file_path)
    }
}

/// Result of [`ContextStore::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextUpdate {
    pub context: AgentContext,
    /// Fingerprint of the context this update replaced, if there was one.
    pub previous_fingerprint: Option<String>,
    /// True when there was no previous context or its fingerprint differs.
    pub changed: bool,
}

/// Durable table of agent contexts.
#[derive(Debug, Clone)]
pub struct ContextStore {
    dir: PathBuf,
    guard: GuardSettings,
    events: EventLog,
}

impl ContextStore {
    pub fn new(ctx: &StoreContext, guard: GuardSettings) -> Self {
        Self {
            dir: ctx.contexts_dir.clone(),
            guard,
            events: EventLog::new(ctx),
        }
    }

    fn record_path(&self, agent_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", record_key(agent_id)))
    }

    /// Replace the context of `agent_id` with a new focus area.
    pub fn update<S: AsRef<str>>(
        &self,
        agent_id: &str,
        task_id: &str,
        files: &[S],
    ) -> Result<ContextUpdate> {
        if agent_id.trim().is_empty() {
            return Err(BatonError::UserError("agent id must not be empty".to_string()));
        }
        if task_id.trim().is_empty() {
            return Err(BatonError::UserError("task id must not be empty".to_string()));
        }
        let focus_files = files
            .iter()
            .map(|f| normalize_path(f.as_ref()))
            .collect::<Result<BTreeSet<String>>>()?;

        let record = self.record_path(agent_id);
        let guard_path = record.with_extension("guard");
        let guard = KeyGuard::acquire(guard_path, agent_id, self.guard)?;

        let previous = read_context(&record)?;
        let context = AgentContext {
            agent_id: agent_id.to_string(),
            task_id: task_id.to_string(),
            fingerprint: fingerprint_set(task_id, focus_files.iter().map(String::as_str)),
            focus_files,
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string_pretty(&context)
            .map_err(|e| BatonError::Store(format!("failed to serialize context: {}", e)))?;
        atomic_write(&record, json.as_bytes())?;
        drop(guard);

        let previous_fingerprint = previous.map(|p| p.fingerprint);
        let changed = previous_fingerprint.as_deref() != Some(context.fingerprint.as_str());
        tracing::info!(
            agent = agent_id,
            task = task_id,
            fingerprint = context.short_fingerprint(),
            changed,
            "context updated"
        );
        self.events.append_after_commit(
            &Event::new(EventAction::ContextUpdate, agent_id)
                .with_task(task_id)
                .with_details(json!({
                    "fingerprint": context.fingerprint,
                    "previous_fingerprint": previous_fingerprint,
                    "files": context.focus_files,
                    "changed": changed,
                })),
        );

        Ok(ContextUpdate {
            context,
            previous_fingerprint,
            changed,
        })
    }

    pub fn get(&self, agent_id: &str) -> Result<Option<AgentContext>> {
        read_context(&self.record_path(agent_id))
    }

    /// All contexts, sorted by agent id. Unreadable records are skipped.
    pub fn list(&self) -> Result<Vec<AgentContext>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BatonError::io("read contexts directory", &self.dir, e)),
        };

        let mut contexts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BatonError::io("read contexts directory", &self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_context(&path) {
                Ok(Some(context)) => contexts.push(context),
                Ok(None) => {}
                Err(e) => tracing::warn!(record = %path.display(), error = %e, "skipping unreadable context"),
            }
        }

        contexts.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        Ok(contexts)
    }
}

fn read_context(path: &Path) -> Result<Option<AgentContext>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BatonError::io("read context record", path, e)),
    };
    serde_json::from_str(&content).map(Some).map_err(|e| {
        BatonError::Store(format!(
            "context record '{}' is corrupt: {}",
            path.display(),
            e
        ))
    })
}
