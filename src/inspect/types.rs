//! Read-only views over the lock and context tables.

use crate::fingerprint::AgentContext;
use crate::locks::Lock;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Who, if anyone, holds a path, from the requesting agent's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FileVerdict {
    /// No lock, or only an expired one.
    Free,
    /// The requesting agent holds it.
    LockedBySelf { task_id: String },
    /// Another agent holds it.
    LockedBy {
        agent_id: String,
        task_id: String,
        age_secs: i64,
    },
}

impl FileVerdict {
    pub(crate) fn for_lock(lock: Option<&Lock>, requesting_agent: &str, now: DateTime<Utc>) -> Self {
        match lock {
            None => FileVerdict::Free,
            Some(lock) if lock.is_expired_at(now) => FileVerdict::Free,
            Some(lock) if lock.owner_agent_id == requesting_agent => FileVerdict::LockedBySelf {
                task_id: lock.task_id.clone(),
            },
            Some(lock) => FileVerdict::LockedBy {
                agent_id: lock.owner_agent_id.clone(),
                task_id: lock.task_id.clone(),
                age_secs: lock.age_at(now).num_seconds(),
            },
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, FileVerdict::LockedBy { .. })
    }
}

impl std::fmt::Display for FileVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileVerdict::Free => write!(f, "free"),
            FileVerdict::LockedBySelf { task_id } => write!(f, "locked by you (task {})", task_id),
            FileVerdict::LockedBy {
                agent_id,
                task_id,
                age_secs,
            } => write!(
                f,
                "locked by {} (task {}, held {})",
                agent_id,
                task_id,
                crate::locks::format_duration(chrono::Duration::seconds(*age_secs))
            ),
        }
    }
}

/// Verdict for one path plus advisory focus overlaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileConflict {
    pub file_path: String,
    pub verdict: FileVerdict,
    /// Other agents whose declared focus contains this path.
    pub focus_of: Vec<String>,
}

/// Result of [`super::ConflictInspector::inspect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub requesting_agent: String,
    /// Keyed by normalized path.
    pub entries: BTreeMap<String, FileConflict>,
}

impl ConflictReport {
    /// True when another agent holds at least one of the paths.
    pub fn has_conflicts(&self) -> bool {
        self.entries.values().any(|e| e.verdict.is_conflict())
    }

    /// True when another agent's declared focus covers at least one path.
    pub fn has_focus_overlap(&self) -> bool {
        self.entries.values().any(|e| !e.focus_of.is_empty())
    }

    pub fn conflicting_paths(&self) -> Vec<&str> {
        self.entries
            .values()
            .filter(|e| e.verdict.is_conflict())
            .map(|e| e.file_path.as_str())
            .collect()
    }
}

/// Filter for [`super::ConflictInspector::list_active`].
#[derive(Debug, Clone, Default)]
pub struct LockFilter {
    pub agent_id: Option<String>,
    pub task_id: Option<String>,
    pub include_expired: bool,
}

impl LockFilter {
    pub fn agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            ..Default::default()
        }
    }

    pub(crate) fn matches(&self, lock: &Lock, now: DateTime<Utc>) -> bool {
        if !self.include_expired && lock.is_expired_at(now) {
            return false;
        }
        if let Some(agent) = &self.agent_id
            && &lock.owner_agent_id != agent
        {
            return false;
        }
        if let Some(task) = &self.task_id
            && &lock.task_id != task
        {
            return false;
        }
        true
    }
}

/// A context together with its staleness at listing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextView {
    pub context: AgentContext,
    pub stale: bool,
}
