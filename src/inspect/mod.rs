//! Conflict inspection.
//!
//! Everything here is a pure read of the lock and context tables: no guard
//! is taken, nothing is written, and stale locks are reported as free rather
//! than reclaimed.

mod types;


pub use types::{ConflictReport, ContextView, FileConflict, FileVerdict, LockFilter};

use crate::error::Result;
use crate::fingerprint::ContextStore;
use crate::locks::{Lock, normalize_path};
use crate::store::LockStore;
use chrono::{Duration, Utc};
use std::collections::BTreeMap;

/// Read-only view of who holds what and who is focused where.
#[derive(Debug, Clone)]
pub struct ConflictInspector {
    locks: LockStore,
    contexts: ContextStore,
    context_stale_after: Duration,
}

impl ConflictInspector {
    pub fn new(locks: LockStore, contexts: ContextStore, context_stale_after: Duration) -> Self {
        Self {
            locks,
            contexts,
            context_stale_after,
        }
    }

    /// Report, per path, whether it is free, held by the requester, or held
    /// by someone else, plus which other agents have it in their focus.
    pub fn inspect<S: AsRef<str>>(&self, paths: &[S], requesting_agent: &str) -> Result<ConflictReport> {
        let now = Utc::now();
        let contexts = self.contexts.list()?;
        let mut entries = BTreeMap::new();

        for raw in paths {
            let path = normalize_path(raw.as_ref())?;
            if entries.contains_key(&path) {
                continue;
            }
            let lock = self.locks.read(&path)?;
            let verdict = FileVerdict::for_lock(lock.as_ref(), requesting_agent, now);
            let focus_of = contexts
                .iter()
                .filter(|c| c.agent_id != requesting_agent && c.focuses_on(&path))
                .map(|c| c.agent_id.clone())
                .collect();

            entries.insert(
                path.clone(),
                FileConflict {
                    file_path: path,
                    verdict,
                    focus_of,
                },
            );
        }

        let report = ConflictReport {
            requesting_agent: requesting_agent.to_string(),
            entries,
        };
        tracing::debug!(
            agent = requesting_agent,
            paths = report.entries.len(),
            conflicts = report.has_conflicts(),
            "inspected paths"
        );
        Ok(report)
    }

    /// Locks matching `filter`, oldest first (ties broken by path).
    pub fn list_active(&self, filter: &LockFilter) -> Result<Vec<Lock>> {
        let now = Utc::now();
        let mut locks: Vec<Lock> = self
            .locks
            .list()?
            .into_iter()
            .filter(|l| filter.matches(l, now))
            .collect();
        locks.sort_by(|a, b| {
            a.acquired_at
                .cmp(&b.acquired_at)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        Ok(locks)
    }

    /// Every declared context with its staleness flag, sorted by agent id.
    pub fn list_contexts(&self) -> Result<Vec<ContextView>> {
        let now = Utc::now();
        Ok(self
            .contexts
            .list()?
            .into_iter()
            .map(|context| {
                let stale = context.is_stale_at(now, self.context_stale_after);
                ContextView { context, stale }
            })
            .collect())
    }
}
