//! Acquire, release, renew and reclamation logic.

use super::path::normalize_path;
use super::types::{
    AcquireOutcome, BatchOutcome, GrantKind, Lock, LockDenied, LockStatus, ReleaseOutcome,
    RenewOutcome,
};
use crate::config::Config;
use crate::context::StoreContext;
use crate::error::{BatonError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::store::{GuardSettings, LockStore};
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeSet;

/// Grants and revokes file locks against the shared [`LockStore`].
#[derive(Debug, Clone)]
pub struct LockManager {
    store: LockStore,
    events: EventLog,
    config: Config,
}

impl LockManager {
    pub fn new(ctx: &StoreContext, config: Config) -> Self {
        let store = LockStore::new(ctx.locks_dir.clone(), GuardSettings::from_config(&config));
        Self {
            store,
            events: EventLog::new(ctx),
            config,
        }
    }

    /// The underlying lock table (read access for inspectors and the gate).
    pub fn store(&self) -> &LockStore {
        &self.store
    }

    /// Acquire the lock on `file_path` for `agent_id` working on `task_id`.
    ///
    /// - Free path: a new lock is written.
    /// - Held by the same agent and task: the ttl is refreshed, `acquired_at`
    ///   is kept.
    /// - Held by anyone else and not expired: denied.
    /// - Held but expired: a `reclaim` event naming the previous owner is
    ///   appended first, then the new lock is written.
    ///
    /// `ttl_secs` falls back to the configured default and is capped at the
    /// configured maximum.
    pub fn acquire(
        &self,
        file_path: &str,
        agent_id: &str,
        task_id: &str,
        ttl_secs: Option<u64>,
    ) -> Result<AcquireOutcome> {
        let path = normalize_path(file_path)?;
        require_id("agent id", agent_id)?;
        require_id("task id", task_id)?;
        let ttl = self.config.effective_ttl(ttl_secs)?;

        let guard = self.store.lock_key(&path)?;
        let now = Utc::now();

        let outcome = match self.store.read(&path)? {
            Some(mut existing) if !existing.is_expired_at(now) => {
                if existing.is_held_by(agent_id, task_id) {
                    existing.extend(ttl, now);
                    self.store.write(&guard, &existing)?;
                    tracing::debug!(path = %path, agent = agent_id, "re-entrant acquire refreshed ttl");
                    self.events.append_after_commit(
                        &Event::new(EventAction::Reacquire, agent_id)
                            .with_task(task_id)
                            .with_path(&path)
                            .with_details(json!({
                                "ttl_secs": existing.ttl_secs,
                                "expires_at": existing.expires_at,
                            })),
                    );
                    AcquireOutcome::Granted {
                        lock: existing,
                        kind: GrantKind::Reentrant,
                    }
                } else {
                    tracing::info!(
                        path = %path,
                        agent = agent_id,
                        holder = %existing.owner_agent_id,
                        "lock denied"
                    );
                    AcquireOutcome::Denied(LockDenied::from(&existing))
                }
            }
            Some(stale) => {
                // The reclamation must be on record before the new grant exists.
                self.events.append(&reclaim_event(&stale, agent_id, "acquire"))?;
                tracing::warn!(
                    path = %path,
                    previous_owner = %stale.owner_agent_id,
                    new_owner = agent_id,
                    "reclaimed stale lock"
                );

                let lock = Lock::new(&path, agent_id, task_id, ttl, now);
                self.store.write(&guard, &lock)?;
                self.record_grant(&lock);
                AcquireOutcome::Granted {
                    lock,
                    kind: GrantKind::Reclaimed {
                        previous: stale.with_status(LockStatus::Expired),
                    },
                }
            }
            None => {
                let lock = Lock::new(&path, agent_id, task_id, ttl, now);
                self.store.write(&guard, &lock)?;
                self.record_grant(&lock);
                AcquireOutcome::Granted {
                    lock,
                    kind: GrantKind::New,
                }
            }
        };

        drop(guard);
        Ok(outcome)
    }

    /// Acquire every path in `paths` or none of them.
    ///
    /// Paths are deduplicated and attempted in sorted order. All paths are
    /// attempted so the denial list is complete; if any is denied, every lock
    /// this call newly granted is released before returning. Locks the caller
    /// already held before the call stay held.
    pub fn acquire_batch<S: AsRef<str>>(
        &self,
        paths: &[S],
        agent_id: &str,
        task_id: &str,
        ttl_secs: Option<u64>,
    ) -> Result<BatchOutcome> {
        // Validate everything up front so bad input never leaves partial grants.
        let normalized = paths
            .iter()
            .map(|p| normalize_path(p.as_ref()))
            .collect::<Result<BTreeSet<String>>>()?;
        if normalized.is_empty() {
            return Err(BatonError::UserError(
                "batch acquire needs at least one path".to_string(),
            ));
        }

        let mut held = Vec::new();
        let mut newly_granted = Vec::new();
        let mut denied = Vec::new();

        for path in &normalized {
            match self.acquire(path, agent_id, task_id, ttl_secs) {
                Ok(AcquireOutcome::Granted { lock, kind }) => {
                    if kind != GrantKind::Reentrant {
                        newly_granted.push(lock.file_path.clone());
                    }
                    held.push(lock);
                }
                Ok(AcquireOutcome::Denied(d)) => denied.push(d),
                Err(e) => {
                    self.rollback(&newly_granted, agent_id)?;
                    return Err(e);
                }
            }
        }

        if denied.is_empty() {
            return Ok(BatchOutcome::AllGranted(held));
        }

        self.rollback(&newly_granted, agent_id)?;
        tracing::info!(
            agent = agent_id,
            denied = denied.len(),
            rolled_back = newly_granted.len(),
            "batch acquire denied"
        );
        self.events.append_after_commit(
            &Event::new(EventAction::BatchRollback, agent_id)
                .with_task(task_id)
                .with_details(json!({
                    "requested": normalized,
                    "denied": denied.iter().map(|d| &d.file_path).collect::<Vec<_>>(),
                    "rolled_back": newly_granted,
                })),
        );

        Ok(BatchOutcome::PartialDenial {
            denied,
            granted_paths_already_released: newly_granted,
        })
    }

    /// Release every path in `paths`, continuing past failures and returning
    /// the first error.
    fn rollback(&self, paths: &[String], agent_id: &str) -> Result<()> {
        let mut first_err = None;
        for path in paths {
            if let Err(e) = self.release(path, agent_id)
                && first_err.is_none()
            {
                first_err = Some(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Release the lock on `file_path` held by `agent_id`.
    ///
    /// Releasing a path with no lock is a successful no-op. An expired lock of
    /// another agent is also left alone and reported as free; a live lock of
    /// another agent is refused.
    pub fn release(&self, file_path: &str, agent_id: &str) -> Result<ReleaseOutcome> {
        let path = normalize_path(file_path)?;
        let guard = self.store.lock_key(&path)?;
        let now = Utc::now();

        let outcome = match self.store.read(&path)? {
            None => ReleaseOutcome::AlreadyFree,
            Some(lock) if lock.owner_agent_id == agent_id => {
                self.store.remove(&guard, &path)?;
                tracing::info!(path = %path, agent = agent_id, "lock released");
                self.events.append_after_commit(
                    &Event::new(EventAction::Release, agent_id)
                        .with_task(&lock.task_id)
                        .with_path(&path),
                );
                ReleaseOutcome::Released(lock.with_status(LockStatus::Released))
            }
            Some(lock) if lock.is_expired_at(now) => ReleaseOutcome::AlreadyFree,
            Some(lock) => ReleaseOutcome::NotOwner(LockDenied::from(&lock)),
        };

        drop(guard);
        Ok(outcome)
    }

    /// Extend the expiry of a lock held by `agent_id` to `now + ttl`.
    ///
    /// An expired lock counts as absent and must be re-acquired.
    pub fn renew(
        &self,
        file_path: &str,
        agent_id: &str,
        ttl_secs: Option<u64>,
    ) -> Result<RenewOutcome> {
        let path = normalize_path(file_path)?;
        let ttl = self.config.effective_ttl(ttl_secs)?;
        let guard = self.store.lock_key(&path)?;
        let now = Utc::now();

        let outcome = match self.store.read(&path)? {
            None => RenewOutcome::NotFound,
            Some(lock) if lock.is_expired_at(now) => RenewOutcome::NotFound,
            Some(lock) if lock.owner_agent_id != agent_id => {
                RenewOutcome::NotOwner(LockDenied::from(&lock))
            }
            Some(mut lock) => {
                lock.extend(ttl, now);
                self.store.write(&guard, &lock)?;
                self.events.append_after_commit(
                    &Event::new(EventAction::Renew, agent_id)
                        .with_task(&lock.task_id)
                        .with_path(&path)
                        .with_details(json!({
                            "ttl_secs": lock.ttl_secs,
                            "expires_at": lock.expires_at,
                        })),
                );
                RenewOutcome::Renewed(lock)
            }
        };

        drop(guard);
        Ok(outcome)
    }

    /// Release every lock held by `agent_id`, including its expired ones.
    ///
    /// Returns the released locks sorted by path.
    pub fn release_all(&self, agent_id: &str) -> Result<Vec<Lock>> {
        let mut released = Vec::new();

        for lock in self.store.list()? {
            if lock.owner_agent_id != agent_id {
                continue;
            }
            // Re-checked under the key guard inside release().
            if let ReleaseOutcome::Released(lock) = self.release(&lock.file_path, agent_id)? {
                released.push(lock);
            }
        }

        self.events.append_after_commit(
            &Event::new(EventAction::ReleaseAll, agent_id).with_details(json!({
                "released": released.iter().map(|l| &l.file_path).collect::<Vec<_>>(),
            })),
        );
        Ok(released)
    }

    /// Remove every expired lock. Returns the number reclaimed.
    ///
    /// Each candidate is re-read under its key guard, so a lock that was
    /// renewed or re-acquired since the listing is left alone.
    pub fn sweep_expired(&self, actor: &str) -> Result<usize> {
        let mut reclaimed = 0;

        for candidate in self.store.list()? {
            if !candidate.is_expired() {
                continue;
            }

            let guard = self.store.lock_key(&candidate.file_path)?;
            match self.store.read(&candidate.file_path)? {
                Some(current) if current.is_expired_at(Utc::now()) => {
                    self.events.append(&reclaim_event(&current, actor, "sweep"))?;
                    self.store.remove(&guard, &current.file_path)?;
                    tracing::warn!(
                        path = %current.file_path,
                        previous_owner = %current.owner_agent_id,
                        "swept stale lock"
                    );
                    reclaimed += 1;
                }
                _ => {}
            }
            drop(guard);
        }

        self.events.append_after_commit(
            &Event::new(EventAction::Sweep, actor).with_details(json!({ "reclaimed": reclaimed })),
        );
        Ok(reclaimed)
    }

    fn record_grant(&self, lock: &Lock) {
        tracing::info!(
            path = %lock.file_path,
            agent = %lock.owner_agent_id,
            task = %lock.task_id,
            ttl_secs = lock.ttl_secs,
            "lock granted"
        );
        self.events.append_after_commit(
            &Event::new(EventAction::Acquire, &lock.owner_agent_id)
                .with_task(&lock.task_id)
                .with_path(&lock.file_path)
                .with_details(json!({
                    "ttl_secs": lock.ttl_secs,
                    "expires_at": lock.expires_at,
                })),
        );
    }
}

fn reclaim_event(stale: &Lock, actor: &str, reason: &str) -> Event {
    Event::new(EventAction::Reclaim, actor)
        .with_task(&stale.task_id)
        .with_path(&stale.file_path)
        .with_details(json!({
            "reason": reason,
            "previous_owner": stale.owner_agent_id,
            "previous_task": stale.task_id,
            "acquired_at": stale.acquired_at,
            "expired_at": stale.expires_at,
        }))
}

fn require_id(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BatonError::UserError(format!("{} must not be empty", what)));
    }
    Ok(())
}
