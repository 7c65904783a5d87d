//! Lock records and operation outcomes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a lock.
///
/// Records on disk are always `Active`; `Released` and `Expired` appear on
/// copies handed back to callers after a release or reclamation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    Active,
    Released,
    Expired,
}

impl std::fmt::Display for LockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockStatus::Active => write!(f, "active"),
            LockStatus::Released => write!(f, "released"),
            LockStatus::Expired => write!(f, "expired"),
        }
    }
}

/// An exclusive lock on one file path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// Normalized file path; the unique key in the lock table.
    pub file_path: String,

    /// Agent holding the lock.
    pub owner_agent_id: String,

    /// Task the lock was taken for.
    pub task_id: String,

    /// When the lock was first granted. Re-entrant acquires keep this value.
    pub acquired_at: DateTime<Utc>,

    /// Ttl of the most recent grant or renewal, in seconds.
    pub ttl_secs: u64,

    /// Instant after which the lock is stale.
    pub expires_at: DateTime<Utc>,

    pub status: LockStatus,
}

impl Lock {
    /// A lock granted at `now` for `ttl`. An expiry past the representable
    /// range saturates to the latest instant rather than wrapping.
    pub fn new(
        file_path: impl Into<String>,
        owner_agent_id: impl Into<String>,
        task_id: impl Into<String>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            owner_agent_id: owner_agent_id.into(),
            task_id: task_id.into(),
            acquired_at: now,
            ttl_secs: ttl.num_seconds().max(0) as u64,
            expires_at: expiry(now, ttl),
            status: LockStatus::Active,
        }
    }

    /// Whether the ttl has elapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether this exact agent and task hold the lock.
    pub fn is_held_by(&self, agent_id: &str, task_id: &str) -> bool {
        self.owner_agent_id == agent_id && self.task_id == task_id
    }

    /// Push the expiry to `now + ttl`.
    pub fn extend(&mut self, ttl: Duration, now: DateTime<Utc>) {
        self.ttl_secs = ttl.num_seconds().max(0) as u64;
        self.expires_at = expiry(now, ttl);
    }

    pub(crate) fn with_status(mut self, status: LockStatus) -> Self {
        self.status = status;
        self
    }

    /// Status as observed at `now`: a stored active lock past its expiry is
    /// reported as expired.
    pub fn effective_status(&self, now: DateTime<Utc>) -> LockStatus {
        match self.status {
            LockStatus::Active if self.is_expired_at(now) => LockStatus::Expired,
            status => status,
        }
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.acquired_at)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self, now: DateTime<Utc>) -> String {
        format_duration(self.age_at(now))
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        let left = self.expires_at.signed_duration_since(now);
        if left < Duration::zero() {
            Duration::zero()
        } else {
            left
        }
    }
}

impl std::fmt::Display for Lock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let now = Utc::now();
        write!(
            f,
            "{} (owner: {}, task: {}, age: {}, expires in: {}{})",
            self.file_path,
            self.owner_agent_id,
            self.task_id,
            self.age_string(now),
            format_duration(self.remaining_at(now)),
            if self.is_expired_at(now) { ", STALE" } else { "" }
        )
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Format a duration as `Xd Yh`, `Xh Ym`, `Xm Ys` or `Xs`.
pub(crate) fn format_duration(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    let (days, hours, minutes) = (secs / 86_400, secs / 3_600, secs / 60);

    if days > 0 {
        format!("{}d {}h", days, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// The current holder of a path, reported when an operation is refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockDenied {
    pub file_path: String,
    pub holder_agent_id: String,
    pub holder_task_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Lock> for LockDenied {
    fn from(lock: &Lock) -> Self {
        Self {
            file_path: lock.file_path.clone(),
            holder_agent_id: lock.owner_agent_id.clone(),
            holder_task_id: lock.task_id.clone(),
            acquired_at: lock.acquired_at,
            expires_at: lock.expires_at,
        }
    }
}

impl std::fmt::Display for LockDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let now = Utc::now();
        write!(
            f,
            "{} is locked by {} (task {}, held {}, expires in {})",
            self.file_path,
            self.holder_agent_id,
            self.holder_task_id,
            format_duration(now.signed_duration_since(self.acquired_at)),
            format_duration(self.expires_at.signed_duration_since(now)),
        )
    }
}

/// How a successful acquire came about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantKind {
    /// The path was free.
    New,
    /// The same agent and task already held it; the ttl was refreshed.
    Reentrant,
    /// A stale lock was reclaimed first. `previous` is the reclaimed record.
    Reclaimed { previous: Lock },
}

/// Result of [`super::LockManager::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    Granted { lock: Lock, kind: GrantKind },
    Denied(LockDenied),
}

impl AcquireOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AcquireOutcome::Granted { .. })
    }

    /// The granted lock, if any.
    pub fn lock(&self) -> Option<&Lock> {
        match self {
            AcquireOutcome::Granted { lock, .. } => Some(lock),
            AcquireOutcome::Denied(_) => None,
        }
    }
}

/// Result of [`super::LockManager::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The caller's lock was removed.
    Released(Lock),
    /// Nothing to release; no state changed.
    AlreadyFree,
    /// Another agent holds the lock; no state changed.
    NotOwner(LockDenied),
}

impl ReleaseOutcome {
    /// Release succeeds unless another agent holds the lock.
    pub fn is_success(&self) -> bool {
        !matches!(self, ReleaseOutcome::NotOwner(_))
    }
}

/// Result of [`super::LockManager::renew`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewOutcome {
    Renewed(Lock),
    NotOwner(LockDenied),
    NotFound,
}

/// Result of [`super::LockManager::acquire_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every path is now held by the caller, in sorted path order.
    AllGranted(Vec<Lock>),
    /// At least one path was denied. Locks granted earlier in the batch have
    /// already been released again; the caller holds none of them.
    PartialDenial {
        denied: Vec<LockDenied>,
        granted_paths_already_released: Vec<String>,
    },
}

impl BatchOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, BatchOutcome::AllGranted(_))
    }

    /// Paths that were denied (empty when everything was granted).
    pub fn denied_paths(&self) -> Vec<&str> {
        match self {
            BatchOutcome::AllGranted(_) => Vec::new(),
            BatchOutcome::PartialDenial { denied, .. } => {
                denied.iter().map(|d| d.file_path.as_str()).collect()
            }
        }
    }
}
