//! RAII per-key guard.
//!
//! A guard is an exclusive OS file lock on a sibling file of the record
//! (`<key>.guard`). It is held only for the read-decide-write of a single
//! operation. The OS drops the lock when the handle closes, including when
//! the holder crashes, so a guard can never be left behind or stolen.
//!
//! Guard files themselves are never deleted: unlinking a file another
//! process has open would let the next opener lock a fresh inode while the
//! old holder still runs.

use crate::config::Config;
use crate::error::{BatonError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

const INITIAL_BACKOFF: Duration = Duration::from_millis(1);
const MAX_BACKOFF: Duration = Duration::from_millis(25);

/// Timing knobs for guard acquisition.
#[derive(Debug, Clone, Copy)]
pub struct GuardSettings {
    /// Give up after waiting this long.
    pub timeout: Duration,
}

impl GuardSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_millis(config.guard_timeout_ms),
        }
    }
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Proof that the caller holds the mutation guard for one key.
///
/// The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct KeyGuard {
    file: File,
    label: String,
}

impl KeyGuard {
    /// Take the guard at `path`, retrying with backoff until `settings.timeout`.
    ///
    /// `label` is the human-readable key (the locked file path) used in
    /// errors and logs.
    pub(crate) fn acquire(path: PathBuf, label: &str, settings: GuardSettings) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| BatonError::io("create directory", parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| BatonError::io("open store guard", &path, e))?;

        let deadline = Instant::now() + settings.timeout;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(Self {
                        file,
                        label: label.to_string(),
                    });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {}
                Err(e) => return Err(BatonError::io("lock store guard", &path, e)),
            }

            if Instant::now() >= deadline {
                tracing::warn!(key = label, guard = %path.display(), "timed out waiting for store guard");
                return Err(BatonError::GuardTimeout(label.to_string()));
            }
            thread::sleep(backoff);
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    /// The key this guard protects.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        // Closing the handle releases the lock as well.
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(key = %self.label, error = %e, "failed to release store guard");
        }
    }
}
