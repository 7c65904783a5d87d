//! Durable lock table.
//!
//! Layout: `locks/<sha256(path)>.json` holds the [`Lock`] for one path and
//! `locks/<sha256(path)>.guard` is the file that key's mutation guard locks.
//! Hashing keeps arbitrary file paths (separators, unicode, length) out of
//! directory entry names; the record itself carries the literal path.

use super::guard::{GuardSettings, KeyGuard};
use crate::error::{BatonError, Result};
use crate::locks::Lock;
use crate::fs::atomic_write;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

const RECORD_EXTENSION: &str = "json";
const GUARD_EXTENSION: &str = "guard";

/// Storage key for a normalized lock path.
pub fn record_key(file_path: &str) -> String {
    hex::encode(Sha256::digest(file_path.as_bytes()))
}

/// Handle to the on-disk lock table. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LockStore {
    dir: PathBuf,
    guard: GuardSettings,
}

impl LockStore {
    pub fn new(dir: PathBuf, guard: GuardSettings) -> Self {
        Self { dir, guard }
    }

    fn record_path(&self, file_path: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", record_key(file_path), RECORD_EXTENSION))
    }

    fn guard_path(&self, file_path: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", record_key(file_path), GUARD_EXTENSION))
    }

    /// Take the mutation guard for `file_path`.
    ///
    /// Mutations on the same path are serialized by this guard; guards for
    /// different paths are independent files and never contend.
    pub fn lock_key(&self, file_path: &str) -> Result<KeyGuard> {
        KeyGuard::acquire(self.guard_path(file_path), file_path, self.guard)
    }

    /// Read the record for `file_path`, if one exists.
    pub fn read(&self, file_path: &str) -> Result<Option<Lock>> {
        read_record(&self.record_path(file_path))
    }

    /// Persist `lock`. The caller must hold the guard for the lock's path.
    pub fn write(&self, guard: &KeyGuard, lock: &Lock) -> Result<()> {
        check_guard(guard, &lock.file_path)?;

        let json = serde_json::to_string_pretty(lock)
            .map_err(|e| BatonError::Store(format!("failed to serialize lock record: {}", e)))?;
        atomic_write(self.record_path(&lock.file_path), json.as_bytes())
    }

    /// Delete the record for `file_path`. Returns whether a record existed.
    pub fn remove(&self, guard: &KeyGuard, file_path: &str) -> Result<bool> {
        check_guard(guard, file_path)?;

        let path = self.record_path(file_path);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BatonError::io("remove lock record", &path, e)),
        }
    }

    /// Read every record in the table, sorted by path.
    ///
    /// Records that cannot be parsed are skipped with a warning.
    pub fn list(&self) -> Result<Vec<Lock>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BatonError::io("read lock directory", &self.dir, e)),
        };

        let mut locks = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BatonError::io("read lock directory", &self.dir, e))?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            match read_record(&path) {
                Ok(Some(lock)) => locks.push(lock),
                // Released between read_dir and read.
                Ok(None) => {}
                Err(e) => tracing::warn!(record = %path.display(), error = %e, "skipping unreadable lock record"),
            }
        }

        locks.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Ok(locks)
    }
}

fn read_record(path: &Path) -> Result<Option<Lock>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BatonError::io("read lock record", path, e)),
    };

    serde_json::from_str(&content).map(Some).map_err(|e| {
        BatonError::Store(format!(
            "failed to parse lock record '{}': {}",
            path.display(),
            e
        ))
    })
}

fn check_guard(guard: &KeyGuard, file_path: &str) -> Result<()> {
    if guard.label() != file_path {
        return Err(BatonError::Store(format!(
            "guard for '{}' cannot be used to mutate '{}'",
            guard.label(),
            file_path
        )));
    }
    Ok(())
}
