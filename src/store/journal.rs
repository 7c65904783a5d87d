//! Append-only NDJSON journals.
//!
//! Each entry is one JSON object on one line. Entries are appended with a
//! single write in append mode and synced before `append` returns; they are
//! never rewritten.

use crate::error::{BatonError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A typed append-only log stored at a single path.
#[derive(Debug)]
pub struct Journal<T> {
    path: PathBuf,
    _entry: PhantomData<fn() -> T>,
}

impl<T> Clone for Journal<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _entry: PhantomData,
        }
    }
}

impl<T> Journal<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _entry: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry.
    ///
    /// A serialization failure is reported before anything is written, so the
    /// journal never contains a partial line from this call.
    pub fn append(&self, entry: &T) -> Result<()> {
        let mut line = serde_json::to_string(entry)
            .map_err(|e| BatonError::Store(format!("failed to serialize journal entry: {}", e)))?;
        line.push('\n');

        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| BatonError::io("create directory", parent, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| BatonError::io("open journal", &self.path, e))?;

        file.write_all(line.as_bytes())
            .map_err(|e| BatonError::io("append to journal", &self.path, e))?;

        file.sync_all()
            .map_err(|e| BatonError::io("sync journal", &self.path, e))?;

        Ok(())
    }

    /// Read every entry in append order.
    ///
    /// A missing journal reads as empty. Lines that fail to parse are skipped
    /// with a warning so one damaged line cannot hide the rest of the history.
    pub fn read_all(&self) -> Result<Vec<T>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BatonError::io("read journal", &self.path, e)),
        };

        let mut entries = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(
                    journal = %self.path.display(),
                    line = idx + 1,
                    error = %e,
                    "skipping malformed journal line"
                ),
            }
        }
        Ok(entries)
    }

    /// The most recently appended entry, if any.
    pub fn last(&self) -> Result<Option<T>> {
        Ok(self.read_all()?.pop())
    }
}
