//! Store location resolution for baton.
//!
//! All commands locate the shared coordination state through this module so
//! that every agent, regardless of which subdirectory it runs from, targets
//! the same `.baton/` directory.

use crate::error::{BatonError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the store directory created by `baton init`.
pub const STORE_DIR_NAME: &str = ".baton";

/// Resolved paths for a baton store. All paths are absolute.
#[derive(Debug, Clone)]
pub struct StoreContext {
    /// Directory containing `.baton/` (usually the repository root).
    pub repo_root: PathBuf,

    /// The `.baton/` directory itself.
    pub store_dir: PathBuf,

    /// Lock table directory (`.baton/locks/`).
    pub locks_dir: PathBuf,

    /// Context table directory (`.baton/contexts/`).
    pub contexts_dir: PathBuf,

    /// Append-only history directory (`.baton/history/`).
    pub history_dir: PathBuf,
}

impl StoreContext {
    /// Build a context rooted at `repo_root` without checking the filesystem.
    pub fn at<P: AsRef<Path>>(repo_root: P) -> Self {
        let repo_root = repo_root.as_ref().to_path_buf();
        let store_dir = repo_root.join(STORE_DIR_NAME);
        Self {
            locks_dir: store_dir.join("locks"),
            contexts_dir: store_dir.join("contexts"),
            history_dir: store_dir.join("history"),
            store_dir,
            repo_root,
        }
    }

    /// Resolve the store from the current working directory.
    pub fn resolve() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            BatonError::UserError(format!("failed to get current working directory: {}", e))
        })?;
        Self::resolve_from(&cwd)
    }

    /// Walk up from `start` until a directory containing `.baton/` is found.
    pub fn resolve_from<P: AsRef<Path>>(start: P) -> Result<Self> {
        let start = start.as_ref();
        for dir in start.ancestors() {
            if dir.join(STORE_DIR_NAME).is_dir() {
                return Ok(Self::at(dir));
            }
        }

        Err(BatonError::UserError(format!(
            "no baton store found in '{}' or any parent directory.\n\n\
             Run `baton init` at the repository root to create one.",
            start.display()
        )))
    }

    /// Check whether the store directories exist.
    pub fn store_exists(&self) -> bool {
        self.store_dir.is_dir() && self.locks_dir.is_dir()
    }

    /// Create the store directory layout. Existing content is left alone.
    pub fn create_layout(&self) -> Result<()> {
        for dir in [
            &self.store_dir,
            &self.locks_dir,
            &self.contexts_dir,
            &self.history_dir,
            &self.logs_dir(),
        ] {
            std::fs::create_dir_all(dir).map_err(|e| BatonError::io("create directory", dir, e))?;
        }
        Ok(())
    }

    /// Path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.store_dir.join("config.yaml")
    }

    /// Path to the audit event log.
    pub fn events_file(&self) -> PathBuf {
        self.history_dir.join("events.ndjson")
    }

    /// Path to the preflight history.
    pub fn preflight_file(&self) -> PathBuf {
        self.history_dir.join("preflight.ndjson")
    }

    /// Path to the handoff history.
    pub fn handoffs_file(&self) -> PathBuf {
        self.history_dir.join("handoffs.ndjson")
    }

    /// Directory holding per-run preflight output.
    pub fn logs_dir(&self) -> PathBuf {
        self.history_dir.join("logs")
    }
}

/// Resolve the store from the working directory and require it to exist.
pub fn require_store() -> Result<StoreContext> {
    let ctx = StoreContext::resolve()?;
    if !ctx.store_exists() {
        return Err(BatonError::UserError(format!(
            "baton store at '{}' is incomplete.\n\nRun `baton init` to repair it.",
            ctx.store_dir.display()
        )));
    }
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_at_builds_layout_paths() {
        let ctx = StoreContext::at("/repo");

        assert_eq!(ctx.store_dir, PathBuf::from("/repo/.baton"));
        assert!(ctx.locks_dir.ends_with(".baton/locks"));
        assert!(ctx.contexts_dir.ends_with(".baton/contexts"));
        assert!(ctx.events_file().ends_with("history/events.ndjson"));
        assert!(ctx.preflight_file().ends_with("history/preflight.ndjson"));
        assert!(ctx.handoffs_file().ends_with("history/handoffs.ndjson"));
        assert!(ctx.config_path().ends_with(".baton/config.yaml"));
    }

    #[test]
    fn test_resolve_from_subdirectory() {
        let temp_dir = TempDir::new().unwrap();
        StoreContext::at(temp_dir.path()).create_layout().unwrap();
        let nested = temp_dir.path().join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = StoreContext::resolve_from(&nested).unwrap();

        assert_eq!(
            ctx.repo_root.canonicalize().unwrap(),
            temp_dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_resolve_without_store_fails() {
        let temp_dir = TempDir::new().unwrap();

        let err = StoreContext::resolve_from(temp_dir.path()).unwrap_err();

        assert!(matches!(err, BatonError::UserError(_)));
        assert!(err.to_string().contains("baton init"));
    }

    #[test]
    fn test_create_layout_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = StoreContext::at(temp_dir.path());

        assert!(!ctx.store_exists());
        ctx.create_layout().unwrap();
        ctx.create_layout().unwrap();

        assert!(ctx.store_exists());
        assert!(ctx.logs_dir().is_dir());
    }
}
