//! Atomic filesystem writes.
//!
//! All atomic writes follow this pattern:
//! 1. Write content to a temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Atomically replace the target with `rename()`
//!
//! Temporary names carry the process id and a per-process counter, so two
//! writers (threads or processes) never share a temp file even when they
//! target the same record.
//!
//! On crash, a temporary file may remain (named `.{filename}.{pid}.{n}.tmp`).
//! Readers ignore it because it never carries the record extension.

use crate::error::{BatonError, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Atomically write bytes to a file.
///
/// The target is never observable in a partial state: it either keeps its
/// previous content or holds all of `content`.
///
/// # Example
///
/// ```no_run
/// use baton::fs::atomic_write;
/// use std::path::Path;
///
/// atomic_write(Path::new(".baton/config.yaml"), b"default_ttl_secs: 600\n")?;
/// # Ok::<(), baton::error::BatonError>(())
/// ```
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| BatonError::io("create directory", parent, e))?;
    }

    let temp_path = generate_temp_path(path)?;
    write_and_sync(&temp_path, content)?;
    atomic_replace(&temp_path, path)?;

    Ok(())
}

/// Atomically write a string to a file.
pub fn atomic_write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes())
}

/// Generate a unique temporary file path next to the target.
fn generate_temp_path(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| BatonError::UserError(format!("invalid file path '{}'", target.display())))?;

    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let temp_name = format!(".{}.{}.{}.tmp", filename, std::process::id(), n);
    Ok(parent.join(temp_name))
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| BatonError::io("create temporary file", path, e))?;

    file.write_all(content).map_err(|e| {
        let _ = fs::remove_file(path);
        BatonError::io("write temporary file", path, e)
    })?;

    file.sync_all().map_err(|e| {
        let _ = fs::remove_file(path);
        BatonError::io("sync temporary file", path, e)
    })?;

    Ok(())
}

/// Replace `target` with `source`. `rename()` replaces an existing
/// destination atomically on POSIX and on Windows (`MoveFileEx` with
/// `MOVEFILE_REPLACE_EXISTING`).
fn atomic_replace(source: &Path, target: &Path) -> Result<()> {
    fs::rename(source, target).map_err(|e| {
        let _ = fs::remove_file(source);
        BatonError::io("atomically replace", target, e)
    })?;

    // Persist the directory entry as well.
    #[cfg(unix)]
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}
