//! Lock path normalization.

use crate::error::{BatonError, Result};

/// Normalize a caller-supplied file path into its lock key form.
///
/// Locks are per literal file path: separators are unified to `/` and a
/// leading `./` is dropped, but nothing else is resolved. Directory-like
/// paths (trailing `/`) are rejected because prefix locks are not supported.
pub fn normalize_path(raw: &str) -> Result<String> {
    let mut path = raw.trim().replace('\\', "/");

    while let Some(rest) = path.strip_prefix("./") {
        path = rest.to_string();
    }

    if path.is_empty() || path == "." {
        return Err(BatonError::UserError(format!(
            "invalid lock path '{}': path is empty",
            raw
        )));
    }

    if path.ends_with('/') {
        return Err(BatonError::UserError(format!(
            "invalid lock path '{}': directory locks are not supported, lock each file instead",
            raw
        )));
    }

    Ok(path)
}
