//! Path canonicalization for cache keys

use crate::error::StorageError;
use std::path::{Path, PathBuf};

/// Canonicalize a path so that equivalent spellings share one cache key
///
/// Resolves symlinks, `.` and `..`, and drops trailing separators. Uses dunce
/// so Windows paths do not come back in `\\?\` form.
pub fn canonicalize_path(path: &Path) -> Result<PathBuf, StorageError> {
    dunce::canonicalize(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(path.to_path_buf())
        } else {
            StorageError::io(path, format!("Failed to canonicalize path: {}", e))
        }
    })
}
