//! Compilation lock file
//!
//! Written beside a compiled tree after every successful compile and read
//! before the next one to decide whether any work is needed.

use crate::error::StorageError;
use crate::tree::publish::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Contents of `<profile>.lock.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationLock {
    pub generated_at: DateTime<Utc>,
    /// Hex manifest hash of the merged manifest that was compiled
    pub profile_hash: String,
    /// `"<category>/<name>"` → what it resolved to
    pub resources: BTreeMap<String, LockedResource>,
}

/// A resolved resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Canonical reference string
    pub source: String,
    /// `vcs:<revision>` or `content:<sha256>`
    pub identity: String,
}

impl CompilationLock {
    pub fn new(profile_hash: String, resources: BTreeMap<String, LockedResource>) -> Self {
        Self {
            generated_at: Utc::now(),
            profile_hash,
            resources,
        }
    }

    /// Read a lock file.
    ///
    /// A missing file is `None`. So is an unreadable or malformed one: a
    /// corrupt lock only costs a recompile, so it is logged and ignored.
    pub fn read(path: &Path) -> Option<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable lock file, treating as absent");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(lock) => Some(lock),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt lock file, treating as absent");
                None
            }
        }
    }

    /// Write the lock atomically
    pub fn write(&self, path: &Path) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| StorageError::Serialization {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        write_atomic(path, &json)
    }
}
