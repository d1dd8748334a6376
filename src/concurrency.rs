//! Per-profile write serialization
//!
//! Compiles of different profiles run fully in parallel. Compiles of the same
//! profile take that profile's lock from the lock-file check through
//! publication, so exactly one writer ever touches a compiled tree.
//!
//! Managers are shared process-wide per data root, so two workspaces opened on
//! the same root in one process still serialize against each other.

use crate::types::ProfileId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, OwnedMutexGuard};

static MANAGERS: OnceLock<parking_lot::Mutex<HashMap<PathBuf, Arc<ProfileLockManager>>>> =
    OnceLock::new();

/// Key for process-wide registries: `root` with its longest existing prefix
/// canonicalized, so the key is stable before and after the root is created
pub(crate) fn registry_key(root: &Path) -> PathBuf {
    for ancestor in root.ancestors() {
        if let Ok(canonical) = dunce::canonicalize(ancestor) {
            return match root.strip_prefix(ancestor) {
                Ok(rest) => canonical.join(rest),
                Err(_) => canonical,
            };
        }
    }
    root.to_path_buf()
}

/// Per-profile lock manager
pub struct ProfileLockManager {
    /// Map from profile to its writer lock
    locks: RwLock<HashMap<ProfileId, Arc<Mutex<()>>>>,
}

impl ProfileLockManager {
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// The manager shared by every compiler writing under `root`
    pub fn shared(root: &Path) -> Arc<Self> {
        let managers = MANAGERS.get_or_init(|| parking_lot::Mutex::new(HashMap::new()));
        managers
            .lock()
            .entry(registry_key(root))
            .or_insert_with(|| Arc::new(Self::new()))
            .clone()
    }

    /// Get or create the lock for a profile
    fn profile_lock(&self, profile_id: &ProfileId) -> Arc<Mutex<()>> {
        {
            let map = self.locks.read();
            if let Some(lock) = map.get(profile_id) {
                return lock.clone();
            }
        }

        let mut map = self.locks.write();
        // Double-check after acquiring write lock (another task might have created it)
        map.entry(profile_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait for exclusive write access to `profile_id`'s compiled tree
    pub async fn lock(&self, profile_id: &ProfileId) -> OwnedMutexGuard<()> {
        self.profile_lock(profile_id).lock_owned().await
    }
}

impl Default for ProfileLockManager {
    fn default() -> Self {
        Self::new()
    }
}
