//! Profiles: manifests, inheritance, validation and compilation
//!
//! Compiled layout under the data root:
//!
//! ```text
//! profiles/<collection>/<profile>/
//!   orchestrator/<module>/  context/<module>/  providers/<module>/
//!   tools/<module>/  hooks/<module>/
//!   agents/<name>.md
//!   contexts/<name>/
//!   manifest.json
//! profiles/<collection>/<profile>.lock.json
//! ```

pub mod compiler;
pub mod inherit;
pub mod lock;
pub mod manifest;
pub mod validation;

pub use compiler::{CompiledProfile, ProfileCompiler, ProfileStatus};
pub use lock::{CompilationLock, LockedResource};
pub use manifest::{ModuleEntry, ProfileManifest, ProfileMeta, Session};

use crate::types::{ProfileId, LOCK_FILE_SUFFIX};
use std::path::{Path, PathBuf};

/// Merged manifest written into every compiled tree
pub const MANIFEST_FILE: &str = "manifest.json";
pub const AGENTS_DIR: &str = "agents";
pub const CONTEXTS_DIR: &str = "contexts";
const PROFILES_DIR: &str = "profiles";

/// `<root>/profiles`
pub fn profiles_root(root: &Path) -> PathBuf {
    root.join(PROFILES_DIR)
}

/// `<root>/profiles/<collection>/<profile>`
pub fn compiled_profile_dir(root: &Path, profile_id: &ProfileId) -> PathBuf {
    profiles_root(root)
        .join(profile_id.collection())
        .join(profile_id.profile())
}

/// `<root>/profiles/<collection>/<profile>.lock.json`
pub fn lock_file_path(root: &Path, profile_id: &ProfileId) -> PathBuf {
    profiles_root(root)
        .join(profile_id.collection())
        .join(format!("{}{}", profile_id.profile(), LOCK_FILE_SUFFIX))
}

/// File name of an agent inside `agents/`
pub fn agent_file_name(name: &str) -> String {
    format!("{}.md", name)
}
