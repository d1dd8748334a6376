//! Runtime module resolution
//!
//! `(module id, hint)` → compiled module directory, reconstructed from the
//! same classification table the compiler used to lay the tree out. No
//! manifest is read.

use crate::error::ResolutionError;
use crate::mount::classify;
use crate::plan::MountPlan;
use crate::profile::compiled_profile_dir;
use crate::types::ProfileId;
use serde::Serialize;
use std::path::PathBuf;

/// Where a module lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSource {
    pub path: PathBuf,
    pub module_id: String,
}

#[derive(Debug, Clone)]
pub struct ModuleResolver {
    root: PathBuf,
}

impl ModuleResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<root>/profiles/<collection>/<profile>/<mount type>/<module id>`.
    ///
    /// Pure: the path is computed, not checked.
    pub fn resolve(&self, module_id: &str, hint: &str) -> Result<ModuleSource, ResolutionError> {
        let profile_id: ProfileId = hint
            .parse()
            .map_err(|_| ResolutionError::InvalidHint(hint.to_string()))?;
        let mount_type = classify(module_id)?;

        Ok(ModuleSource {
            path: compiled_profile_dir(&self.root, &profile_id)
                .join(mount_type.as_str())
                .join(module_id),
            module_id: module_id.to_string(),
        })
    }

    /// [`resolve`](Self::resolve), failing when the directory does not exist
    pub fn resolve_existing(
        &self,
        module_id: &str,
        hint: &str,
    ) -> Result<ModuleSource, ResolutionError> {
        let source = self.resolve(module_id, hint)?;
        if !source.path.is_dir() {
            return Err(ResolutionError::ModuleSourceNotFound {
                module_id: module_id.to_string(),
                path: source.path,
            });
        }
        Ok(source)
    }

    /// Resolve every module of a plan, session first
    pub fn resolve_plan(&self, plan: &MountPlan) -> Result<Vec<ModuleSource>, ResolutionError> {
        plan.module_mounts()
            .map(|mount| self.resolve_existing(&mount.module, &mount.source))
            .collect()
    }
}
