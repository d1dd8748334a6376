//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::MountplanConfig;
use crate::error::ConfigurationError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the global file, the workspace and the environment.
    pub fn load(workspace_root: &Path) -> Result<MountplanConfig, ConfigurationError> {
        Ok(MergeService::load(workspace_root)?)
    }

    /// Load configuration from a specific file (plus the environment overlay).
    pub fn load_from_file(path: &Path) -> Result<MountplanConfig, ConfigurationError> {
        if !path.is_file() {
            return Err(ConfigurationError::Load(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Ok(MergeService::load_from_file(path)?)
    }
}
