//! Configuration System
//!
//! Layered configuration: built-in defaults, the user's global file, the
//! workspace files and finally `MOUNTPLAN__*` environment variables. The result
//! is loaded once at startup and handed to the components that need it.

use crate::error::ConfigurationError;
use crate::logging::LoggingConfig;
use crate::reference::Reference;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

mod facade;
mod merge;
mod paths;
mod sources;

pub use facade::ConfigLoader;

/// XDG path helpers
pub mod xdg {
    pub use super::paths::xdg_root::*;
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MountplanConfig {
    /// Data root holding `cache/` and `profiles/` (defaults to `$XDG_DATA_HOME/mountplan`)
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Collection registry
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,

    /// Fetch behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A registry entry: a collection name and where to get it from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    pub source: String,
}

/// Fetch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Resources of one profile fetched concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Upper bound for a single fetch, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Git executable
    #[serde(default = "default_git_binary")]
    pub git_binary: String,

    /// User-Agent sent with HTTP downloads
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

pub(crate) fn default_concurrency() -> usize {
    8
}

pub(crate) fn default_timeout_secs() -> u64 {
    300
}

pub(crate) fn default_git_binary() -> String {
    "git".to_string()
}

pub(crate) fn default_user_agent() -> String {
    format!("mountplan/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            git_binary: default_git_binary(),
            user_agent: default_user_agent(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Collection(String, String),
    Fetch(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Collection(name, msg) => write!(f, "Collection '{}': {}", name, msg),
            ValidationError::Fetch(msg) => write!(f, "Fetch: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<Vec<ValidationError>> for ConfigurationError {
    fn from(errors: Vec<ValidationError>) -> Self {
        ConfigurationError::Invalid(errors.iter().map(|e| e.to_string()).collect())
    }
}

impl MountplanConfig {
    /// Validate the entire configuration, reporting every problem found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let mut seen = HashSet::new();
        for collection in &self.collections {
            if collection.name.trim().is_empty() {
                errors.push(ValidationError::Collection(
                    collection.name.clone(),
                    "name cannot be empty".to_string(),
                ));
            } else if !crate::types::is_path_segment(&collection.name) {
                errors.push(ValidationError::Collection(
                    collection.name.clone(),
                    "name must be a single path segment".to_string(),
                ));
            }
            if !seen.insert(collection.name.as_str()) {
                errors.push(ValidationError::Collection(
                    collection.name.clone(),
                    "defined more than once".to_string(),
                ));
            }
            if let Err(e) = Reference::parse(&collection.source) {
                errors.push(ValidationError::Collection(
                    collection.name.clone(),
                    e.to_string(),
                ));
            }
        }

        if self.fetch.concurrency == 0 {
            errors.push(ValidationError::Fetch(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            errors.push(ValidationError::Fetch(
                "timeout_secs must be at least 1".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The configured data root, or `$XDG_DATA_HOME/mountplan`
    pub fn effective_root(&self) -> Result<PathBuf, ConfigurationError> {
        if let Some(root) = &self.root {
            return Ok(root.clone());
        }
        xdg::data_root()
    }
}
