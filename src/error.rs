//! Error types for profile compilation, mount plan generation and module resolution.

use std::path::PathBuf;
use thiserror::Error;

pub use crate::types::InvalidProfileId;

/// A reference string that matches no supported scheme, or carries a subpath
/// fragment on a scheme that cannot have one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed reference '{reference}': {reason}")]
pub struct MalformedReferenceError {
    pub reference: String,
    pub reason: String,
}

impl MalformedReferenceError {
    pub(crate) fn new(reference: &str, reason: impl Into<String>) -> Self {
        Self {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }
}

/// Fetch failures.
///
/// Causes are carried as strings so a single result can be handed to every
/// caller waiting on the same in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Network failure fetching {reference}: {message}")]
    Network { reference: String, message: String },

    #[error("Authentication failed fetching {reference}: {message}")]
    Authentication { reference: String, message: String },

    #[error("Not found: {reference}: {message}")]
    NotFound { reference: String, message: String },

    #[error("I/O failure while caching {reference}: {message}")]
    Io { reference: String, message: String },

    #[error("Fetch of {reference} timed out after {seconds}s")]
    Timeout { reference: String, seconds: u64 },

    #[error("Fetch of {reference} was abandoned before it completed")]
    Abandoned { reference: String },
}

impl FetchError {
    /// The reference whose fetch failed
    pub fn reference(&self) -> &str {
        match self {
            FetchError::Network { reference, .. }
            | FetchError::Authentication { reference, .. }
            | FetchError::NotFound { reference, .. }
            | FetchError::Io { reference, .. }
            | FetchError::Timeout { reference, .. }
            | FetchError::Abandoned { reference } => reference,
        }
    }

    pub(crate) fn io(reference: &str, err: impl std::fmt::Display) -> Self {
        FetchError::Io {
            reference: reference.to_string(),
            message: err.to_string(),
        }
    }
}

/// Collection lookup errors
#[derive(Debug, Clone, Error)]
pub enum CollectionError {
    #[error("Collection not found in registry: {0}")]
    NotFound(String),

    #[error("Collection '{name}' has a malformed source: {source}")]
    MalformedSource {
        name: String,
        #[source]
        source: MalformedReferenceError,
    },

    #[error("Failed to fetch collection '{name}': {source}")]
    Fetch {
        name: String,
        #[source]
        source: FetchError,
    },
}

/// A module identifier that matches no mount type naming rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown mount type for module '{module_id}': no naming rule matches")]
pub struct UnknownMountTypeError {
    pub module_id: String,
}

/// A merged manifest that is missing a required field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Profile '{profile}' is invalid: {field}: {reason}")]
pub struct ProfileValidationError {
    pub profile: String,
    pub field: String,
    pub reason: String,
}

/// Filesystem and serialization failures while reading or writing compiled state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error at {path:?}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("File not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Failed to (de)serialize {path:?}: {message}")]
    Serialization { path: PathBuf, message: String },

    #[error("Symlink {path:?} -> {target:?} is absolute or leaves the artifact")]
    UnsupportedLink { path: PathBuf, target: PathBuf },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        StorageError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Anything that can abort a compile. The previous compiled tree is left intact.
#[derive(Debug, Error)]
pub enum CompilationError {
    #[error(transparent)]
    InvalidProfileId(#[from] InvalidProfileId),

    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error("Profile '{profile}' not found at {path:?}")]
    ProfileNotFound { profile: String, path: PathBuf },

    #[error("Failed to parse manifest for '{profile}': {message}")]
    Manifest { profile: String, message: String },

    #[error("Inheritance cycle: {}", .chain.join(" -> "))]
    InheritanceCycle { chain: Vec<String> },

    #[error(transparent)]
    Validation(#[from] ProfileValidationError),

    #[error(transparent)]
    MalformedReference(#[from] MalformedReferenceError),

    #[error(transparent)]
    UnknownMountType(#[from] UnknownMountTypeError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Resource '{resource}' is unusable: {message}")]
    InvalidArtifact { resource: String, message: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The compiled tree of a profile is missing or unreadable.
#[derive(Debug, Error)]
#[error("Profile '{profile_id}' is not compiled: {reason}")]
pub struct ProfileNotCompiledError {
    pub profile_id: String,
    pub reason: String,
}

/// Runtime module resolution failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Invalid hint '{0}' (expected 'collection/profile')")]
    InvalidHint(String),

    #[error(transparent)]
    UnknownMountType(#[from] UnknownMountTypeError),

    #[error("Module source not found for '{module_id}' at {path:?}")]
    ModuleSourceNotFound { module_id: String, path: PathBuf },
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Configuration error: {0}")]
    Load(String),

    #[error("Configuration validation failed:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(err: config::ConfigError) -> Self {
        ConfigurationError::Load(err.to_string())
    }
}

/// Errors surfaced by the workspace facade and the CLI
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    InvalidProfileId(#[from] InvalidProfileId),

    #[error(transparent)]
    Collection(#[from] CollectionError),

    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error(transparent)]
    NotCompiled(#[from] ProfileNotCompiledError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
