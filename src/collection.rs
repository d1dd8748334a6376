//! Collections
//!
//! A collection is a named source of profiles. The registry maps names to
//! references; resolving a name fetches the reference through the artifact
//! cache and yields the local root holding `profiles/*.md`.

use crate::cache::ArtifactCache;
use crate::config::CollectionConfig;
use crate::error::CollectionError;
use crate::reference::Reference;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Directory inside a collection root that holds profile manifests
pub const PROFILES_DIR: &str = "profiles";
/// File extension of profile manifests
pub const PROFILE_EXTENSION: &str = "md";

/// Name → reference lookup table, built once at startup
#[derive(Debug, Clone, Default)]
pub struct CollectionRegistry {
    entries: BTreeMap<String, Reference>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration.
    ///
    /// Relative local sources are resolved against `base` (the workspace root).
    pub fn from_config(
        collections: &[CollectionConfig],
        base: &Path,
    ) -> Result<Self, CollectionError> {
        let mut registry = Self::new();
        for collection in collections {
            let reference = Reference::parse(&collection.source).map_err(|source| {
                CollectionError::MalformedSource {
                    name: collection.name.clone(),
                    source,
                }
            })?;
            registry.insert(&collection.name, reference.anchored_at(base));
        }
        Ok(registry)
    }

    /// Register (or replace) a collection
    pub fn insert(&mut self, name: &str, reference: Reference) {
        self.entries.insert(name.to_string(), reference);
    }

    pub fn get(&self, name: &str) -> Option<&Reference> {
        self.entries.get(name)
    }

    /// Registered collection names, sorted
    #[cfg(test)]
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

/// Resolves collection names to local directories
#[derive(Clone)]
pub struct CollectionResolver {
    registry: CollectionRegistry,
    cache: ArtifactCache,
    timeout: Duration,
}

impl CollectionResolver {
    pub fn new(registry: CollectionRegistry, cache: ArtifactCache) -> Self {
        Self {
            registry,
            cache,
            timeout: Duration::from_secs(crate::config::default_timeout_secs()),
        }
    }

    /// Bound every collection fetch by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    /// Local root directory of `name`
    pub async fn resolve(&self, name: &str) -> Result<PathBuf, CollectionError> {
        let reference = self
            .registry
            .get(name)
            .ok_or_else(|| CollectionError::NotFound(name.to_string()))?;

        let entry = self
            .cache
            .get_or_fetch_within(reference, self.timeout)
            .await
            .map_err(|source| CollectionError::Fetch {
                name: name.to_string(),
                source,
            })?;

        debug!(collection = name, key = %entry.key, root = %entry.local_path.display(), "Resolved collection");
        Ok(entry.local_path)
    }

    /// Sorted names of the profiles a collection provides
    pub async fn list_profiles(&self, name: &str) -> Result<Vec<String>, CollectionError> {
        let root = self.resolve(name).await?;
        Ok(profiles_in(&root))
    }
}

/// Path of a profile manifest inside a collection root
pub fn profile_path(collection_root: &Path, profile: &str) -> PathBuf {
    collection_root
        .join(PROFILES_DIR)
        .join(format!("{}.{}", profile, PROFILE_EXTENSION))
}

fn profiles_in(collection_root: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(collection_root.join(PROFILES_DIR)) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(PROFILE_EXTENSION))
        .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .filter(|name| crate::types::is_path_segment(name))
        .collect();
    names.sort();
    names
}
