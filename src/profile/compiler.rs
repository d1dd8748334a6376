//! Profile compilation
//!
//! compile = load chain → merge → validate → hash → (lock check) → fetch all
//! → stage tree → publish → write lock.
//!
//! Everything up to the hash is offline apart from resolving collections.
//! Nothing is written until every resource has been fetched, so a failure at
//! any point leaves the previous compiled tree and lock untouched.

use crate::cache::{ArtifactCache, CacheEntry};
use crate::collection::{profile_path, CollectionResolver};
use crate::concurrency::ProfileLockManager;
use crate::error::{CompilationError, StorageError};
use crate::mount::{classify, MountType};
use crate::profile::inherit::{merge_chain, Ancestry};
use crate::profile::lock::{CompilationLock, LockedResource};
use crate::profile::manifest::{ModuleEntry, ProfileManifest};
use crate::profile::validation::validate;
use crate::profile::{
    agent_file_name, compiled_profile_dir, lock_file_path, AGENTS_DIR, CONTEXTS_DIR,
    MANIFEST_FILE,
};
use crate::reference::Reference;
use crate::tree::hasher::compute_manifest_hash;
use crate::tree::publish::{copy_into, replace_dir};
use crate::types::ProfileId;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of a compile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledProfile {
    pub profile_id: ProfileId,
    /// Root of the compiled tree
    pub path: PathBuf,
    /// Hex manifest hash
    pub manifest_hash: String,
    /// False when the existing tree was already up to date
    pub recompiled: bool,
}

/// Whether a profile needs compiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    NotCompiled,
    Stale,
    UpToDate,
}

/// Declared slot of a resource, used for lock keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Orchestrator,
    Context,
    Providers,
    Tools,
    Hooks,
    Agents,
    Contexts,
}

impl Category {
    fn as_str(&self) -> &'static str {
        match self {
            Category::Orchestrator => "orchestrator",
            Category::Context => "context",
            Category::Providers => "providers",
            Category::Tools => "tools",
            Category::Hooks => "hooks",
            Category::Agents => "agents",
            Category::Contexts => "contexts",
        }
    }

    /// Mount type a module declared in this slot is expected to classify as
    fn expected_mount(&self) -> Option<MountType> {
        match self {
            Category::Orchestrator => Some(MountType::Orchestrator),
            Category::Context => Some(MountType::Context),
            Category::Providers => Some(MountType::Providers),
            Category::Tools => Some(MountType::Tools),
            Category::Hooks => Some(MountType::Hooks),
            Category::Agents | Category::Contexts => None,
        }
    }
}

/// A resource to fetch and where it goes in the compiled tree
#[derive(Debug, Clone)]
struct PlannedResource {
    category: Category,
    name: String,
    module: Option<String>,
    reference: Reference,
    /// Relative to the compiled tree root
    target: PathBuf,
}

impl PlannedResource {
    fn lock_key(&self) -> String {
        format!("{}/{}", self.category.as_str(), self.name)
    }
}

/// Compiles profiles into `<root>/profiles`
pub struct ProfileCompiler {
    root: PathBuf,
    collections: CollectionResolver,
    cache: ArtifactCache,
    locks: Arc<ProfileLockManager>,
    concurrency: usize,
    timeout: Duration,
}

impl ProfileCompiler {
    pub fn new(root: impl Into<PathBuf>, collections: CollectionResolver, cache: ArtifactCache) -> Self {
        let root = root.into();
        Self {
            locks: ProfileLockManager::shared(&root),
            root,
            collections,
            cache,
            concurrency: crate::config::default_concurrency(),
            timeout: Duration::from_secs(crate::config::default_timeout_secs()),
        }
    }

    /// Set the per-profile fetch parallelism and the per-fetch timeout
    pub fn with_fetch_limits(mut self, concurrency: usize, timeout: Duration) -> Self {
        self.concurrency = concurrency.max(1);
        self.timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load `profile_id` and all of its ancestors, merged and validated
    pub async fn load_manifest(
        &self,
        profile_id: &ProfileId,
    ) -> Result<ProfileManifest, CompilationError> {
        let mut ancestry = Ancestry::new();
        let mut chain = Vec::new();
        let mut next = Some(profile_id.clone());

        while let Some(current) = next {
            ancestry.visit(&current)?;
            let collection_root = self.collections.resolve(current.collection()).await?;
            let manifest =
                ProfileManifest::load(&current, &profile_path(&collection_root, current.profile()))?;

            next = manifest
                .profile
                .extends
                .as_deref()
                .map(|parent| current.parse_relative(parent))
                .transpose()?;
            chain.push(manifest);
        }

        debug!(
            profile = %profile_id,
            chain = ?ancestry.chain().iter().map(ToString::to_string).collect::<Vec<_>>(),
            "Loaded profile chain"
        );
        let merged = merge_chain(chain);
        validate(profile_id, &merged)?;
        Ok(merged)
    }

    /// Compile a profile, skipping all work when the lock shows the same
    /// manifest was already compiled (unless `force`)
    pub async fn compile(
        &self,
        profile_id: &ProfileId,
        force: bool,
    ) -> Result<CompiledProfile, CompilationError> {
        let started = Instant::now();
        let manifest = self.load_manifest(profile_id).await?;
        let resources = plan_resources(&manifest)?;
        let manifest_value = manifest_value(profile_id, &manifest)?;
        let manifest_hash = hex::encode(compute_manifest_hash(&manifest_value));

        let dir = compiled_profile_dir(&self.root, profile_id);
        let lock_path = lock_file_path(&self.root, profile_id);

        // Single writer per profile from the lock check through publication
        let _guard = self.locks.lock(profile_id).await;

        if !force {
            if let Some(lock) = CompilationLock::read(&lock_path) {
                if lock.profile_hash == manifest_hash && dir.is_dir() {
                    info!(profile = %profile_id, hash = %manifest_hash, "Profile up to date");
                    return Ok(CompiledProfile {
                        profile_id: profile_id.clone(),
                        path: dir,
                        manifest_hash,
                        recompiled: false,
                    });
                }
            }
        }

        let entries = self.fetch_all(&resources).await?;

        let staging_parent = dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        let tree_name = profile_id.profile().to_string();
        let manifest_json = serde_json::to_vec_pretty(&manifest_value).map_err(|e| {
            StorageError::Serialization {
                path: dir.join(MANIFEST_FILE),
                message: e.to_string(),
            }
        })?;
        {
            let resources = resources.clone();
            let entries = entries.clone();
            let dir = dir.clone();
            tokio::task::spawn_blocking(move || {
                build_and_publish(
                    &staging_parent,
                    &tree_name,
                    &dir,
                    &resources,
                    &entries,
                    &manifest_json,
                )
            })
            .await
            .map_err(|e| StorageError::io(&self.root, e))??;
        }

        let locked = resources
            .iter()
            .zip(&entries)
            .map(|(resource, entry)| {
                (
                    resource.lock_key(),
                    LockedResource {
                        module: resource.module.clone(),
                        source: resource.reference.to_string(),
                        identity: entry.key.to_string(),
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();
        CompilationLock::new(manifest_hash.clone(), locked).write(&lock_path)?;

        info!(
            profile = %profile_id,
            hash = %manifest_hash,
            resources = resources.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Compiled profile"
        );

        Ok(CompiledProfile {
            profile_id: profile_id.clone(),
            path: dir,
            manifest_hash,
            recompiled: true,
        })
    }

    /// Compare the current manifest against the last compile, without
    /// fetching any module
    pub async fn status(&self, profile_id: &ProfileId) -> Result<ProfileStatus, CompilationError> {
        let dir = compiled_profile_dir(&self.root, profile_id);
        let Some(lock) = CompilationLock::read(&lock_file_path(&self.root, profile_id)) else {
            return Ok(ProfileStatus::NotCompiled);
        };
        if !dir.is_dir() {
            return Ok(ProfileStatus::NotCompiled);
        }

        let manifest = self.load_manifest(profile_id).await?;
        let hash = hex::encode(compute_manifest_hash(&manifest_value(profile_id, &manifest)?));
        if hash == lock.profile_hash {
            Ok(ProfileStatus::UpToDate)
        } else {
            Ok(ProfileStatus::Stale)
        }
    }

    async fn fetch_all(
        &self,
        resources: &[PlannedResource],
    ) -> Result<Vec<CacheEntry>, CompilationError> {
        let cache = &self.cache;
        let timeout = self.timeout;
        let entries: Vec<CacheEntry> = stream::iter(resources)
            .map(|resource| async move {
                let entry = cache.get_or_fetch_within(&resource.reference, timeout).await?;
                debug!(resource = %resource.lock_key(), key = %entry.key, "Resolved resource");
                Ok::<_, CompilationError>(entry)
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;
        Ok(entries)
    }
}

/// Turn the merged manifest into a list of fetches, classifying every module.
/// Runs before any network access.
/// The merged manifest as JSON, the input of the manifest hash
fn manifest_value(
    profile_id: &ProfileId,
    manifest: &ProfileManifest,
) -> Result<serde_json::Value, CompilationError> {
    manifest.to_value().map_err(|e| CompilationError::Manifest {
        profile: profile_id.to_string(),
        message: format!("cannot serialize merged manifest: {}", e),
    })
}

fn plan_resources(manifest: &ProfileManifest) -> Result<Vec<PlannedResource>, CompilationError> {
    let mut planned: Vec<PlannedResource> = Vec::new();

    let slots: [(Category, Vec<&ModuleEntry>); 5] = [
        (Category::Orchestrator, manifest.session.orchestrator.iter().collect()),
        (Category::Context, manifest.session.context.iter().collect()),
        (Category::Providers, manifest.providers.iter().collect()),
        (Category::Tools, manifest.tools.iter().collect()),
        (Category::Hooks, manifest.hooks.iter().collect()),
    ];

    for (category, entries) in slots {
        for entry in entries {
            let mount_type = classify(&entry.module)?;
            if category.expected_mount() != Some(mount_type) {
                warn!(
                    module = %entry.module,
                    declared = category.as_str(),
                    classified = mount_type.as_str(),
                    "Module declared in a slot that does not match its name; mounting by name"
                );
            }

            let source = entry.source.as_deref().unwrap_or_default();
            let reference = Reference::parse(source)?;
            let target = Path::new(mount_type.as_str()).join(&entry.module);

            if let Some(existing) = planned.iter().find(|p| p.target == target) {
                if existing.reference != reference {
                    return Err(CompilationError::InvalidArtifact {
                        resource: entry.module.clone(),
                        message: "declared more than once with different sources".to_string(),
                    });
                }
                continue;
            }

            planned.push(PlannedResource {
                category,
                name: entry.module.clone(),
                module: Some(entry.module.clone()),
                reference,
                target,
            });
        }
    }

    for (name, source) in &manifest.agents {
        planned.push(PlannedResource {
            category: Category::Agents,
            name: name.clone(),
            module: None,
            reference: Reference::parse(source)?,
            target: Path::new(AGENTS_DIR).join(agent_file_name(name)),
        });
    }

    for (name, source) in &manifest.context {
        planned.push(PlannedResource {
            category: Category::Contexts,
            name: name.clone(),
            module: None,
            reference: Reference::parse(source)?,
            target: Path::new(CONTEXTS_DIR).join(name),
        });
    }

    Ok(planned)
}

/// Stage the compiled tree next to its final location and swap it in
fn build_and_publish(
    staging_parent: &Path,
    tree_name: &str,
    dest: &Path,
    resources: &[PlannedResource],
    entries: &[CacheEntry],
    manifest_json: &[u8],
) -> Result<(), CompilationError> {
    std::fs::create_dir_all(staging_parent).map_err(|e| StorageError::io(staging_parent, e))?;
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(staging_parent)
        .map_err(|e| StorageError::io(staging_parent, e))?;
    let tree = staging.path().join(tree_name);
    std::fs::create_dir_all(&tree).map_err(|e| StorageError::io(&tree, e))?;

    for (resource, entry) in resources.iter().zip(entries) {
        let target = tree.join(&resource.target);
        match resource.category {
            Category::Agents => {
                if !entry.local_path.is_file() {
                    return Err(CompilationError::InvalidArtifact {
                        resource: resource.lock_key(),
                        message: "agent references must resolve to a single file".to_string(),
                    });
                }
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
                }
                std::fs::copy(&entry.local_path, &target)
                    .map_err(|e| StorageError::io(&entry.local_path, e))?;
            }
            _ => copy_into(&entry.local_path, &target)?,
        }
    }

    let manifest_path = tree.join(MANIFEST_FILE);
    std::fs::write(&manifest_path, manifest_json)
        .map_err(|e| StorageError::io(&manifest_path, e))?;

    replace_dir(&tree, dest)?;
    Ok(())
}
