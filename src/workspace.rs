//! Workspace facade: one entry point wiring configuration, the artifact
//! cache, collections, the compiler, the plan generator and the resolver.

use crate::cache::{ArtifactCache, GitCli, HttpFetcher, ReqwestHttp, VcsFetcher};
use crate::collection::{CollectionRegistry, CollectionResolver};
use crate::config::{ConfigLoader, MountplanConfig};
use crate::error::{ApiError, ConfigurationError};
use crate::plan::{MountPlan, MountPlanGenerator};
use crate::profile::{CompiledProfile, ProfileCompiler, ProfileStatus};
use crate::resolver::{ModuleResolver, ModuleSource};
use crate::types::ProfileId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const CACHE_DIR: &str = "cache";

pub struct Workspace {
    root: PathBuf,
    config: MountplanConfig,
    collections: CollectionResolver,
    compiler: ProfileCompiler,
    generator: MountPlanGenerator,
    resolver: ModuleResolver,
}

impl Workspace {
    /// Load configuration for `workspace_root` (or from `config_path`), apply
    /// a `root` override and build a workspace using git and HTTP
    pub fn open(
        workspace_root: &Path,
        config_path: Option<&Path>,
        root: Option<PathBuf>,
    ) -> Result<Self, ApiError> {
        let mut config = match config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(workspace_root)?,
        };
        if root.is_some() {
            config.root = root;
        }
        Self::from_config(config, workspace_root)
    }

    /// Build a workspace from loaded configuration using git and HTTP
    pub fn from_config(config: MountplanConfig, workspace_root: &Path) -> Result<Self, ApiError> {
        let vcs = Arc::new(GitCli::new(config.fetch.git_binary.clone()));
        let http = Arc::new(
            ReqwestHttp::new(&config.fetch.user_agent)
                .map_err(|e| ConfigurationError::Load(e.to_string()))?,
        );
        Self::with_fetchers(config, workspace_root, vcs, http)
    }

    /// Build a workspace with explicit fetchers
    pub fn with_fetchers(
        config: MountplanConfig,
        workspace_root: &Path,
        vcs: Arc<dyn VcsFetcher>,
        http: Arc<dyn HttpFetcher>,
    ) -> Result<Self, ApiError> {
        config.validate().map_err(ConfigurationError::from)?;
        let root = config.effective_root()?;
        let root = if root.is_relative() {
            workspace_root.join(root)
        } else {
            root
        };
        let timeout = Duration::from_secs(config.fetch.timeout_secs);

        let cache = ArtifactCache::new(root.join(CACHE_DIR), vcs, http);
        let registry = CollectionRegistry::from_config(&config.collections, workspace_root)?;
        let collections = CollectionResolver::new(registry, cache.clone()).with_timeout(timeout);
        let compiler = ProfileCompiler::new(&root, collections.clone(), cache)
            .with_fetch_limits(config.fetch.concurrency, timeout);

        debug!(
            root = %root.display(),
            collections = config.collections.len(),
            "Workspace ready"
        );

        Ok(Self {
            generator: MountPlanGenerator::new(&root),
            resolver: ModuleResolver::new(&root),
            root,
            config,
            collections,
            compiler,
        })
    }

    /// Data root holding `cache/` and `profiles/`
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &MountplanConfig {
        &self.config
    }

    pub fn compiler(&self) -> &ProfileCompiler {
        &self.compiler
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    pub async fn compile(
        &self,
        profile_id: &ProfileId,
        force: bool,
    ) -> Result<CompiledProfile, ApiError> {
        Ok(self.compiler.compile(profile_id, force).await?)
    }

    pub fn generate_mount_plan(&self, profile_id: &ProfileId) -> Result<MountPlan, ApiError> {
        Ok(self.generator.generate(profile_id)?)
    }

    pub fn resolve(&self, module_id: &str, hint: &str) -> Result<ModuleSource, ApiError> {
        Ok(self.resolver.resolve(module_id, hint)?)
    }

    pub async fn status(&self, profile_id: &ProfileId) -> Result<ProfileStatus, ApiError> {
        Ok(self.compiler.status(profile_id).await?)
    }

    pub async fn list_profiles(&self, collection: &str) -> Result<Vec<String>, ApiError> {
        Ok(self.collections.list_profiles(collection).await?)
    }
}
