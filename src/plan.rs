//! Mount plan generation
//!
//! A mount plan is what the session runtime consumes. It never contains a
//! filesystem path: every module carries the `collection/profile` hint it was
//! compiled under, and the runtime turns that back into a path with
//! [`ModuleResolver`](crate::resolver::ModuleResolver).

use crate::error::{ProfileNotCompiledError, StorageError};
use crate::profile::{
    agent_file_name, compiled_profile_dir, ModuleEntry, ProfileManifest, AGENTS_DIR,
    MANIFEST_FILE,
};
use crate::tree::publish::write_atomic;
use crate::types::ProfileId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Execution plan for one profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountPlan {
    pub session: SessionMounts,

    #[serde(default)]
    pub providers: Vec<ModuleMount>,

    #[serde(default)]
    pub tools: Vec<ModuleMount>,

    #[serde(default)]
    pub hooks: Vec<ModuleMount>,

    #[serde(default)]
    pub agents: BTreeMap<String, AgentMount>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub ui: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMounts {
    pub orchestrator: ModuleMount,
    pub context: ModuleMount,
}

/// A module to mount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleMount {
    pub module: String,
    /// `collection/profile` hint
    pub source: String,
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// An agent definition, embedded inline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMount {
    pub content: String,
    pub metadata: AgentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// `collection/profile:agents/<name>`
    pub source: String,
}

impl MountPlan {
    /// All module mounts, session first
    pub fn module_mounts(&self) -> impl Iterator<Item = &ModuleMount> {
        [&self.session.orchestrator, &self.session.context]
            .into_iter()
            .chain(self.providers.iter())
            .chain(self.tools.iter())
            .chain(self.hooks.iter())
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), StorageError> {
        let json = self
            .to_json_pretty()
            .map_err(|e| StorageError::Serialization {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        write_atomic(path, json.as_bytes())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, StorageError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_path_buf()),
            _ => StorageError::io(path, e),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Builds mount plans from compiled profiles. Read-only: never fetches and
/// never writes.
#[derive(Debug, Clone)]
pub struct MountPlanGenerator {
    root: PathBuf,
}

impl MountPlanGenerator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn generate(&self, profile_id: &ProfileId) -> Result<MountPlan, ProfileNotCompiledError> {
        let not_compiled = |reason: String| ProfileNotCompiledError {
            profile_id: profile_id.to_string(),
            reason,
        };

        let dir = compiled_profile_dir(&self.root, profile_id);
        let manifest_path = dir.join(MANIFEST_FILE);
        let bytes = std::fs::read(&manifest_path)
            .map_err(|e| not_compiled(format!("cannot read {}: {}", manifest_path.display(), e)))?;
        let manifest: ProfileManifest = serde_json::from_slice(&bytes)
            .map_err(|e| not_compiled(format!("invalid {}: {}", manifest_path.display(), e)))?;

        let hint = profile_id.to_string();
        let mount = |entry: &ModuleEntry| ModuleMount {
            module: entry.module.clone(),
            source: hint.clone(),
            config: entry.config.clone(),
        };

        let orchestrator = manifest
            .session
            .orchestrator
            .as_ref()
            .ok_or_else(|| not_compiled("manifest has no session.orchestrator".to_string()))?;
        let context = manifest
            .session
            .context
            .as_ref()
            .ok_or_else(|| not_compiled("manifest has no session.context".to_string()))?;

        let mut agents = BTreeMap::new();
        for name in manifest.agents.keys() {
            let path = dir.join(AGENTS_DIR).join(agent_file_name(name));
            let content = std::fs::read_to_string(&path).map_err(|e| {
                not_compiled(format!("cannot read agent '{}' at {}: {}", name, path.display(), e))
            })?;
            agents.insert(
                name.clone(),
                AgentMount {
                    content,
                    metadata: AgentMetadata {
                        source: format!("{}:{}/{}", hint, AGENTS_DIR, name),
                    },
                },
            );
        }

        let plan = MountPlan {
            session: SessionMounts {
                orchestrator: mount(orchestrator),
                context: mount(context),
            },
            providers: manifest.providers.iter().map(mount).collect(),
            tools: manifest.tools.iter().map(mount).collect(),
            hooks: manifest.hooks.iter().map(mount).collect(),
            agents,
            ui: manifest.ui.clone(),
        };

        debug!(
            profile = %profile_id,
            modules = plan.module_mounts().count(),
            agents = plan.agents.len(),
            "Generated mount plan"
        );
        Ok(plan)
    }
}
