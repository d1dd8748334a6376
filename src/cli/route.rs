//! CLI route: single route table and run context.

use crate::cli::output::{format_compiled, format_status};
use crate::cli::parse::Commands;
use crate::error::ApiError;
use crate::types::ProfileId;
use crate::workspace::Workspace;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Runtime context for CLI execution: the workspace facade.
pub struct RunContext {
    workspace: Workspace,
}

impl RunContext {
    /// Load configuration (from `config_path` or the workspace) and apply the
    /// `--root` override.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        root: Option<PathBuf>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            workspace: Workspace::open(&workspace_root, config_path.as_deref(), root)?,
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let result = self.execute_inner(command).await;
        info!(
            command = command.name(),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    async fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Compile { profile, force } => {
                let profile_id: ProfileId = profile.parse()?;
                let compiled = self.workspace.compile(&profile_id, *force).await?;
                Ok(format_compiled(&compiled))
            }
            Commands::Plan { profile, output } => {
                let profile_id: ProfileId = profile.parse()?;
                let plan = self.workspace.generate_mount_plan(&profile_id)?;
                match output {
                    Some(path) => {
                        plan.write_to(path)?;
                        Ok(format!("Wrote mount plan to {}", path.display()))
                    }
                    None => plan.to_json_pretty().map_err(|e| {
                        ApiError::Storage(crate::error::StorageError::Serialization {
                            path: PathBuf::from("-"),
                            message: e.to_string(),
                        })
                    }),
                }
            }
            Commands::Resolve { module, hint } => {
                let source = self.workspace.resolve(module, hint)?;
                Ok(source.path.display().to_string())
            }
            Commands::Status { profile } => {
                let profile_id: ProfileId = profile.parse()?;
                let status = self.workspace.status(&profile_id).await?;
                Ok(format_status(profile, status))
            }
            Commands::Profiles { collection } => {
                let profiles = self.workspace.list_profiles(collection).await?;
                Ok(profiles.join("\n"))
            }
        }
    }
}
