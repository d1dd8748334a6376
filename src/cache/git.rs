//! Version-control fetcher backed by the `git` command line

use crate::cache::fetch::{is_full_revision, VcsFetcher};
use crate::error::FetchError;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Runs `git` as a subprocess
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
}

impl GitCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, reference: &str, args: &[&str]) -> Result<String, FetchError> {
        debug!(binary = %self.binary, args = ?args, "Running git");
        let output = Command::new(&self.binary)
            .args(args)
            // Never block on an interactive credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| FetchError::io(reference, format!("failed to run {}: {}", self.binary, e)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(classify_git_failure(reference, stderr.trim()))
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl VcsFetcher for GitCli {
    async fn resolve_revision(
        &self,
        location: &str,
        revision: Option<&str>,
    ) -> Result<String, FetchError> {
        if let Some(rev) = revision.filter(|r| is_full_revision(r)) {
            return Ok(rev.to_ascii_lowercase());
        }

        let wanted = revision.unwrap_or("HEAD");
        let listing = self.run(location, &["ls-remote", location, wanted]).await?;
        pick_revision(&listing, wanted).ok_or_else(|| FetchError::NotFound {
            reference: location.to_string(),
            message: format!("revision '{}' not found on remote", wanted),
        })
    }

    async fn checkout(
        &self,
        location: &str,
        revision: &str,
        dest: &Path,
    ) -> Result<(), FetchError> {
        let dest_str = dest.to_string_lossy();
        self.run(
            location,
            &["clone", "--quiet", "--no-checkout", location, dest_str.as_ref()],
        )
        .await?;
        self.run(
            location,
            &["-C", dest_str.as_ref(), "checkout", "--quiet", "--detach", revision],
        )
        .await?;

        // Cached checkouts are plain trees; history is not part of the artifact
        let git_dir = dest.join(".git");
        tokio::fs::remove_dir_all(&git_dir)
            .await
            .map_err(|e| FetchError::io(location, e))?;
        Ok(())
    }
}

/// Pick the object id for `wanted` out of `git ls-remote` output.
///
/// Annotated tags are peeled (`refs/tags/x^{}` wins over `refs/tags/x`).
fn pick_revision(listing: &str, wanted: &str) -> Option<String> {
    let refs: Vec<(&str, &str)> = listing
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .collect();

    let peeled = format!("refs/tags/{}^{{}}", wanted);
    if let Some((sha, _)) = refs.iter().find(|(_, name)| *name == peeled) {
        return Some(sha.to_string());
    }

    let candidates = [
        wanted.to_string(),
        format!("refs/heads/{}", wanted),
        format!("refs/tags/{}", wanted),
    ];
    candidates.iter().find_map(|candidate| {
        refs.iter()
            .find(|(_, name)| name == candidate)
            .map(|(sha, _)| sha.to_string())
    })
}

fn classify_git_failure(reference: &str, stderr: &str) -> FetchError {
    let lower = stderr.to_ascii_lowercase();
    let message = stderr.to_string();
    let reference = reference.to_string();

    if lower.contains("authentication failed")
        || lower.contains("could not read username")
        || lower.contains("permission denied")
        || lower.contains("terminal prompts disabled")
    {
        FetchError::Authentication { reference, message }
    } else if lower.contains("not found")
        || lower.contains("does not exist")
        || lower.contains("did not match any")
        || lower.contains("unknown revision")
        || lower.contains("reference is not a tree")
    {
        FetchError::NotFound { reference, message }
    } else {
        FetchError::Network { reference, message }
    }
}
