//! CLI output: error mapping and result formatting.

use crate::error::{ApiError, CompilationError};
use crate::profile::{CompiledProfile, ProfileStatus};

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::Compilation(CompilationError::Fetch(fetch)) => {
            format!("{}\nThe previously compiled profile, if any, is unchanged.", fetch)
        }
        other => other.to_string(),
    }
}

pub(crate) fn format_compiled(compiled: &CompiledProfile) -> String {
    let verb = if compiled.recompiled {
        "Compiled"
    } else {
        "Up to date:"
    };
    format!(
        "{} {}\n  path: {}\n  hash: {}",
        verb,
        compiled.profile_id,
        compiled.path.display(),
        compiled.manifest_hash
    )
}

pub(crate) fn format_status(profile: &str, status: ProfileStatus) -> String {
    let label = match status {
        ProfileStatus::NotCompiled => "not compiled",
        ProfileStatus::Stale => "stale",
        ProfileStatus::UpToDate => "up to date",
    };
    format!("{}: {}", profile, label)
}
