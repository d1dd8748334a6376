//! Merged manifest validation
//!
//! Runs before any fetch so that an incomplete profile fails without network
//! access.

use crate::error::ProfileValidationError;
use crate::profile::manifest::{ModuleEntry, ProfileManifest};
use crate::types::{is_path_segment, ProfileId};

/// Check that a merged manifest can be compiled
pub fn validate(
    profile_id: &ProfileId,
    manifest: &ProfileManifest,
) -> Result<(), ProfileValidationError> {
    let fail = |field: &str, reason: &str| ProfileValidationError {
        profile: profile_id.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    };

    let meta = &manifest.profile;
    for (field, value) in [
        ("profile.name", &meta.name),
        ("profile.version", &meta.version),
        ("profile.schema_version", &meta.schema_version),
    ] {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            return Err(fail(field, "missing"));
        }
    }

    let orchestrator = manifest
        .session
        .orchestrator
        .as_ref()
        .ok_or_else(|| fail("session.orchestrator", "missing"))?;
    check_entry(orchestrator).map_err(|r| fail("session.orchestrator", r))?;

    let context = manifest
        .session
        .context
        .as_ref()
        .ok_or_else(|| fail("session.context", "missing"))?;
    check_entry(context).map_err(|r| fail("session.context", r))?;

    if manifest.providers.is_empty() {
        return Err(fail("providers", "at least one provider is required"));
    }

    for (list, entries) in [
        ("providers", &manifest.providers),
        ("tools", &manifest.tools),
        ("hooks", &manifest.hooks),
    ] {
        for (index, entry) in entries.iter().enumerate() {
            let field = format!("{}[{}]", list, index);
            check_entry(entry).map_err(|r| fail(&field, r))?;
        }
    }

    for (map, entries) in [("agents", &manifest.agents), ("context", &manifest.context)] {
        for name in entries.keys() {
            if !is_path_segment(name) {
                return Err(fail(
                    &format!("{}.{}", map, name),
                    "name must be a single path segment",
                ));
            }
        }
    }

    Ok(())
}

fn check_entry(entry: &ModuleEntry) -> Result<(), &'static str> {
    if entry.module.trim().is_empty() {
        return Err("module is missing");
    }
    if entry.source.as_deref().map_or(true, |s| s.trim().is_empty()) {
        return Err("source is missing");
    }
    Ok(())
}
