//! Mount type classification
//!
//! The compiler decides where a module lives on disk and the resolver later
//! reconstructs that location from the module id alone. They never talk to each
//! other, so both go through [`classify`] and the single [`RULES`] table below.

use crate::error::UnknownMountTypeError;
use crate::types::is_path_segment;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Functional category of a module, and the directory it is compiled into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountType {
    Orchestrator,
    Context,
    Providers,
    Tools,
    Hooks,
}

impl MountType {
    pub const ALL: [MountType; 5] = [
        MountType::Orchestrator,
        MountType::Context,
        MountType::Providers,
        MountType::Tools,
        MountType::Hooks,
    ];

    /// Directory name inside a compiled profile
    pub fn as_str(&self) -> &'static str {
        match self {
            MountType::Orchestrator => "orchestrator",
            MountType::Context => "context",
            MountType::Providers => "providers",
            MountType::Tools => "tools",
            MountType::Hooks => "hooks",
        }
    }
}

impl fmt::Display for MountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered naming rules; the first matching prefix wins.
pub const RULES: &[(&str, MountType)] = &[
    ("loop-", MountType::Orchestrator),
    ("orchestrator-", MountType::Orchestrator),
    ("context-", MountType::Context),
    ("provider-", MountType::Providers),
    ("tool-", MountType::Tools),
    ("hooks-", MountType::Hooks),
    ("hook-", MountType::Hooks),
];

/// Classify a module id by its naming prefix.
///
/// Ids that are not a single plain path segment are rejected as well, since
/// they could never name a directory written by the compiler.
pub fn classify(module_id: &str) -> Result<MountType, UnknownMountTypeError> {
    if !is_path_segment(module_id) {
        return Err(UnknownMountTypeError {
            module_id: module_id.to_string(),
        });
    }

    RULES
        .iter()
        .find(|(prefix, _)| module_id.starts_with(prefix))
        .map(|(_, mount_type)| *mount_type)
        .ok_or_else(|| UnknownMountTypeError {
            module_id: module_id.to_string(),
        })
}
