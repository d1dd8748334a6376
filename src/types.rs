//! Core types shared across the compiler, plan generator and resolver.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hash: Generic 256-bit hash value
pub type Hash = [u8; 32];

/// Identifier of a profile inside a collection: `collection/profile`.
///
/// The string form doubles as the portable hint written into mount plans, so
/// both segments are restricted to a single, non-traversing path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProfileId {
    collection: String,
    profile: String,
}

impl ProfileId {
    /// Build a profile id from its two segments, validating both.
    pub fn new(collection: &str, profile: &str) -> Result<Self, InvalidProfileId> {
        if !is_path_segment(collection) || !is_path_segment(profile) {
            return Err(InvalidProfileId(format!("{}/{}", collection, profile)));
        }
        Ok(Self {
            collection: collection.to_string(),
            profile: profile.to_string(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Parse an `extends` value declared inside `self`'s manifest.
    ///
    /// A bare profile name refers to the declaring collection.
    pub fn parse_relative(&self, value: &str) -> Result<Self, InvalidProfileId> {
        if value.contains('/') {
            value.parse()
        } else {
            Self::new(&self.collection, value)
        }
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.profile)
    }
}

impl FromStr for ProfileId {
    type Err = InvalidProfileId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(collection), Some(profile), None) => Self::new(collection, profile),
            _ => Err(InvalidProfileId(s.to_string())),
        }
    }
}

impl TryFrom<String> for ProfileId {
    type Error = InvalidProfileId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProfileId> for String {
    fn from(id: ProfileId) -> Self {
        id.to_string()
    }
}

/// A string that is not a valid `collection/profile` id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid profile id '{0}' (expected 'collection/profile')")]
pub struct InvalidProfileId(pub String);

/// Suffix of the lock file written next to each compiled profile directory
pub(crate) const LOCK_FILE_SUFFIX: &str = ".lock.json";

/// True when `s` can be used as exactly one directory name.
///
/// Leading dots are reserved for scratch directories (`.staging-*`,
/// `.retired-*`) and the lock file suffix for lock files, so neither can name
/// a collection, profile or module.
pub(crate) fn is_path_segment(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('.')
        && !s.ends_with(LOCK_FILE_SUFFIX)
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
