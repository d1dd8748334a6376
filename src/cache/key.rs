//! Cache keys
//!
//! A published entry is addressed by `(namespace, identity)`. While a fetch is
//! still running the identity may not be known yet (an HTTP body has to be
//! downloaded before it can be hashed), so in-flight work is keyed separately
//! by [`PendingKey`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Cache namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Version-control checkouts, addressed by concrete revision
    Vcs,
    /// Downloads and local copies, addressed by SHA-256 of their content
    Content,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Vcs => "vcs",
            Namespace::Content => "content",
        }
    }
}

/// Address of a published cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: Namespace,
    pub identity: String,
}

impl CacheKey {
    pub fn vcs(revision: impl Into<String>) -> Self {
        Self {
            namespace: Namespace::Vcs,
            identity: revision.into(),
        }
    }

    pub fn content(sha256: impl Into<String>) -> Self {
        Self {
            namespace: Namespace::Content,
            identity: sha256.into(),
        }
    }
}

/// `vcs:<revision>` or `content:<sha256>`, as recorded in lock files
impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace.as_str(), self.identity)
    }
}

/// Key of an in-flight fetch, used for single-flight deduplication
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PendingKey {
    Vcs { location: String, revision: String },
    Http { url: String },
    Local { path: PathBuf },
}
