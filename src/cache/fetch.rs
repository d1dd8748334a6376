//! Fetcher traits
//!
//! The cache only decides *where* things go and *when* they are fetched. The
//! actual transfer is delegated to these traits so tests can swap in fakes.

use crate::error::FetchError;
use async_trait::async_trait;
use std::path::Path;

/// Version-control fetcher
#[async_trait]
pub trait VcsFetcher: Send + Sync {
    /// Turn a branch, tag or revision into a concrete revision id.
    ///
    /// `None` means the remote's default branch.
    async fn resolve_revision(
        &self,
        location: &str,
        revision: Option<&str>,
    ) -> Result<String, FetchError>;

    /// Materialize the repository at `revision` into `dest`, which does not exist yet.
    async fn checkout(&self, location: &str, revision: &str, dest: &Path)
        -> Result<(), FetchError>;
}

/// Plain HTTP(S) fetcher
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Download the full body of `url`
    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// True for a full 40-character hex object id, which needs no remote lookup
pub fn is_full_revision(revision: &str) -> bool {
    revision.len() == 40 && revision.chars().all(|c| c.is_ascii_hexdigit())
}
