//! Artifact cache
//!
//! Revision- and content-addressed store for everything a profile references.
//!
//! ```text
//! <root>/
//!   vcs/<location-digest>/<revision>/   checkouts
//!   content/<sha256>/                   downloads and local copies
//!   .staging/                           private, per-fetch scratch space
//! ```
//!
//! Entries are staged privately and published with one `rename`; once a key
//! exists its content never changes, so reads need no locking.

pub mod fetch;
mod flight;
pub mod git;
pub mod http;
pub mod key;

pub use fetch::{HttpFetcher, VcsFetcher};
pub use git::GitCli;
pub use http::ReqwestHttp;
pub use key::{CacheKey, Namespace};

use crate::concurrency::registry_key;
use crate::error::{FetchError, StorageError};
use crate::reference::Reference;
use crate::tree::hasher::{compute_content_hash, compute_path_hash, location_digest};
use crate::tree::path::canonicalize_path;
use crate::tree::publish::{copy_into, publish_immutable, PublishOutcome};
use crate::types::is_path_segment;
use flight::SingleFlight;
use key::PendingKey;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

const STAGING_DIR: &str = ".staging";
const DEFAULT_FILE_NAME: &str = "artifact";

/// A published cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    /// The artifact itself: a checkout (or a subdirectory of one), a downloaded
    /// file, or a copied file or directory
    pub local_path: PathBuf,
}

type FlightTable = SingleFlight<PendingKey, CacheEntry>;

static FLIGHTS: OnceLock<parking_lot::Mutex<HashMap<PathBuf, Arc<FlightTable>>>> = OnceLock::new();

/// The in-flight table for every cache rooted at `root` in this process
fn shared_flights(root: &Path) -> Arc<FlightTable> {
    let tables = FLIGHTS.get_or_init(|| parking_lot::Mutex::new(HashMap::new()));
    tables
        .lock()
        .entry(registry_key(root))
        .or_insert_with(|| Arc::new(SingleFlight::new()))
        .clone()
}

/// Shared handle to the cache. Every handle on the same root, cloned or not,
/// shares one in-flight table.
#[derive(Clone)]
pub struct ArtifactCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    root: PathBuf,
    vcs: Arc<dyn VcsFetcher>,
    http: Arc<dyn HttpFetcher>,
    flights: Arc<FlightTable>,
}

impl ArtifactCache {
    /// Create a cache rooted at `root` (typically `<data root>/cache`)
    pub fn new(
        root: impl Into<PathBuf>,
        vcs: Arc<dyn VcsFetcher>,
        http: Arc<dyn HttpFetcher>,
    ) -> Self {
        let root = root.into();
        Self {
            inner: Arc::new(CacheInner {
                flights: shared_flights(&root),
                root,
                vcs,
                http,
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Return the cache entry for `reference`, fetching and publishing it first
    /// if necessary.
    ///
    /// Concurrent calls that need the same fetch share a single transfer. The
    /// transfer runs on its own task: a caller that stops waiting (a timeout,
    /// a dropped compile) leaves it running for the others.
    pub async fn get_or_fetch(&self, reference: &Reference) -> Result<CacheEntry, FetchError> {
        match reference {
            Reference::Vcs {
                location,
                revision,
                subpath,
            } => {
                self.get_or_fetch_vcs(reference, location, revision.as_deref(), subpath.as_deref())
                    .await
            }
            Reference::Http { url } => self.get_or_fetch_http(url).await,
            Reference::Local { path } => self.get_or_fetch_local(reference, path).await,
        }
    }

    /// [`get_or_fetch`](Self::get_or_fetch) bounded by `timeout`
    pub async fn get_or_fetch_within(
        &self,
        reference: &Reference,
        timeout: Duration,
    ) -> Result<CacheEntry, FetchError> {
        tokio::time::timeout(timeout, self.get_or_fetch(reference))
            .await
            .unwrap_or_else(|_| {
                Err(FetchError::Timeout {
                    reference: reference.to_string(),
                    seconds: timeout.as_secs(),
                })
            })
    }

    async fn get_or_fetch_vcs(
        &self,
        reference: &Reference,
        location: &str,
        revision: Option<&str>,
        subpath: Option<&Path>,
    ) -> Result<CacheEntry, FetchError> {
        let label = reference.to_string();
        let resolved = self.inner.vcs.resolve_revision(location, revision).await?;
        if !is_path_segment(&resolved) {
            return Err(FetchError::io(
                &label,
                format!("fetcher returned an unusable revision id '{}'", resolved),
            ));
        }

        let dest = self
            .inner
            .root
            .join("vcs")
            .join(location_digest(location))
            .join(&resolved);

        let checkout = if dest.is_dir() {
            debug!(location, revision = %resolved, "VCS cache hit");
            CacheEntry {
                key: CacheKey::vcs(&resolved),
                local_path: dest,
            }
        } else {
            let pending = PendingKey::Vcs {
                location: location.to_string(),
                revision: resolved.clone(),
            };
            let cache = self.clone();
            let location = location.to_string();
            self.inner
                .flights
                .run(pending, &label, move || async move {
                    cache.publish_checkout(&location, &resolved, &dest).await
                })
                .await?
        };

        match subpath {
            None => Ok(checkout),
            Some(sub) => {
                let local_path = checkout.local_path.join(sub);
                if !local_path.exists() {
                    return Err(FetchError::NotFound {
                        reference: label,
                        message: format!("subdirectory '{}' not in checkout", sub.display()),
                    });
                }
                Ok(CacheEntry {
                    key: checkout.key,
                    local_path,
                })
            }
        }
    }

    async fn publish_checkout(
        &self,
        location: &str,
        revision: &str,
        dest: &Path,
    ) -> Result<CacheEntry, FetchError> {
        let key = CacheKey::vcs(revision);
        // A previous leader may have finished between our lookup and our turn
        if dest.is_dir() {
            return Ok(CacheEntry {
                key,
                local_path: dest.to_path_buf(),
            });
        }

        let staging = self.staging_dir(location)?;
        let staged = staging.path().join("tree");
        self.inner.vcs.checkout(location, revision, &staged).await?;

        let outcome = publish_immutable(&staged, dest).map_err(|e| FetchError::io(location, e))?;
        if outcome == PublishOutcome::Published {
            info!(location, revision, path = %dest.display(), "Published checkout");
        }
        Ok(CacheEntry {
            key,
            local_path: dest.to_path_buf(),
        })
    }

    async fn get_or_fetch_http(&self, url: &str) -> Result<CacheEntry, FetchError> {
        let pending = PendingKey::Http {
            url: url.to_string(),
        };
        let cache = self.clone();
        let owned_url = url.to_string();
        self.inner
            .flights
            .run(pending, url, move || async move {
                let bytes = cache.inner.http.download(&owned_url).await?;
                let identity = compute_content_hash(&bytes);
                let file_name = url_file_name(&owned_url);
                let root = cache.inner.root.clone();
                let label = owned_url.clone();

                tokio::task::spawn_blocking(move || {
                    publish_content_file(&root, &owned_url, &identity, &file_name, &bytes)
                })
                .await
                .map_err(|e| FetchError::io(&label, e))?
            })
            .await
    }

    async fn get_or_fetch_local(
        &self,
        reference: &Reference,
        path: &Path,
    ) -> Result<CacheEntry, FetchError> {
        let label = reference.to_string();
        let canonical = canonicalize_path(path).map_err(|e| match e {
            StorageError::NotFound(p) => FetchError::NotFound {
                reference: label.clone(),
                message: format!("no such file or directory: {}", p.display()),
            },
            other => FetchError::io(&label, other),
        })?;

        let pending = PendingKey::Local {
            path: canonical.clone(),
        };
        let root = self.inner.root.clone();
        self.inner
            .flights
            .run(pending, &label, || {
                let label = label.clone();
                async move {
                    let task_label = label.clone();
                    tokio::task::spawn_blocking(move || {
                        publish_local_copy(&root, &task_label, &canonical)
                    })
                    .await
                    .map_err(|e| FetchError::io(&label, e))?
                }
            })
            .await
    }

    fn staging_dir(&self, reference: &str) -> Result<TempDir, FetchError> {
        new_staging_dir(&self.inner.root, reference)
    }
}

fn new_staging_dir(root: &Path, reference: &str) -> Result<TempDir, FetchError> {
    let staging_root = root.join(STAGING_DIR);
    std::fs::create_dir_all(&staging_root).map_err(|e| FetchError::io(reference, e))?;
    tempfile::Builder::new()
        .prefix("fetch-")
        .tempdir_in(&staging_root)
        .map_err(|e| FetchError::io(reference, e))
}

fn content_dir(root: &Path, identity: &str) -> PathBuf {
    root.join("content").join(identity)
}

/// Publish downloaded bytes under `content/<sha256>/<file_name>`
fn publish_content_file(
    root: &Path,
    url: &str,
    identity: &str,
    file_name: &str,
    bytes: &[u8],
) -> Result<CacheEntry, FetchError> {
    let dest = content_dir(root, identity);
    if !dest.is_dir() {
        let staging = new_staging_dir(root, url)?;
        let staged = staging.path().join("tree");
        std::fs::create_dir_all(&staged).map_err(|e| FetchError::io(url, e))?;
        std::fs::write(staged.join(file_name), bytes).map_err(|e| FetchError::io(url, e))?;
        if publish_immutable(&staged, &dest).map_err(|e| FetchError::io(url, e))?
            == PublishOutcome::Published
        {
            info!(url, identity, "Published download");
        }
    } else {
        debug!(url, identity, "Content already cached");
    }

    Ok(CacheEntry {
        key: CacheKey::content(identity),
        local_path: content_file(&dest, file_name, url)?,
    })
}

/// Copy a local file or directory into `content/<sha256>/`
fn publish_local_copy(root: &Path, label: &str, source: &Path) -> Result<CacheEntry, FetchError> {
    let identity = compute_path_hash(source).map_err(|e| FetchError::io(label, e))?;
    let dest = content_dir(root, &identity);

    if !dest.is_dir() {
        let staging = new_staging_dir(root, label)?;
        let staged = staging.path().join("tree");
        copy_into(source, &staged).map_err(|e| FetchError::io(label, e))?;
        if publish_immutable(&staged, &dest).map_err(|e| FetchError::io(label, e))?
            == PublishOutcome::Published
        {
            info!(source = %source.display(), identity = %identity, "Published local copy");
        }
    } else {
        debug!(source = %source.display(), identity = %identity, "Content already cached");
    }

    let local_path = if source.is_file() {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
        content_file(&dest, &name, label)?
    } else {
        dest
    };

    Ok(CacheEntry {
        key: CacheKey::content(identity),
        local_path,
    })
}

/// Locate the single file of a content entry.
///
/// Identical bytes may have been published first under another name, in which
/// case the name already on disk wins.
fn content_file(dir: &Path, preferred: &str, reference: &str) -> Result<PathBuf, FetchError> {
    let preferred_path = dir.join(preferred);
    if preferred_path.is_file() {
        return Ok(preferred_path);
    }
    let mut files = std::fs::read_dir(dir)
        .map_err(|e| FetchError::io(reference, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect::<Vec<_>>();
    files.sort();
    files.into_iter().next().ok_or_else(|| {
        FetchError::io(reference, format!("content entry {} holds no file", dir.display()))
    })
}

/// File name for a download: the last non-empty URL path segment
fn url_file_name(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        })
        .filter(|name| {
            Path::new(name)
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        })
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}
