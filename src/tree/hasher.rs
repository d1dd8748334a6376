//! Hash computation for manifests, locations and cached content
//!
//! Two hash families are in play. Cache identities for downloaded and copied
//! content are SHA-256 (hex), so they match digests published elsewhere.
//! Internal fingerprints (manifest hash, location digest) use BLAKE3.

use crate::error::StorageError;
use crate::tree::walker::{Entry, Walker};
use crate::types::Hash;
use blake3::Hasher;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Compute the fingerprint of a merged manifest
///
/// fingerprint = hash("manifest" || len || canonical_json)
///
/// `serde_json` maps are ordered, so equal manifests always serialize to the
/// same bytes regardless of the key order in the source document.
pub fn compute_manifest_hash(manifest: &serde_json::Value) -> Hash {
    let canonical = manifest.to_string();
    let bytes = canonical.as_bytes();

    let mut hasher = Hasher::new();

    // Hash type discriminator
    hasher.update(b"manifest");

    // Hash length (8 bytes, big-endian for determinism)
    hasher.update(&(bytes.len() as u64).to_be_bytes());

    hasher.update(bytes);

    *hasher.finalize().as_bytes()
}

/// Short stable digest of a repository location, used as a cache directory name
pub fn location_digest(location: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(b"location:");
    hasher.update(location.as_bytes());
    hex::encode(&hasher.finalize().as_bytes()[..8])
}

/// SHA-256 of a byte string, hex encoded
pub fn compute_content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// SHA-256 over a file or a directory tree, hex encoded
///
/// For a directory, every regular file is fed in sorted relative-path order as
/// `'f' || len(path) || path || len(bytes) || bytes`, and every symlink as
/// `'l' || len(path) || path || len(target) || target`, so the digest only
/// depends on names, contents and links, never on where the directory lives.
pub fn compute_path_hash(path: &Path) -> Result<String, StorageError> {
    if path.is_file() {
        let bytes = std::fs::read(path).map_err(|e| StorageError::io(path, e))?;
        return Ok(compute_content_hash(&bytes));
    }

    let mut hasher = Sha256::new();
    hasher.update(b"tree");
    for entry in Walker::new(path.to_path_buf()).walk()? {
        let (tag, bytes) = match &entry {
            Entry::Directory { .. } => continue,
            Entry::File { path: file } => {
                (b'f', std::fs::read(file).map_err(|e| StorageError::io(file, e))?)
            }
            Entry::Symlink { target, .. } => (
                b'l',
                target.to_string_lossy().replace('\\', "/").into_bytes(),
            ),
        };
        let relative = entry
            .path()
            .strip_prefix(path)
            .map_err(|e| StorageError::io(entry.path(), e))?
            .to_string_lossy()
            .replace('\\', "/");

        hasher.update([tag]);
        hasher.update((relative.len() as u64).to_be_bytes());
        hasher.update(relative.as_bytes());
        hasher.update((bytes.len() as u64).to_be_bytes());
        hasher.update(&bytes);
    }
    Ok(hex::encode(hasher.finalize()))
}
