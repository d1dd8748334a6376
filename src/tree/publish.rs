//! Stage-then-rename publication
//!
//! Everything this crate writes for readers (cache entries, compiled trees,
//! lock files) is first written somewhere private and then moved into place
//! with a single `rename`, so readers see either the old state or the new one.

use crate::error::StorageError;
use crate::tree::walker::{Entry, Walker};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Result of publishing an immutable entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The staged directory now lives at the destination
    Published,
    /// Someone else published the same destination first; the staged copy was discarded
    AlreadyPresent,
}

/// Publish a staged directory under a content-addressed destination
///
/// Destinations are immutable: if one already exists, its content is by
/// construction identical, so the staged copy is left for the caller to drop.
pub fn publish_immutable(staged: &Path, dest: &Path) -> Result<PublishOutcome, StorageError> {
    if dest.exists() {
        return Ok(PublishOutcome::AlreadyPresent);
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    match fs::rename(staged, dest) {
        Ok(()) => Ok(PublishOutcome::Published),
        // Lost a race with another process publishing the same identity
        Err(_) if dest.exists() => Ok(PublishOutcome::AlreadyPresent),
        Err(e) => Err(StorageError::io(
            dest,
            format!("Failed to move {:?} into place: {}", staged, e),
        )),
    }
}

/// Replace a mutable directory (a compiled profile) with a staged one
///
/// The previous tree is moved aside first and only deleted once the staged tree
/// is in place; if the final rename fails the previous tree is put back.
pub fn replace_dir(staged: &Path, dest: &Path) -> Result<(), StorageError> {
    let parent = dest
        .parent()
        .ok_or_else(|| StorageError::io(dest, "destination has no parent directory"))?;
    fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;

    if !dest.exists() {
        return fs::rename(staged, dest).map_err(|e| StorageError::io(dest, e));
    }

    let graveyard = tempfile::Builder::new()
        .prefix(".retired-")
        .tempdir_in(parent)
        .map_err(|e| StorageError::io(parent, e))?;
    let retired = graveyard.path().join("tree");
    fs::rename(dest, &retired).map_err(|e| StorageError::io(dest, e))?;

    if let Err(e) = fs::rename(staged, dest) {
        let _ = fs::rename(&retired, dest);
        return Err(StorageError::io(dest, e));
    }

    debug!(dest = %dest.display(), "Replaced directory");
    // graveyard (and the retired tree) is removed on drop
    Ok(())
}

/// Write a file atomically (write to .tmp, then rename)
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }
    let mut temp_name = path.as_os_str().to_os_string();
    temp_name.push(".tmp");
    let temp_path = std::path::PathBuf::from(temp_name);

    fs::write(&temp_path, bytes).map_err(|e| StorageError::io(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        StorageError::io(path, e)
    })
}

/// Copy an artifact into `dest_dir`
///
/// A directory contributes its contents; a file is copied under its own name.
/// VCS metadata directories are skipped and symlinks are recreated as links.
pub fn copy_into(src: &Path, dest_dir: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(dest_dir).map_err(|e| StorageError::io(dest_dir, e))?;

    if src.is_file() {
        let name = src
            .file_name()
            .ok_or_else(|| StorageError::io(src, "file has no name"))?;
        fs::copy(src, dest_dir.join(name)).map_err(|e| StorageError::io(src, e))?;
        return Ok(());
    }

    for entry in Walker::new(src.to_path_buf()).walk()? {
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| StorageError::io(entry.path(), e))?;
        let target = dest_dir.join(relative);
        match entry {
            Entry::Directory { .. } => {
                fs::create_dir_all(&target).map_err(|e| StorageError::io(&target, e))?;
            }
            Entry::File { path } => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
                }
                fs::copy(&path, &target).map_err(|e| StorageError::io(&path, e))?;
            }
            Entry::Symlink { path, target: link } => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
                }
                copy_link(&path, &link, &target)?;
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_link(_src: &Path, link: &Path, dest: &Path) -> Result<(), StorageError> {
    std::os::unix::fs::symlink(link, dest).map_err(|e| StorageError::io(dest, e))
}

#[cfg(not(unix))]
fn copy_link(src: &Path, link: &Path, _dest: &Path) -> Result<(), StorageError> {
    Err(StorageError::UnsupportedLink {
        path: src.to_path_buf(),
        target: link.to_path_buf(),
    })
}
