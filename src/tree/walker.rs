//! Filesystem walker for hashing and copying artifact trees
//!
//! Symbolic links are reported as links, never followed. A link must be
//! relative and resolve inside the walked tree; anything else makes the walk
//! fail, because the copy would either dangle or reach outside the artifact.

use crate::error::StorageError;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Filesystem entry types
#[derive(Debug, Clone)]
pub enum Entry {
    File { path: PathBuf },
    Directory { path: PathBuf },
    /// A symbolic link and its (relative) target, as stored in the link
    Symlink { path: PathBuf, target: PathBuf },
}

impl Entry {
    pub fn path(&self) -> &PathBuf {
        match self {
            Entry::File { path } | Entry::Directory { path } | Entry::Symlink { path, .. } => path,
        }
    }
}

/// Filesystem walker configuration
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Whether to follow symbolic links (default: false for determinism)
    pub follow_symlinks: bool,
    /// Directory or file names skipped entirely
    pub ignore_names: Vec<String>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            // VCS metadata is never part of an artifact
            ignore_names: vec![".git".to_string()],
        }
    }
}

/// Filesystem walker
pub struct Walker {
    root: PathBuf,
    config: WalkerConfig,
}

impl Walker {
    /// Create a new walker for the given root path
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            config: WalkerConfig::default(),
        }
    }

    /// Walk the tree below the root (the root itself is not returned)
    ///
    /// Returns entries sorted by path for determinism.
    pub fn walk(&self) -> Result<Vec<Entry>, StorageError> {
        let mut entries = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.should_ignore(entry));

        for entry in walker {
            let entry = entry.map_err(|e| {
                StorageError::io(&self.root, format!("Failed to walk directory: {}", e))
            })?;

            if entry.depth() == 0 {
                continue;
            }

            let path = entry.path().to_path_buf();
            let file_type = entry.file_type();

            if file_type.is_symlink() {
                let target = std::fs::read_link(&path).map_err(|e| {
                    StorageError::io(&path, format!("Failed to read link: {}", e))
                })?;
                if !link_stays_inside(&self.root, &path, &target) {
                    warn!(link = %path.display(), target = %target.display(), "Rejecting symlink");
                    return Err(StorageError::UnsupportedLink { path, target });
                }
                debug!(link = %path.display(), target = %target.display(), "Keeping symlink");
                entries.push(Entry::Symlink { path, target });
            } else if file_type.is_dir() {
                entries.push(Entry::Directory { path });
            } else if file_type.is_file() {
                entries.push(Entry::File { path });
            }
            // Sockets, fifos and devices are never part of an artifact
        }

        entries.sort_by(|a, b| a.path().cmp(b.path()));

        Ok(entries)
    }

    fn should_ignore(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && self
                .config
                .ignore_names
                .iter()
                .any(|name| entry.file_name().to_string_lossy() == name.as_str())
    }
}

/// True when `target`, read from the link at `link`, is relative and never
/// climbs above `root`
fn link_stays_inside(root: &Path, link: &Path, target: &Path) -> bool {
    let Some(parent) = link.parent().and_then(|p| p.strip_prefix(root).ok()) else {
        return false;
    };
    let mut depth = parent.components().count();
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}
