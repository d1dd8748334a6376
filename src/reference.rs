//! Reference parsing
//!
//! A reference names where a resource comes from. Three schemes are recognized:
//!
//! - `git+<url>[@<revision>][#subdirectory=<path>]` for version control
//! - `http://…` / `https://…` for plain downloads
//! - `file://<path>`, `/abs`, `./rel`, `../rel` for the local filesystem
//!
//! Parsing is pure; nothing here touches the network or the disk.

use crate::error::MalformedReferenceError;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

const VCS_PREFIX: &str = "git+";
const SUBDIRECTORY_KEY: &str = "subdirectory=";

/// A parsed resource reference. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Vcs {
        /// Repository location, without the `git+` prefix
        location: String,
        /// Branch, tag or exact revision id; `None` means the remote HEAD
        revision: Option<String>,
        /// Path inside the repository that is the actual artifact
        subpath: Option<PathBuf>,
    },
    Http {
        url: String,
    },
    Local {
        path: PathBuf,
    },
}

impl Reference {
    /// Parse a reference string.
    pub fn parse(input: &str) -> Result<Self, MalformedReferenceError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(MalformedReferenceError::new(input, "empty reference"));
        }

        if let Some(rest) = trimmed.strip_prefix(VCS_PREFIX) {
            return parse_vcs(input, rest);
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            if trimmed.contains('#') {
                return Err(MalformedReferenceError::new(
                    input,
                    "subpath fragments are only supported on git+ references",
                ));
            }
            let parsed = url::Url::parse(trimmed)
                .map_err(|e| MalformedReferenceError::new(input, format!("invalid url: {}", e)))?;
            if parsed.host_str().map_or(true, str::is_empty) {
                return Err(MalformedReferenceError::new(input, "url has no host"));
            }
            return Ok(Reference::Http {
                url: trimmed.to_string(),
            });
        }

        let local = trimmed.strip_prefix("file://").or_else(|| {
            let is_path = trimmed.starts_with('/')
                || trimmed.starts_with("./")
                || trimmed.starts_with("../");
            is_path.then_some(trimmed)
        });

        match local {
            Some(path) if path.contains('#') => Err(MalformedReferenceError::new(
                input,
                "subpath fragments are only supported on git+ references",
            )),
            Some("") => Err(MalformedReferenceError::new(input, "empty local path")),
            Some(path) => Ok(Reference::Local {
                path: PathBuf::from(local_form(path)),
            }),
            None => Err(MalformedReferenceError::new(
                input,
                "unrecognized scheme (expected git+<url>, http(s)://, file:// or a path)",
            )),
        }
    }

    /// Resolve a relative local path against `base`. Other references are
    /// returned unchanged.
    pub fn anchored_at(self, base: &Path) -> Self {
        match self {
            Reference::Local { path } if path.is_relative() => Reference::Local {
                path: base.join(path),
            },
            other => other,
        }
    }
}

impl FromStr for Reference {
    type Err = MalformedReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reference::parse(s)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Vcs {
                location,
                revision,
                subpath,
            } => {
                write!(f, "{}{}", VCS_PREFIX, location)?;
                if let Some(revision) = revision {
                    write!(f, "@{}", revision)?;
                }
                if let Some(subpath) = subpath {
                    write!(f, "#{}{}", SUBDIRECTORY_KEY, subpath.display())?;
                }
                Ok(())
            }
            Reference::Http { url } => f.write_str(url),
            Reference::Local { path } => f.write_str(&local_form(&path.display().to_string())),
        }
    }
}

/// Spell a local path the way the parser recognizes it without `file://`:
/// absolute, or relative with an explicit `./` or `../`
fn local_form(path: &str) -> String {
    if path.starts_with('/')
        || path.starts_with("./")
        || path.starts_with("../")
        || Path::new(path).is_absolute()
    {
        path.to_string()
    } else if path == "." || path == ".." {
        format!("{}/", path)
    } else {
        format!("./{}", path)
    }
}

fn parse_vcs(input: &str, rest: &str) -> Result<Reference, MalformedReferenceError> {
    let (body, fragment) = match rest.split_once('#') {
        Some((body, fragment)) => (body, Some(fragment)),
        None => (rest, None),
    };

    let scheme_end = body
        .find("://")
        .ok_or_else(|| MalformedReferenceError::new(input, "git+ reference needs a <scheme>://"))?;
    let after_scheme = scheme_end + 3;

    // The host part may carry `user@`; the revision separator is the first `@`
    // after the first `/` that follows the host.
    let path_start = body[after_scheme..]
        .find('/')
        .map(|i| after_scheme + i)
        .ok_or_else(|| MalformedReferenceError::new(input, "git+ reference has no path"))?;

    let (location, revision) = match body[path_start..].find('@') {
        Some(i) => {
            let at = path_start + i;
            let revision = &body[at + 1..];
            if revision.is_empty() {
                return Err(MalformedReferenceError::new(input, "empty revision after '@'"));
            }
            (&body[..at], Some(revision.to_string()))
        }
        None => (body, None),
    };

    let location = location.trim_end_matches('/');
    if location.len() <= after_scheme || location[path_start..].trim_matches('/').is_empty() {
        return Err(MalformedReferenceError::new(input, "git+ reference has no repository path"));
    }

    let subpath = match fragment {
        None => None,
        Some(fragment) => Some(parse_subdirectory(input, fragment)?),
    };

    Ok(Reference::Vcs {
        location: location.to_string(),
        revision,
        subpath,
    })
}

fn parse_subdirectory(input: &str, fragment: &str) -> Result<PathBuf, MalformedReferenceError> {
    let value = fragment.strip_prefix(SUBDIRECTORY_KEY).ok_or_else(|| {
        MalformedReferenceError::new(
            input,
            format!("unsupported fragment '{}' (expected subdirectory=<path>)", fragment),
        )
    })?;

    let subpath = PathBuf::from(value.trim_matches('/'));
    if subpath.as_os_str().is_empty() {
        return Err(MalformedReferenceError::new(input, "empty subdirectory"));
    }
    if value.starts_with('/')
        || subpath
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(MalformedReferenceError::new(
            input,
            "subdirectory must be a relative path without '.' or '..'",
        ));
    }
    Ok(subpath)
}
