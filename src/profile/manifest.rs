//! Profile manifests
//!
//! A profile is a Markdown document whose leading block, fenced by `---`
//! lines, is YAML:
//!
//! ```text
//! ---
//! profile:
//!   name: base
//!   version: 1.0.0
//!   schema_version: 1
//!   extends: foundation/minimal
//! session:
//!   orchestrator: { module: loop-basic, source: "git+https://…@v1" }
//!   context: { module: context-simple, source: "git+https://…@v1" }
//! providers:
//!   - module: provider-anthropic
//!     source: "git+https://…@v1"
//!     config: { model: sonnet }
//! agents:
//!   zen: ./agents/zen.md
//! ---
//! Free text, ignored here.
//! ```

use crate::error::{CompilationError, MalformedReferenceError};
use crate::reference::Reference;
use crate::types::ProfileId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

const FENCE: &str = "---";

/// A parsed (or merged) profile manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileManifest {
    #[serde(default)]
    pub profile: ProfileMeta,

    #[serde(default)]
    pub session: Session,

    #[serde(default)]
    pub providers: Vec<ModuleEntry>,

    #[serde(default)]
    pub tools: Vec<ModuleEntry>,

    #[serde(default)]
    pub hooks: Vec<ModuleEntry>,

    /// Agent name → reference to a single text file
    #[serde(default)]
    pub agents: BTreeMap<String, String>,

    /// Context directory name → reference
    #[serde(default)]
    pub context: BTreeMap<String, String>,

    #[serde(default)]
    pub ui: Map<String, Value>,
}

/// The `profile:` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,

    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// `collection/profile`, or a bare profile name in the same collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
}

/// The `session:` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator: Option<ModuleEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ModuleEntry>,
}

/// One module declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub module: String,

    /// May be omitted when an ancestor profile supplies it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default)]
    pub config: Map<String, Value>,
}

impl ModuleEntry {
    pub fn new(module: &str, source: &str) -> Self {
        Self {
            module: module.to_string(),
            source: Some(source.to_string()),
            config: Map::new(),
        }
    }
}

/// Accept `1`, `1.0` or `"1.0.0"` for version-like fields
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Str(s) => s,
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Bool(b) => b.to_string(),
    }))
}

/// Split a document into its YAML frontmatter and body
pub fn split_frontmatter(document: &str) -> Option<(&str, &str)> {
    let document = document.strip_prefix('\u{feff}').unwrap_or(document);
    let mut lines = document.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != FENCE {
        return None;
    }

    let start = first.len();
    let mut offset = start;
    for line in lines {
        if line.trim_end() == FENCE {
            let yaml = &document[start..offset];
            let body = &document[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

impl ProfileManifest {
    /// Parse a profile document. The body after the frontmatter is discarded.
    pub fn parse(profile_id: &ProfileId, document: &str) -> Result<Self, CompilationError> {
        let manifest_error = |message: String| CompilationError::Manifest {
            profile: profile_id.to_string(),
            message,
        };

        let (yaml, _body) = split_frontmatter(document)
            .ok_or_else(|| manifest_error("missing '---' frontmatter block".to_string()))?;

        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| manifest_error(e.to_string()))
    }

    /// Read and parse the manifest at `path`, anchoring relative local
    /// references at the manifest's directory.
    pub fn load(profile_id: &ProfileId, path: &Path) -> Result<Self, CompilationError> {
        let document =
            std::fs::read_to_string(path).map_err(|_| CompilationError::ProfileNotFound {
                profile: profile_id.to_string(),
                path: path.to_path_buf(),
            })?;
        let mut manifest = Self::parse(profile_id, &document)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        manifest.anchor_references(base)?;
        Ok(manifest)
    }

    /// Rewrite every reference in canonical form, with relative local paths
    /// resolved against `base`. Malformed references fail here, before any fetch.
    pub fn anchor_references(&mut self, base: &Path) -> Result<(), MalformedReferenceError> {
        let anchor = |source: &mut String| -> Result<(), MalformedReferenceError> {
            *source = Reference::parse(source)?.anchored_at(base).to_string();
            Ok(())
        };

        for entry in self.module_entries_mut() {
            if let Some(source) = entry.source.as_mut() {
                anchor(source)?;
            }
        }
        for source in self.agents.values_mut().chain(self.context.values_mut()) {
            anchor(source)?;
        }
        Ok(())
    }

    fn module_entries_mut(&mut self) -> impl Iterator<Item = &mut ModuleEntry> {
        self.session
            .orchestrator
            .iter_mut()
            .chain(self.session.context.iter_mut())
            .chain(self.providers.iter_mut())
            .chain(self.tools.iter_mut())
            .chain(self.hooks.iter_mut())
    }

    /// The manifest as JSON; the input of the manifest hash
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
