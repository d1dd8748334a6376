//! `extends` inheritance
//!
//! Lists concatenate parent-first, maps deep-merge with the child winning at
//! every leaf, and session slots are replaced by the child. A child entry for a
//! module the parent already declares refines that entry instead of adding a
//! second copy.

use crate::error::CompilationError;
use crate::profile::manifest::{ModuleEntry, ProfileManifest, ProfileMeta, Session};
use crate::types::ProfileId;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Tracks the `extends` chain while walking from a profile up to its root
/// ancestor, failing on the first repeated profile.
#[derive(Debug, Default)]
pub struct Ancestry {
    seen: HashSet<ProfileId>,
    chain: Vec<ProfileId>,
}

impl Ancestry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visit(&mut self, profile_id: &ProfileId) -> Result<(), CompilationError> {
        self.chain.push(profile_id.clone());
        if !self.seen.insert(profile_id.clone()) {
            return Err(CompilationError::InheritanceCycle {
                chain: self.chain.iter().map(ToString::to_string).collect(),
            });
        }
        Ok(())
    }

    /// Profiles visited so far, child first
    pub fn chain(&self) -> &[ProfileId] {
        &self.chain
    }
}

/// Merge a chain given child first (as it is discovered) into one manifest
pub fn merge_chain(chain_child_first: Vec<ProfileManifest>) -> ProfileManifest {
    chain_child_first
        .into_iter()
        .rev()
        .reduce(merge)
        .unwrap_or_default()
}

/// Merge `child` over `parent`
pub fn merge(parent: ProfileManifest, child: ProfileManifest) -> ProfileManifest {
    let mut agents = parent.agents;
    agents.extend(child.agents);
    let mut context = parent.context;
    context.extend(child.context);
    let mut ui = parent.ui;
    deep_merge(&mut ui, child.ui);

    ProfileManifest {
        profile: merge_meta(parent.profile, child.profile),
        session: Session {
            orchestrator: merge_slot(parent.session.orchestrator, child.session.orchestrator),
            context: merge_slot(parent.session.context, child.session.context),
        },
        providers: merge_list(parent.providers, child.providers),
        tools: merge_list(parent.tools, child.tools),
        hooks: merge_list(parent.hooks, child.hooks),
        agents,
        context,
        ui,
    }
}

fn merge_meta(parent: ProfileMeta, child: ProfileMeta) -> ProfileMeta {
    ProfileMeta {
        name: child.name.or(parent.name),
        version: child.version.or(parent.version),
        schema_version: child.schema_version.or(parent.schema_version),
        description: child.description.or(parent.description),
        // Consumed by the merge
        extends: None,
    }
}

fn merge_slot(parent: Option<ModuleEntry>, child: Option<ModuleEntry>) -> Option<ModuleEntry> {
    match (parent, child) {
        (Some(p), Some(c)) if p.module == c.module => Some(merge_entry(p, c)),
        (parent, child) => child.or(parent),
    }
}

fn merge_list(parent: Vec<ModuleEntry>, child: Vec<ModuleEntry>) -> Vec<ModuleEntry> {
    let mut merged = parent;
    for entry in child {
        match merged.iter().position(|p| p.module == entry.module) {
            Some(index) => {
                let existing = merged.remove(index);
                merged.insert(index, merge_entry(existing, entry));
            }
            None => merged.push(entry),
        }
    }
    merged
}

fn merge_entry(parent: ModuleEntry, child: ModuleEntry) -> ModuleEntry {
    let mut config = parent.config;
    deep_merge(&mut config, child.config);
    ModuleEntry {
        module: child.module,
        source: child.source.or(parent.source),
        config,
    }
}

/// Recursively merge `overlay` into `base`. Objects merge key by key; any
/// other value in `overlay` replaces the one in `base`.
pub fn deep_merge(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
