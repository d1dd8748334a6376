//! Shared test utilities for integration tests
//!
//! Fake fetchers with call counters, a workspace builder that lays out local
//! collections in a temporary directory, and XDG environment isolation.

use async_trait::async_trait;
use mountplan::cache::{HttpFetcher, VcsFetcher};
use mountplan::config::{CollectionConfig, MountplanConfig};
use mountplan::error::FetchError;
use mountplan::types::ProfileId;
use mountplan::Workspace;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Global mutex to serialize XDG environment variable access across all tests
static XDG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Run `f` with HOME, XDG_CONFIG_HOME and XDG_DATA_HOME pointing into `test_dir`,
/// restoring the previous values afterwards
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = XDG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let saved: Vec<(&str, Option<String>)> = ["HOME", "XDG_CONFIG_HOME", "XDG_DATA_HOME"]
        .into_iter()
        .map(|key| (key, std::env::var(key).ok()))
        .collect();

    let home = test_dir.path().join("home");
    let data = test_dir.path().join("data");
    std::fs::create_dir_all(&home).unwrap();
    std::fs::create_dir_all(&data).unwrap();
    std::env::set_var("HOME", &home);
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path());
    std::env::set_var("XDG_DATA_HOME", &data);

    let result = f();

    for (key, value) in saved {
        match value {
            Some(v) => std::env::set_var(key, v),
            None => std::env::remove_var(key),
        }
    }
    result
}

/// In-memory git: symbolic names map to revisions, revisions to file sets
#[derive(Default)]
pub struct FakeVcs {
    refs: Mutex<HashMap<(String, String), String>>,
    trees: Mutex<HashMap<(String, String), Vec<(String, String)>>>,
    resolves: AtomicUsize,
    checkouts: AtomicUsize,
    failing: AtomicBool,
}

impl FakeVcs {
    /// Make `location@symbolic` resolve to `revision` with the given files
    pub fn publish(&self, location: &str, symbolic: &str, revision: &str, files: &[(&str, &str)]) {
        self.refs.lock().insert(
            (location.to_string(), symbolic.to_string()),
            revision.to_string(),
        );
        self.trees.lock().insert(
            (location.to_string(), revision.to_string()),
            files
                .iter()
                .map(|(path, content)| (path.to_string(), content.to_string()))
                .collect(),
        );
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn resolves(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }

    pub fn checkouts(&self) -> usize {
        self.checkouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VcsFetcher for FakeVcs {
    async fn resolve_revision(
        &self,
        location: &str,
        revision: Option<&str>,
    ) -> Result<String, FetchError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Network {
                reference: location.to_string(),
                message: "connection refused".to_string(),
            });
        }
        let wanted = revision.unwrap_or("HEAD").to_string();
        if let Some(resolved) = self.refs.lock().get(&(location.to_string(), wanted.clone())) {
            return Ok(resolved.clone());
        }
        if self
            .trees
            .lock()
            .contains_key(&(location.to_string(), wanted.clone()))
        {
            return Ok(wanted);
        }
        Err(FetchError::NotFound {
            reference: location.to_string(),
            message: format!("unknown revision '{}'", wanted),
        })
    }

    async fn checkout(&self, location: &str, revision: &str, dest: &Path) -> Result<(), FetchError> {
        self.checkouts.fetch_add(1, Ordering::SeqCst);
        // Long enough for concurrent callers to pile up behind the first one
        tokio::time::sleep(Duration::from_millis(30)).await;
        let files = self
            .trees
            .lock()
            .get(&(location.to_string(), revision.to_string()))
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                reference: location.to_string(),
                message: revision.to_string(),
            })?;
        for (path, content) in files {
            let path = dest.join(path);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        std::fs::create_dir_all(dest).unwrap();
        Ok(())
    }
}

/// In-memory HTTP server
#[derive(Default)]
pub struct FakeHttp {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    downloads: AtomicUsize,
}

impl FakeHttp {
    pub fn serve(&self, url: &str, body: &str) {
        self.bodies
            .lock()
            .insert(url.to_string(), body.as_bytes().to_vec());
    }

    pub fn remove(&self, url: &str) {
        self.bodies.lock().remove(url);
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpFetcher for FakeHttp {
    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.bodies
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                reference: url.to_string(),
                message: "404 Not Found".to_string(),
            })
    }
}

/// A temporary workspace with local collections and fake fetchers
pub struct TestEnv {
    pub dir: TempDir,
    pub vcs: Arc<FakeVcs>,
    pub http: Arc<FakeHttp>,
    collections: Vec<String>,
}

pub const LOOP_GIT: &str = "https://git.example.com/acme/loop-basic";
pub const CONTEXT_GIT: &str = "https://git.example.com/acme/context-simple";
pub const ZEN_URL: &str = "https://cdn.example.com/agents/zen.md";

impl TestEnv {
    /// Environment with a `foundation` collection and the standard remote
    /// modules (`loop-basic` and `context-simple` over git, `zen` over HTTP)
    pub fn new() -> Self {
        let env = Self {
            dir: TempDir::new().unwrap(),
            vcs: Arc::new(FakeVcs::default()),
            http: Arc::new(FakeHttp::default()),
            collections: Vec::new(),
        };
        env.vcs.publish(
            LOOP_GIT,
            "v1",
            "1111111111111111111111111111111111111111",
            &[("loop.py", "def run(): pass\n"), ("README.md", "loop")],
        );
        env.vcs.publish(
            CONTEXT_GIT,
            "v1",
            "2222222222222222222222222222222222222222",
            &[("context/simple.py", "class Context: ...\n")],
        );
        env.http.serve(ZEN_URL, "You are calm and concise.\n");
        env.with_collection("foundation")
    }

    /// Register another local collection under `collections/<name>`
    pub fn with_collection(mut self, name: &str) -> Self {
        std::fs::create_dir_all(self.collection_dir(name).join("profiles")).unwrap();
        self.collections.push(name.to_string());
        self
    }

    pub fn collection_dir(&self, name: &str) -> PathBuf {
        self.dir.path().join("collections").join(name)
    }

    pub fn data_root(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    /// Write `collections/<collection>/<relative>`
    pub fn write_file(&self, collection: &str, relative: &str, content: &str) {
        let path = self.collection_dir(collection).join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Write a profile document with `frontmatter` as its YAML block
    pub fn write_profile(&self, collection: &str, profile: &str, frontmatter: &str) {
        self.write_file(
            collection,
            &format!("profiles/{}.md", profile),
            &format!("---\n{}---\n# {}\n", frontmatter, profile),
        );
    }

    /// Local provider module `modules/<name>/` inside a collection
    pub fn write_module(&self, collection: &str, name: &str) {
        self.write_file(
            collection,
            &format!("modules/{}/__init__.py", name),
            &format!("NAME = \"{}\"\n", name),
        );
    }

    pub fn config(&self) -> MountplanConfig {
        MountplanConfig {
            root: Some(self.data_root()),
            collections: self
                .collections
                .iter()
                .map(|name| CollectionConfig {
                    name: name.clone(),
                    source: format!("./collections/{}", name),
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::with_fetchers(
            self.config(),
            self.dir.path(),
            self.vcs.clone(),
            self.http.clone(),
        )
        .unwrap()
    }

    /// Write the standard `foundation/base` profile and its local modules
    pub fn write_base_profile(&self) {
        self.write_module("foundation", "provider-mock");
        self.write_file("foundation", "docs/guide.md", "# Guide\n");
        self.write_profile("foundation", "base", &base_frontmatter("sonnet"));
    }
}

/// Frontmatter of the standard base profile, parameterized on a config value
pub fn base_frontmatter(model: &str) -> String {
    format!(
        r#"profile:
  name: base
  version: 1.0.0
  schema_version: 1
session:
  orchestrator:
    module: loop-basic
    source: git+{loop_git}@v1
    config:
      max_turns: 10
  context:
    module: context-simple
    source: git+{context_git}@v1#subdirectory=context
providers:
  - module: provider-mock
    source: ../modules/provider-mock
    config:
      model: {model}
agents:
  zen: {zen}
context:
  docs: ../docs
"#,
        loop_git = LOOP_GIT,
        context_git = CONTEXT_GIT,
        zen = ZEN_URL,
        model = model,
    )
}

pub fn profile_id(value: &str) -> ProfileId {
    value.parse().unwrap()
}
