//! Profile compilation: layout, idempotence, change detection and failure isolation

use crate::integration::test_utils::{
    base_frontmatter, profile_id, TestEnv, CONTEXT_GIT, LOOP_GIT, ZEN_URL,
};
use mountplan::error::{ApiError, CompilationError, FetchError};
use mountplan::profile::{compiled_profile_dir, lock_file_path, CompilationLock};
use mountplan::ProfileStatus;
use std::fs;

#[tokio::test]
async fn test_compile_writes_typed_tree_and_lock() {
    let env = TestEnv::new();
    env.write_base_profile();
    let workspace = env.workspace();
    let id = profile_id("foundation/base");

    let compiled = workspace.compile(&id, false).await.unwrap();
    assert!(compiled.recompiled);

    let dir = compiled_profile_dir(&env.data_root(), &id);
    assert_eq!(compiled.path, dir);
    assert!(dir.join("orchestrator/loop-basic/loop.py").is_file());
    assert!(!dir.join("orchestrator/loop-basic/.git").exists());
    assert!(dir.join("context/context-simple/simple.py").is_file());
    assert!(dir.join("providers/provider-mock/__init__.py").is_file());
    assert_eq!(
        fs::read_to_string(dir.join("agents/zen.md")).unwrap(),
        "You are calm and concise.\n"
    );
    assert!(dir.join("contexts/docs/guide.md").is_file());
    assert!(dir.join("manifest.json").is_file());

    let lock = CompilationLock::read(&lock_file_path(&env.data_root(), &id)).unwrap();
    assert_eq!(lock.profile_hash, compiled.manifest_hash);
    let keys: Vec<&str> = lock.resources.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            "agents/zen",
            "context/context-simple",
            "contexts/docs",
            "orchestrator/loop-basic",
            "providers/provider-mock",
        ]
    );
    assert_eq!(
        lock.resources["orchestrator/loop-basic"].identity,
        "vcs:1111111111111111111111111111111111111111"
    );
    assert!(lock.resources["agents/zen"].identity.starts_with("content:"));
    assert_eq!(lock.resources["agents/zen"].source, ZEN_URL);
}

#[tokio::test]
async fn test_recompile_without_changes_does_no_work() {
    let env = TestEnv::new();
    env.write_base_profile();
    let workspace = env.workspace();
    let id = profile_id("foundation/base");

    let first = workspace.compile(&id, false).await.unwrap();
    let marker = first.path.join("MARKER");
    fs::write(&marker, "untouched").unwrap();
    let (resolves, checkouts, downloads) =
        (env.vcs.resolves(), env.vcs.checkouts(), env.http.downloads());

    let second = workspace.compile(&id, false).await.unwrap();
    assert!(!second.recompiled);
    assert_eq!(second.manifest_hash, first.manifest_hash);
    assert!(marker.is_file(), "tree must not be rewritten");
    assert_eq!(env.vcs.resolves(), resolves);
    assert_eq!(env.vcs.checkouts(), checkouts);
    assert_eq!(env.http.downloads(), downloads);
}

#[tokio::test]
async fn test_force_recompiles_from_cache() {
    let env = TestEnv::new();
    env.write_base_profile();
    let workspace = env.workspace();
    let id = profile_id("foundation/base");

    let first = workspace.compile(&id, false).await.unwrap();
    fs::write(first.path.join("MARKER"), "x").unwrap();
    let checkouts = env.vcs.checkouts();

    let forced = workspace.compile(&id, true).await.unwrap();
    assert!(forced.recompiled);
    assert_eq!(forced.manifest_hash, first.manifest_hash);
    assert!(!forced.path.join("MARKER").exists());
    // Revisions are already cached
    assert_eq!(env.vcs.checkouts(), checkouts);
}

#[tokio::test]
async fn test_config_change_triggers_recompile() {
    let env = TestEnv::new();
    env.write_base_profile();
    let workspace = env.workspace();
    let id = profile_id("foundation/base");

    assert_eq!(workspace.status(&id).await.unwrap(), ProfileStatus::NotCompiled);
    let first = workspace.compile(&id, false).await.unwrap();
    assert_eq!(workspace.status(&id).await.unwrap(), ProfileStatus::UpToDate);

    env.write_profile("foundation", "base", &base_frontmatter("opus"));
    assert_eq!(workspace.status(&id).await.unwrap(), ProfileStatus::Stale);

    let second = workspace.compile(&id, false).await.unwrap();
    assert!(second.recompiled);
    assert_ne!(second.manifest_hash, first.manifest_hash);
    let manifest = fs::read_to_string(second.path.join("manifest.json")).unwrap();
    assert!(manifest.contains("\"opus\""));
    assert_eq!(workspace.status(&id).await.unwrap(), ProfileStatus::UpToDate);
}

#[tokio::test]
async fn test_missing_tree_is_recompiled() {
    let env = TestEnv::new();
    env.write_base_profile();
    let workspace = env.workspace();
    let id = profile_id("foundation/base");

    let first = workspace.compile(&id, false).await.unwrap();
    fs::remove_dir_all(&first.path).unwrap();
    assert_eq!(workspace.status(&id).await.unwrap(), ProfileStatus::NotCompiled);

    let second = workspace.compile(&id, false).await.unwrap();
    assert!(second.recompiled);
    assert!(second.path.join("manifest.json").is_file());
}

#[tokio::test]
async fn test_corrupt_lock_is_treated_as_absent() {
    let env = TestEnv::new();
    env.write_base_profile();
    let workspace = env.workspace();
    let id = profile_id("foundation/base");

    workspace.compile(&id, false).await.unwrap();
    let lock_path = lock_file_path(&env.data_root(), &id);
    fs::write(&lock_path, "{ truncated").unwrap();

    let again = workspace.compile(&id, false).await.unwrap();
    assert!(again.recompiled);
    assert!(CompilationLock::read(&lock_path).is_some());
}

#[tokio::test]
async fn test_failed_fetch_keeps_previous_tree_and_lock() {
    let env = TestEnv::new();
    env.write_base_profile();
    let workspace = env.workspace();
    let id = profile_id("foundation/base");

    let first = workspace.compile(&id, false).await.unwrap();
    let lock_path = lock_file_path(&env.data_root(), &id);
    let lock_before = fs::read_to_string(&lock_path).unwrap();
    let manifest_before = fs::read_to_string(first.path.join("manifest.json")).unwrap();

    // The changed profile needs a download that fails
    env.http.remove(ZEN_URL);
    env.write_profile("foundation", "base", &base_frontmatter("opus"));

    let err = workspace.compile(&id, false).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Compilation(CompilationError::Fetch(FetchError::NotFound { .. }))
    ));
    assert_eq!(fs::read_to_string(&lock_path).unwrap(), lock_before);
    assert_eq!(
        fs::read_to_string(first.path.join("manifest.json")).unwrap(),
        manifest_before
    );
    assert!(first.path.join("agents/zen.md").is_file());
    assert_eq!(workspace.status(&id).await.unwrap(), ProfileStatus::Stale);
}

#[tokio::test]
async fn test_unknown_mount_type_fails_before_any_fetch() {
    let env = TestEnv::new();
    env.write_profile(
        "foundation",
        "odd",
        r#"profile: { name: odd, version: 1, schema_version: 1 }
session:
  orchestrator: { module: loop-basic, source: "git+https://git.example.com/acme/loop-basic@v1" }
  context: { module: context-simple, source: "git+https://git.example.com/acme/context-simple@v1" }
providers:
  - { module: provider-mock, source: "git+https://git.example.com/acme/provider-mock@v1" }
tools:
  - { module: filesystem, source: "git+https://git.example.com/acme/filesystem@v1" }
"#,
    );
    let workspace = env.workspace();

    let err = workspace
        .compile(&profile_id("foundation/odd"), false)
        .await
        .unwrap_err();
    match err {
        ApiError::Compilation(CompilationError::UnknownMountType(e)) => {
            assert_eq!(e.module_id, "filesystem")
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(env.vcs.resolves(), 0);
    assert_eq!(env.http.downloads(), 0);
}

#[tokio::test]
async fn test_incomplete_profile_fails_validation() {
    let env = TestEnv::new();
    env.write_profile(
        "foundation",
        "empty",
        r#"profile: { name: empty, version: 1, schema_version: 1 }
session:
  orchestrator: { module: loop-basic, source: "git+https://git.example.com/acme/loop-basic@v1" }
  context: { module: context-simple, source: "git+https://git.example.com/acme/context-simple@v1" }
"#,
    );
    let workspace = env.workspace();

    let err = workspace
        .compile(&profile_id("foundation/empty"), false)
        .await
        .unwrap_err();
    match err {
        ApiError::Compilation(CompilationError::Validation(e)) => assert_eq!(e.field, "providers"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(env.vcs.resolves(), 0);
}

#[tokio::test]
async fn test_missing_profile_and_collection() {
    let env = TestEnv::new();
    let workspace = env.workspace();

    let err = workspace
        .compile(&profile_id("foundation/nope"), false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Compilation(CompilationError::ProfileNotFound { .. })
    ));

    let err = workspace
        .compile(&profile_id("elsewhere/base"), false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Compilation(CompilationError::Collection(_))
    ));
}

#[tokio::test]
async fn test_concurrent_compiles_share_fetches() {
    let env = TestEnv::new();
    env.write_base_profile();
    env.write_profile(
        "foundation",
        "dev",
        "profile: { name: dev, version: 1, schema_version: 1, extends: base }\n",
    );
    let workspace = env.workspace();
    let base = profile_id("foundation/base");
    let dev = profile_id("foundation/dev");

    let (a, b) = tokio::join!(workspace.compile(&base, false), workspace.compile(&dev, false));
    assert!(a.unwrap().recompiled);
    assert!(b.unwrap().recompiled);
    // loop-basic and context-simple, each checked out once
    assert_eq!(env.vcs.checkouts(), 2);
}

#[tokio::test]
async fn test_concurrent_compiles_of_one_profile_serialize() {
    let env = TestEnv::new();
    env.write_base_profile();
    let workspace = env.workspace();
    let id = profile_id("foundation/base");

    let (a, b) = tokio::join!(workspace.compile(&id, false), workspace.compile(&id, false));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.manifest_hash, b.manifest_hash);
    assert!(a.recompiled != b.recompiled, "exactly one compile does the work");
}

#[tokio::test]
async fn test_workspaces_on_one_root_share_locks_and_fetches() {
    let env = TestEnv::new();
    env.write_base_profile();
    let first = env.workspace();
    let second = env.workspace();
    let id = profile_id("foundation/base");

    let (a, b) = tokio::join!(first.compile(&id, false), second.compile(&id, false));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a.recompiled != b.recompiled, "exactly one compile does the work");
    assert_eq!(env.vcs.checkouts(), 2);
}

fn lean_frontmatter() -> String {
    format!(
        r#"profile:
  name: lean
  version: 1.0.0
  schema_version: 1
session:
  orchestrator:
    module: loop-basic
    source: git+{loop_git}@v1
  context:
    module: context-simple
    source: git+{context_git}@v1#subdirectory=context
providers:
  - module: provider-mock
    source: ../modules/provider-mock
"#,
        loop_git = LOOP_GIT,
        context_git = CONTEXT_GIT,
    )
}

#[tokio::test]
async fn test_revision_change_recompiles_only_that_profile() {
    let env = TestEnv::new().with_collection("team");
    env.write_base_profile();
    env.write_module("team", "provider-mock");
    env.write_profile("team", "lean", &lean_frontmatter());
    let workspace = env.workspace();
    let base = profile_id("foundation/base");
    let lean = profile_id("team/lean");

    let (first_base, first_lean) =
        tokio::join!(workspace.compile(&base, false), workspace.compile(&lean, false));
    let (first_base, first_lean) = (first_base.unwrap(), first_lean.unwrap());

    let lean_lock_path = lock_file_path(&env.data_root(), &lean);
    let lean_lock = fs::read(&lean_lock_path).unwrap();
    fs::write(first_lean.path.join("MARKER"), "untouched").unwrap();

    // Point base at a new revision of loop-basic
    let new_revision = "4444444444444444444444444444444444444444";
    env.vcs.publish(LOOP_GIT, "v2", new_revision, &[("loop.py", "def run(): return 2\n")]);
    env.write_profile(
        "foundation",
        "base",
        &base_frontmatter("sonnet").replace(
            &format!("git+{}@v1", LOOP_GIT),
            &format!("git+{}@v2", LOOP_GIT),
        ),
    );
    assert_eq!(workspace.status(&base).await.unwrap(), ProfileStatus::Stale);
    assert_eq!(workspace.status(&lean).await.unwrap(), ProfileStatus::UpToDate);

    let (second_base, second_lean) =
        tokio::join!(workspace.compile(&base, false), workspace.compile(&lean, false));
    let (second_base, second_lean) = (second_base.unwrap(), second_lean.unwrap());

    assert!(second_base.recompiled);
    assert_ne!(second_base.manifest_hash, first_base.manifest_hash);
    assert_eq!(
        fs::read_to_string(second_base.path.join("orchestrator/loop-basic/loop.py")).unwrap(),
        "def run(): return 2\n"
    );
    let base_lock = CompilationLock::read(&lock_file_path(&env.data_root(), &base)).unwrap();
    assert_eq!(
        base_lock.resources["orchestrator/loop-basic"].identity,
        format!("vcs:{}", new_revision)
    );

    assert!(!second_lean.recompiled);
    assert_eq!(second_lean.manifest_hash, first_lean.manifest_hash);
    assert_eq!(fs::read(&lean_lock_path).unwrap(), lean_lock);
    assert!(first_lean.path.join("MARKER").is_file());
    assert_eq!(
        fs::read_to_string(first_lean.path.join("orchestrator/loop-basic/loop.py")).unwrap(),
        "def run(): pass\n"
    );
}

#[tokio::test]
async fn test_list_profiles() {
    let env = TestEnv::new();
    env.write_base_profile();
    env.write_profile("foundation", "dev", "profile: { extends: base }\n");
    env.write_file("foundation", "profiles/notes.txt", "not a profile");
    let workspace = env.workspace();

    assert_eq!(
        workspace.list_profiles("foundation").await.unwrap(),
        vec!["base".to_string(), "dev".to_string()]
    );
    assert!(workspace.list_profiles("missing").await.is_err());
}
