//! `extends` chains across profiles and collections

use crate::integration::test_utils::{profile_id, TestEnv};
use mountplan::error::{ApiError, CompilationError};
use serde_json::json;

#[tokio::test]
async fn test_child_extends_parent_in_same_collection() {
    let env = TestEnv::new();
    env.write_base_profile();
    env.write_module("foundation", "tool-web");
    env.write_profile(
        "foundation",
        "dev",
        r#"profile:
  name: dev
  extends: base
providers:
  - module: provider-mock
    config:
      temperature: 0.2
tools:
  - module: tool-web
    source: ../modules/tool-web
"#,
    );
    let workspace = env.workspace();

    let manifest = workspace
        .compiler()
        .load_manifest(&profile_id("foundation/dev"))
        .await
        .unwrap();
    assert_eq!(manifest.profile.name.as_deref(), Some("dev"));
    assert_eq!(manifest.profile.version.as_deref(), Some("1.0.0"));
    assert!(manifest.profile.extends.is_none());
    assert_eq!(manifest.providers.len(), 1);
    assert_eq!(
        serde_json::Value::Object(manifest.providers[0].config.clone()),
        json!({"model": "sonnet", "temperature": 0.2})
    );
    assert!(manifest.providers[0].source.is_some());
    assert_eq!(manifest.tools[0].module, "tool-web");
    assert!(manifest.agents.contains_key("zen"));

    let compiled = workspace
        .compile(&profile_id("foundation/dev"), false)
        .await
        .unwrap();
    assert!(compiled.path.join("tools/tool-web/__init__.py").is_file());
    assert!(compiled.path.join("orchestrator/loop-basic").is_dir());
}

#[tokio::test]
async fn test_multi_level_and_cross_collection_chain() {
    let env = TestEnv::new().with_collection("team");
    env.write_base_profile();
    env.write_profile(
        "foundation",
        "dev",
        "profile: { name: dev, extends: base }\ntools:\n  - { module: tool-a, source: ../modules/provider-mock }\n",
    );
    env.write_profile(
        "team",
        "custom",
        "profile: { name: custom, extends: foundation/dev }\ntools:\n  - { module: tool-b, source: ../modules/tool-b }\n",
    );
    env.write_module("team", "tool-b");
    let workspace = env.workspace();

    let manifest = workspace
        .compiler()
        .load_manifest(&profile_id("team/custom"))
        .await
        .unwrap();
    let tools: Vec<&str> = manifest.tools.iter().map(|t| t.module.as_str()).collect();
    assert_eq!(tools, vec!["tool-a", "tool-b"]);
    assert_eq!(manifest.profile.name.as_deref(), Some("custom"));

    let compiled = workspace
        .compile(&profile_id("team/custom"), false)
        .await
        .unwrap();
    assert!(compiled.path.ends_with("profiles/team/custom"));
    assert!(compiled.path.join("tools/tool-b/__init__.py").is_file());
}

#[tokio::test]
async fn test_parent_change_makes_child_stale() {
    let env = TestEnv::new();
    env.write_base_profile();
    env.write_profile("foundation", "dev", "profile: { name: dev, extends: base }\n");
    let workspace = env.workspace();
    let dev = profile_id("foundation/dev");

    workspace.compile(&dev, false).await.unwrap();
    env.write_profile(
        "foundation",
        "base",
        &crate::integration::test_utils::base_frontmatter("haiku"),
    );
    assert_eq!(
        workspace.status(&dev).await.unwrap(),
        mountplan::ProfileStatus::Stale
    );
}

#[tokio::test]
async fn test_inheritance_cycle_is_reported() {
    let env = TestEnv::new();
    env.write_profile("foundation", "a", "profile: { name: a, extends: b }\n");
    env.write_profile("foundation", "b", "profile: { name: b, extends: c }\n");
    env.write_profile("foundation", "c", "profile: { name: c, extends: a }\n");
    let workspace = env.workspace();

    let err = workspace
        .compile(&profile_id("foundation/a"), false)
        .await
        .unwrap_err();
    match err {
        ApiError::Compilation(CompilationError::InheritanceCycle { chain }) => assert_eq!(
            chain,
            vec!["foundation/a", "foundation/b", "foundation/c", "foundation/a"]
        ),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(env.vcs.resolves(), 0);
}

#[tokio::test]
async fn test_self_extension_is_a_cycle() {
    let env = TestEnv::new();
    env.write_profile("foundation", "loop", "profile: { name: loop, extends: foundation/loop }\n");
    let workspace = env.workspace();

    let err = workspace
        .compile(&profile_id("foundation/loop"), false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Compilation(CompilationError::InheritanceCycle { .. })
    ));
}

#[tokio::test]
async fn test_missing_parent() {
    let env = TestEnv::new();
    env.write_profile("foundation", "orphan", "profile: { name: orphan, extends: ghost }\n");
    let workspace = env.workspace();

    let err = workspace
        .compile(&profile_id("foundation/orphan"), false)
        .await
        .unwrap_err();
    match err {
        ApiError::Compilation(CompilationError::ProfileNotFound { profile, .. }) => {
            assert_eq!(profile, "foundation/ghost")
        }
        other => panic!("unexpected error: {other}"),
    }
}
