//! Integration tests for the configuration system and workspace wiring

use crate::integration::test_utils::{profile_id, with_xdg_env, TestEnv};
use mountplan::config::{ConfigLoader, MountplanConfig};
use mountplan::error::{ApiError, ConfigurationError};
use mountplan::Workspace;
use tempfile::TempDir;

#[test]
fn test_workspace_config_registers_collections() {
    let test_dir = TempDir::new().unwrap();
    let workspace_root = test_dir.path().join("project");
    std::fs::create_dir_all(workspace_root.join("config")).unwrap();
    std::fs::write(
        workspace_root.join("config").join("config.toml"),
        r#"
root = "state"

[[collections]]
name = "foundation"
source = "./collections/foundation"

[[collections]]
name = "team"
source = "git+https://git.example.com/acme/team-profiles@main"

[fetch]
concurrency = 2
"#,
    )
    .unwrap();

    let config = with_xdg_env(&test_dir, || ConfigLoader::load(&workspace_root)).unwrap();
    assert_eq!(config.collections.len(), 2);
    assert_eq!(config.fetch.concurrency, 2);
    assert_eq!(config.fetch.timeout_secs, 300);
    assert!(config.validate().is_ok());

    let workspace = Workspace::from_config(config, &workspace_root).unwrap();
    // Relative roots are anchored at the workspace
    assert_eq!(workspace.root(), workspace_root.join("state"));
}

#[test]
fn test_environment_overrides_files() {
    let test_dir = TempDir::new().unwrap();
    let config_file = test_dir.path().join("custom.toml");
    std::fs::write(&config_file, "[fetch]\nconcurrency = 2\ntimeout_secs = 60\n").unwrap();

    let config = with_xdg_env(&test_dir, || {
        std::env::set_var("MOUNTPLAN__FETCH__TIMEOUT_SECS", "15");
        let result = ConfigLoader::load_from_file(&config_file);
        std::env::remove_var("MOUNTPLAN__FETCH__TIMEOUT_SECS");
        result
    })
    .unwrap();

    assert_eq!(config.fetch.concurrency, 2);
    assert_eq!(config.fetch.timeout_secs, 15);
}

#[test]
fn test_missing_config_file() {
    let test_dir = TempDir::new().unwrap();
    let err = ConfigLoader::load_from_file(&test_dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigurationError::Load(_)));
}

#[test]
fn test_root_defaults_to_xdg_data_home() {
    let test_dir = TempDir::new().unwrap();
    let root = with_xdg_env(&test_dir, || MountplanConfig::default().effective_root()).unwrap();
    assert_eq!(root, test_dir.path().join("data").join("mountplan"));
}

#[test]
fn test_invalid_config_is_rejected_by_workspace() {
    let env = TestEnv::new();
    let mut config = env.config();
    config.fetch.concurrency = 0;
    config.collections.push(config.collections[0].clone());

    let err = Workspace::with_fetchers(config, env.dir.path(), env.vcs.clone(), env.http.clone())
        .err()
        .unwrap();
    match err {
        ApiError::Configuration(ConfigurationError::Invalid(problems)) => {
            assert_eq!(problems.len(), 2)
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_git_collection_is_fetched_through_the_cache() {
    let env = TestEnv::new();
    let team_git = "https://git.example.com/acme/team-profiles";
    env.vcs.publish(
        team_git,
        "main",
        "3333333333333333333333333333333333333333",
        &[
            ("profiles/lean.md", "---\nprofile: { name: lean }\n---\n"),
            ("profiles/full.md", "---\nprofile: { name: full }\n---\n"),
        ],
    );

    let mut config = env.config();
    config.collections.push(mountplan::config::CollectionConfig {
        name: "team".to_string(),
        source: format!("git+{}@main", team_git),
    });
    let workspace =
        Workspace::with_fetchers(config, env.dir.path(), env.vcs.clone(), env.http.clone())
            .unwrap();

    assert_eq!(
        workspace.list_profiles("team").await.unwrap(),
        vec!["full".to_string(), "lean".to_string()]
    );
    workspace.list_profiles("team").await.unwrap();
    assert_eq!(env.vcs.checkouts(), 1);

    let manifest = workspace
        .compiler()
        .load_manifest(&profile_id("team/lean"))
        .await;
    // Present but incomplete
    assert!(manifest.is_err());
}

#[test]
fn test_open_applies_root_override() {
    let test_dir = TempDir::new().unwrap();
    let workspace_root = test_dir.path().join("project");
    std::fs::create_dir_all(&workspace_root).unwrap();
    let config_file = test_dir.path().join("mountplan.toml");
    std::fs::write(&config_file, "root = \"from-file\"\n").unwrap();

    let workspace = with_xdg_env(&test_dir, || {
        Workspace::open(&workspace_root, Some(config_file.as_path()), None)
    })
    .unwrap();
    assert_eq!(workspace.root(), workspace_root.join("from-file"));

    let override_root = test_dir.path().join("elsewhere");
    let workspace = with_xdg_env(&test_dir, || {
        Workspace::open(&workspace_root, Some(config_file.as_path()), Some(override_root.clone()))
    })
    .unwrap();
    assert_eq!(workspace.root(), override_root);
}
