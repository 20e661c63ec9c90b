//! Configuration loading and root folder resolution
//!
//! Tests that touch PTRACK_ROOT_FOLDER are marked #[serial] so they never
//! race on the process environment.

use ptrack_common::config::{
    load_toml_config, resolve_root_folder, RootFolder, StorageBackend, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_missing_toml_file_returns_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_toml_config(&dir.path().join("absent.toml")).unwrap();

    assert_eq!(config.port(), 5780);
    assert_eq!(config.storage(), StorageBackend::Sqlite);
    assert!(config.collaborator.api_key.is_none());
}

#[test]
fn test_malformed_toml_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = [not a port").unwrap();

    assert!(load_toml_config(&path).is_err());
}

#[test]
fn test_full_toml_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/var/lib/ptrack"
port = 6000
storage = "memory"
max_upload_bytes = 1024

[logging]
level = "debug"

[collaborator]
api_key = "sk-test"
timeout_secs = 5

[enrichment]
max_concurrent = 3

[activity]
weekly_target_hours = 40.0
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/var/lib/ptrack")));
    assert_eq!(config.port(), 6000);
    assert_eq!(config.storage(), StorageBackend::Memory);
    assert_eq!(config.max_upload_bytes(), 1024);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.collaborator.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.collaborator.timeout_secs, 5);
    assert_eq!(config.enrichment.max_concurrent, Some(3));
    assert_eq!(config.activity.weekly_target_hours, 40.0);
}

#[test]
fn test_invalid_weekly_target_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[activity]\nweekly_target_hours = 0.0\n").unwrap();

    assert!(load_toml_config(&path).is_err());
}

#[test]
#[serial]
fn test_cli_argument_wins() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/ptrack-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/ptrack-toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(Some(Path::new("/tmp/ptrack-cli")), &config);
    assert_eq!(resolved, PathBuf::from("/tmp/ptrack-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/ptrack-env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/ptrack-toml")),
        ..Default::default()
    };

    assert_eq!(
        resolve_root_folder(None, &config),
        PathBuf::from("/tmp/ptrack-env")
    );

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_beats_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/ptrack-toml")),
        ..Default::default()
    };

    assert_eq!(
        resolve_root_folder(None, &config),
        PathBuf::from("/tmp/ptrack-toml")
    );
}

#[test]
#[serial]
fn test_default_root_folder_when_nothing_configured() {
    env::remove_var(ROOT_FOLDER_ENV);
    let resolved = resolve_root_folder(None, &TomlConfig::default());

    assert!(!resolved.as_os_str().is_empty());
    assert!(resolved.ends_with("ptrack") || resolved.ends_with("ptrack_data"));
}

#[test]
fn test_root_folder_creates_uploads_dir() {
    let dir = TempDir::new().unwrap();
    let root = RootFolder::new(dir.path().join("nested").join("root"));

    root.ensure_exists().unwrap();
    assert!(root.uploads_dir().is_dir());
    assert!(!root.database_path().exists());
}
