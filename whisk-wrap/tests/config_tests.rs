//! Configuration resolution through the environment
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Every test touching WHISK_WRAP_CONFIG or WHISK_DATA_ROOT is #[serial].

use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use whisk_wrap::config::{TransferConfig, CONFIG_ENV_VAR, DATA_ROOT_ENV_VAR};
use whisk_wrap::WrapConfig;

fn write_config(dir: &Path, config: &WrapConfig) -> PathBuf {
    let path = dir.join("whisk-wrap.toml");
    fs::write(&path, toml::to_string(config).unwrap()).unwrap();
    path
}

#[test]
#[serial]
fn test_config_file_from_environment() {
    let dir = TempDir::new().unwrap();
    let expected = WrapConfig {
        data_root: Some(PathBuf::from("/mnt/data/MultiSens/data")),
        trace_engine: PathBuf::from("/opt/whisk/bin/whiskiwrap-trace"),
        transfer: TransferConfig {
            enabled: true,
            host: Some("lab@mirror".to_string()),
            local_root: Some(PathBuf::from("/mnt/data")),
            remote_root: Some(PathBuf::from("/mnt/mirror")),
        },
        ..Default::default()
    };
    let path = write_config(dir.path(), &expected);
    env::set_var(CONFIG_ENV_VAR, &path);

    let loaded = WrapConfig::load(None).unwrap();
    assert_eq!(loaded, expected);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_cli_config_wins_over_environment() {
    let dir = TempDir::new().unwrap();
    env::set_var(CONFIG_ENV_VAR, dir.path().join("does-not-exist.toml"));

    let cli = write_config(
        dir.path(),
        &WrapConfig {
            prepared_extension: "mkv".to_string(),
            ..Default::default()
        },
    );

    let loaded = WrapConfig::load(Some(&cli)).unwrap();
    assert_eq!(loaded.prepared_extension, "mkv");

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_explicit_config_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();

    let result = WrapConfig::load(Some(&dir.path().join("missing.toml")));
    assert!(matches!(result, Err(whisk_common::Error::Config(_))));
}

#[test]
#[serial]
fn test_data_root_environment_overrides_file() {
    env::set_var(DATA_ROOT_ENV_VAR, "/from/env");
    let config = WrapConfig {
        data_root: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    assert_eq!(config.resolve_data_root(None), PathBuf::from("/from/env"));
    assert_eq!(
        config.resolve_data_root(Some(Path::new("/from/cli"))),
        PathBuf::from("/from/cli")
    );

    env::remove_var(DATA_ROOT_ENV_VAR);
    assert_eq!(config.resolve_data_root(None), PathBuf::from("/from/toml"));
}
