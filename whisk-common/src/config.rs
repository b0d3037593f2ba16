//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Logging section shared by every tool configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file value
/// 4. Current working directory (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_value: Option<&Path>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = config_value {
        return path.to_path_buf();
    }

    // Priority 4: current directory
    PathBuf::from(".")
}

/// Locate the configuration file for `app_name`
///
/// An explicitly requested file (CLI or environment) must exist. The platform
/// default location is optional; `Ok(None)` means compiled defaults apply.
pub fn resolve_config_file(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    app_name: &str,
) -> Result<Option<PathBuf>> {
    if let Some(path) = cli_arg {
        return require_existing(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return require_existing(PathBuf::from(path));
        }
    }

    Ok(default_config_candidates(app_name)
        .into_iter()
        .find(|path| path.exists()))
}

fn require_existing(path: PathBuf) -> Result<Option<PathBuf>> {
    if path.is_file() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )))
    }
}

/// Platform default config file locations, most specific first
fn default_config_candidates(app_name: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(app_name).join("config.toml"));
    }

    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc").join(app_name).join("config.toml"));
    }

    candidates
}

/// Read and parse a TOML configuration file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_load_toml_with_default_section() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "name = \"rig\"\n").unwrap();

        let sample: Sample = load_toml(&path).unwrap();
        assert_eq!(sample.name, "rig");
        assert_eq!(sample.logging.level, "info");
    }

    #[test]
    fn test_load_toml_parse_error_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "name = ").unwrap();

        let result: Result<Sample> = load_toml(&path);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_default_candidates_are_named_after_app() {
        for candidate in default_config_candidates("whisk-wrap") {
            assert!(candidate.ends_with("whisk-wrap/config.toml"));
        }
    }
}
