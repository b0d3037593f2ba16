//! Tool configuration for whisk-wrap
//!
//! Loaded once at process start from TOML. Resolution order for the file:
//! `--config` → `WHISK_WRAP_CONFIG` → platform config dir → compiled defaults.
//!
//! Example:
//!
//! ```toml
//! data_root = "/mnt/data/MultiSens/data"
//! ffmpeg = "/usr/bin/ffmpeg"
//! trace_engine = "whiskiwrap-trace"
//!
//! [logging]
//! level = "debug"
//!
//! [transfer]
//! enabled = true
//! host = "dan@companion.example.org"
//! local_root = "/rigel/users/dan/data"
//! remote_root = "/mnt/farscape/homes/dan/data"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use whisk_common::config::{load_toml, resolve_config_file, resolve_root_folder, LoggingConfig};
use whisk_common::Result;

/// Application name used for the platform config directory
pub const APP_NAME: &str = "whisk-wrap";
/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "WHISK_WRAP_CONFIG";
/// Environment variable overriding the data root
pub const DATA_ROOT_ENV_VAR: &str = "WHISK_DATA_ROOT";

/// whisk-wrap configuration file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapConfig {
    /// Root of the `<subject>/2P/<date>/...` hierarchy
    pub data_root: Option<PathBuf>,
    /// Video transcoder binary
    pub ffmpeg: PathBuf,
    /// Whisker tracing engine binary (accepts `--request <json>`)
    pub trace_engine: PathBuf,
    /// Copy tool used for output transfer
    pub scp: PathBuf,
    /// Extension of the raw capture (preprocessing input)
    pub raw_extension: String,
    /// Extension of the prepared video (tracing input)
    pub prepared_extension: String,
    /// Output slot directory prefix; slots are `<prefix><N>`
    pub output_prefix: String,
    /// Metadata file written into the video directory, overwritten each run
    pub metadata_filename: String,
    pub logging: LoggingConfig,
    pub transfer: TransferConfig,
}

impl Default for WrapConfig {
    fn default() -> Self {
        Self {
            data_root: None,
            ffmpeg: PathBuf::from("ffmpeg"),
            trace_engine: PathBuf::from("whiskiwrap-trace"),
            scp: PathBuf::from("scp"),
            raw_extension: "avi".to_string(),
            prepared_extension: "mp4".to_string(),
            output_prefix: "whiski_output_".to_string(),
            metadata_filename: "whiski_wrap_metadata.json".to_string(),
            logging: LoggingConfig::default(),
            transfer: TransferConfig::default(),
        }
    }
}

/// Mirror-host transfer of finished output slots
///
/// Output paths under `local_root` are copied to the same relative
/// location under `remote_root` on `host`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub enabled: bool,
    /// scp destination host, e.g. `user@host`
    pub host: Option<String>,
    pub local_root: Option<PathBuf>,
    pub remote_root: Option<PathBuf>,
}

impl WrapConfig {
    /// Resolve and load the configuration file, falling back to defaults
    pub fn load(cli_config: Option<&Path>) -> Result<Self> {
        match resolve_config_file(cli_config, CONFIG_ENV_VAR, APP_NAME)? {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration");
                load_toml(&path)
            }
            None => {
                info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Resolve the data root: `--data-root` → `WHISK_DATA_ROOT` → TOML → current directory
    pub fn resolve_data_root(&self, cli_data_root: Option<&Path>) -> PathBuf {
        resolve_root_folder(cli_data_root, DATA_ROOT_ENV_VAR, self.data_root.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WrapConfig::default();
        assert_eq!(config.raw_extension, "avi");
        assert_eq!(config.prepared_extension, "mp4");
        assert_eq!(config.output_prefix, "whiski_output_");
        assert_eq!(config.metadata_filename, "whiski_wrap_metadata.json");
        assert!(!config.transfer.enabled);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "data_root = \"/data\"\nffmpeg = \"/opt/ffmpeg\"\n\n[transfer]\nenabled = true\nhost = \"dan@mirror\"\n",
        )
        .unwrap();

        let config = WrapConfig::load(Some(&path)).unwrap();
        assert_eq!(config.data_root, Some(PathBuf::from("/data")));
        assert_eq!(config.ffmpeg, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(config.trace_engine, PathBuf::from("whiskiwrap-trace"));
        assert!(config.transfer.enabled);
        assert_eq!(config.transfer.host.as_deref(), Some("dan@mirror"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_cli_data_root_wins() {
        let config = WrapConfig {
            data_root: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_data_root(Some(Path::new("/from/cli"))),
            PathBuf::from("/from/cli")
        );
    }
}
