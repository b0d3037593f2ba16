//! Provenance metadata for a tracing run
//!
//! One JSON record per run, written next to the video and replaced by the
//! next run. Everything time- or environment-dependent (run id, start time,
//! tool versions) is captured before `record` is called, so recording the
//! same run twice yields the same bytes.

use crate::process::{probe_version, ToolRunner};
use crate::services::parameter_normalizer::ParameterSet;
use crate::session::SessionKey;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;
use whisk_common::checksum::sha256_file_if_exists;
use whisk_common::files::write_atomic;
use whisk_common::time::to_rfc3339;

/// Metadata recording errors
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Cannot checksum {path}: {source}")]
    Checksum {
        path: PathBuf,
        source: whisk_common::Error,
    },

    #[error("Cannot serialize metadata record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Cannot write metadata file {path}: {source}")]
    Write {
        path: PathBuf,
        source: whisk_common::Error,
    },
}

/// Identity of one invocation, captured once at start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub session: SessionKey,
}

impl RunContext {
    pub fn start(session: SessionKey) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: whisk_common::time::now(),
            session,
        }
    }
}

/// Which optional stages and naming modes were active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModeFlags {
    pub dummy: bool,
    pub preprocessed: bool,
    pub skip_stitch: bool,
    pub legacy_output_naming: bool,
}

/// Build identification of this tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftwareInfo {
    pub name: String,
    pub version: String,
    pub git_hash: String,
    pub build_profile: String,
}

impl SoftwareInfo {
    /// Values baked in by the build script
    pub fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_hash: env!("WHISK_COMMIT").to_string(),
            build_profile: env!("WHISK_PROFILE").to_string(),
        }
    }
}

/// Version banners of the external tools, keyed by role
pub type DependencyVersions = BTreeMap<String, String>;

/// Recorded in place of the engine version when the engine was not run
pub const ENGINE_SKIPPED: &str = "skipped (dummy run)";

/// Probe `ffmpeg -version` and `<engine> --version`
///
/// A dummy run never launches the engine, not even for its version.
pub fn probe_dependencies(
    runner: &dyn ToolRunner,
    ffmpeg: &Path,
    trace_engine: &Path,
    dummy: bool,
) -> DependencyVersions {
    let mut versions = DependencyVersions::new();
    versions.insert("ffmpeg".to_string(), probe_version(runner, ffmpeg, "-version"));
    let engine = if dummy {
        ENGINE_SKIPPED.to_string()
    } else {
        probe_version(runner, trace_engine, "--version")
    };
    versions.insert("trace_engine".to_string(), engine);
    versions
}

/// A file referenced by the record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetDescriptor {
    pub path: PathBuf,
    /// `None` when the file does not exist
    pub sha256: Option<String>,
}

impl AssetDescriptor {
    pub fn describe(path: &Path) -> Result<Self, MetadataError> {
        let sha256 = sha256_file_if_exists(path).map_err(|source| MetadataError::Checksum {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            sha256,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataRecord {
    pub run_id: Uuid,
    pub timestamp: String,
    pub session: SessionKey,
    pub mode: ModeFlags,
    pub inputs: Vec<AssetDescriptor>,
    pub outputs: Vec<AssetDescriptor>,
    pub parameters: ParameterSet,
    pub software: SoftwareInfo,
    pub dependencies: DependencyVersions,
}

/// Assembles and persists metadata records
#[derive(Debug, Clone)]
pub struct MetadataRecorder {
    context: RunContext,
    mode: ModeFlags,
    software: SoftwareInfo,
    dependencies: DependencyVersions,
}

impl MetadataRecorder {
    pub fn new(context: RunContext, mode: ModeFlags, dependencies: DependencyVersions) -> Self {
        Self {
            context,
            mode,
            software: SoftwareInfo::current(),
            dependencies,
        }
    }

    pub fn with_software(mut self, software: SoftwareInfo) -> Self {
        self.software = software;
        self
    }

    /// Assemble the record without writing it
    pub fn assemble(
        &self,
        inputs: &[PathBuf],
        outputs: &[PathBuf],
        params: &ParameterSet,
    ) -> Result<MetadataRecord, MetadataError> {
        Ok(MetadataRecord {
            run_id: self.context.run_id,
            timestamp: to_rfc3339(&self.context.started_at),
            session: self.context.session.clone(),
            mode: self.mode,
            inputs: inputs
                .iter()
                .map(|p| AssetDescriptor::describe(p))
                .collect::<Result<_, _>>()?,
            outputs: outputs
                .iter()
                .map(|p| AssetDescriptor::describe(p))
                .collect::<Result<_, _>>()?,
            parameters: params.clone(),
            software: self.software.clone(),
            dependencies: self.dependencies.clone(),
        })
    }

    /// Write the record to `metadata_path`, replacing any previous one
    pub fn record(
        &self,
        inputs: &[PathBuf],
        outputs: &[PathBuf],
        params: &ParameterSet,
        metadata_path: &Path,
    ) -> Result<MetadataRecord, MetadataError> {
        let record = self.assemble(inputs, outputs, params)?;

        let mut body = serde_json::to_vec_pretty(&record)?;
        body.push(b'\n');

        write_atomic(metadata_path, &body).map_err(|source| MetadataError::Write {
            path: metadata_path.to_path_buf(),
            source,
        })?;

        tracing::info!(
            path = %metadata_path.display(),
            run_id = %record.run_id,
            "Recorded run metadata"
        );

        Ok(record)
    }
}
