//! Whisker tracing engine invocation
//!
//! The engine reads the prepared video in chunks, traces each chunk in a
//! pool of worker processes and stitches the results into one HDF5 trace
//! artifact. This module builds the typed request for it, hands it over as
//! `<slot>/trace_request.json` and checks the outcome:
//!
//! ```text
//! whiskiwrap-trace --request <slot>/trace_request.json
//! ```
//!
//! In dummy mode the engine is never launched; a zero-length placeholder is
//! written where the artifact would be.

use crate::process::{ProcessError, ToolInvocation, ToolRunner};
use crate::services::output_versioner::OutputSlot;
use crate::services::parameter_normalizer::{Face, ParamError, ParameterSet};
use crate::services::preprocessor::exit_status;
use crate::services::session_locator::VideoAsset;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Request file written into the output slot
pub const REQUEST_FILENAME: &str = "trace_request.json";
/// Artifact name used by the older scripts
pub const LEGACY_ARTIFACT_NAME: &str = "whiski_output.hdf5";

/// Tracing errors
#[derive(Debug, Error)]
pub enum TraceError {
    /// Engine could not be launched
    #[error(transparent)]
    Launch(#[from] ProcessError),

    /// Engine reported an error or produced nothing
    #[error("Trace engine failed on {video} ({status}): {diagnostics}")]
    TraceEngineFailure {
        video: PathBuf,
        status: String,
        diagnostics: String,
    },

    /// Request or placeholder file could not be written
    #[error("Cannot write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },
}

/// Typed view of the tracing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TraceSettings {
    pub pix_fmt: String,
    pub bufsize: u64,
    pub duration: Option<f64>,
    pub start_frame_time: Option<f64>,
    pub start_frame_number: Option<u64>,
    pub write_stderr_to_screen: bool,
    pub tiffs_to_trace_directory: Option<PathBuf>,
    pub sensitive: bool,
    pub chunk_size: u64,
    pub chunk_name_pattern: String,
    pub stop_after_frame: Option<u64>,
    pub delete_tiffs: bool,
    pub timestamps_filename: Option<PathBuf>,
    pub monitor_video: Option<PathBuf>,
    pub monitor_video_kwargs: Option<Value>,
    pub write_monitor_ffmpeg_stderr_to_screen: bool,
    pub frame_func: Option<String>,
    pub n_trace_processes: u64,
    pub expectedrows: u64,
    pub verbose: bool,
    pub skip_stitch: bool,
    pub face: Face,
    /// Dummy run: skip the engine, write a placeholder artifact
    pub debug: bool,
    pub legacy_output_naming: bool,
}

impl TraceSettings {
    pub fn from_params(params: &ParameterSet) -> Result<Self, ParamError> {
        Ok(Self {
            pix_fmt: params.text("pix_fmt")?.to_string(),
            bufsize: params.integer("bufsize")?,
            duration: params.opt_float("duration")?,
            start_frame_time: params.opt_float("start_frame_time")?,
            start_frame_number: params.opt_integer("start_frame_number")?,
            write_stderr_to_screen: params.flag("write_stderr_to_screen")?,
            tiffs_to_trace_directory: params
                .opt_path("tiffs_to_trace_directory")?
                .map(Path::to_path_buf),
            sensitive: params.flag("sensitive")?,
            chunk_size: params.integer("chunk_size")?,
            chunk_name_pattern: params.text("chunk_name_pattern")?.to_string(),
            stop_after_frame: params.opt_integer("stop_after_frame")?,
            delete_tiffs: params.flag("delete_tiffs")?,
            timestamps_filename: params.opt_path("timestamps_filename")?.map(Path::to_path_buf),
            monitor_video: params.opt_path("monitor_video")?.map(Path::to_path_buf),
            monitor_video_kwargs: params.opt_json("monitor_video_kwargs")?.cloned(),
            write_monitor_ffmpeg_stderr_to_screen: params
                .flag("write_monitor_ffmpeg_stderr_to_screen")?,
            frame_func: params.opt_text("frame_func")?.map(str::to_string),
            n_trace_processes: params.integer("n_trace_processes")?,
            expectedrows: params.integer("expectedrows")?,
            verbose: params.flag("verbose")?,
            skip_stitch: params.flag("skip_stitch")?,
            face: params.face("face")?,
            debug: params.flag("debug")?,
            legacy_output_naming: params.flag("legacy_output_naming")?,
        })
    }
}

/// Streaming video reader bound to the prepared video
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReaderDescriptor {
    pub input_filename: PathBuf,
    pub pix_fmt: String,
    pub bufsize: u64,
    pub duration: Option<f64>,
    pub start_frame_time: Option<f64>,
    pub start_frame_number: Option<u64>,
    pub write_stderr_to_screen: bool,
}

/// Combined chunk / trace / stitch request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRequest {
    pub reader: ReaderDescriptor,
    pub tiffs_to_trace_directory: PathBuf,
    pub sensitive: bool,
    pub chunk_size: u64,
    pub chunk_name_pattern: String,
    pub stop_after_frame: Option<u64>,
    pub delete_tiffs: bool,
    pub timestamps_filename: Option<PathBuf>,
    pub monitor_video: Option<PathBuf>,
    pub monitor_video_kwargs: Option<Value>,
    pub write_monitor_ffmpeg_stderr_to_screen: bool,
    pub h5_filename: PathBuf,
    pub frame_func: Option<String>,
    pub n_trace_processes: u64,
    pub expectedrows: u64,
    pub verbose: bool,
    pub skip_stitch: bool,
    pub face: Face,
}

impl TraceRequest {
    pub fn build(video: &VideoAsset, settings: &TraceSettings, h5_filename: PathBuf) -> Self {
        Self {
            reader: ReaderDescriptor {
                input_filename: video.path.clone(),
                pix_fmt: settings.pix_fmt.clone(),
                bufsize: settings.bufsize,
                duration: settings.duration,
                start_frame_time: settings.start_frame_time,
                start_frame_number: settings.start_frame_number,
                write_stderr_to_screen: settings.write_stderr_to_screen,
            },
            tiffs_to_trace_directory: settings
                .tiffs_to_trace_directory
                .clone()
                .unwrap_or_else(|| video.directory().to_path_buf()),
            sensitive: settings.sensitive,
            chunk_size: settings.chunk_size,
            chunk_name_pattern: settings.chunk_name_pattern.clone(),
            stop_after_frame: settings.stop_after_frame,
            delete_tiffs: settings.delete_tiffs,
            timestamps_filename: settings.timestamps_filename.clone(),
            monitor_video: settings.monitor_video.clone(),
            monitor_video_kwargs: settings.monitor_video_kwargs.clone(),
            write_monitor_ffmpeg_stderr_to_screen: settings.write_monitor_ffmpeg_stderr_to_screen,
            h5_filename,
            frame_func: settings.frame_func.clone(),
            n_trace_processes: settings.n_trace_processes,
            expectedrows: settings.expectedrows,
            verbose: settings.verbose,
            skip_stitch: settings.skip_stitch,
            face: settings.face,
        }
    }
}

/// Outcome of the tracing stage
#[derive(Debug, Clone, PartialEq)]
pub struct TraceResult {
    pub artifact: PathBuf,
    pub dummy: bool,
    /// Request handed to the engine; `None` in dummy mode
    pub request: Option<TraceRequest>,
}

/// Artifact location inside the slot
pub fn artifact_path(video: &VideoAsset, slot: &OutputSlot, legacy_naming: bool) -> PathBuf {
    if legacy_naming {
        slot.path.join(LEGACY_ARTIFACT_NAME)
    } else {
        slot.path.join(format!("{}_whiski_output.hdf5", video.stem()))
    }
}

/// Drives the external tracing engine
pub struct TraceInvoker<'a> {
    runner: &'a dyn ToolRunner,
    engine: PathBuf,
}

impl<'a> TraceInvoker<'a> {
    pub fn new(runner: &'a dyn ToolRunner, engine: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            engine: engine.into(),
        }
    }

    /// Trace `video` into `slot`, or write a placeholder when `dummy_mode` is set
    pub fn run_trace(
        &self,
        video: &VideoAsset,
        settings: &TraceSettings,
        slot: &OutputSlot,
        dummy_mode: bool,
    ) -> Result<TraceResult, TraceError> {
        let artifact = artifact_path(video, slot, settings.legacy_output_naming);

        if dummy_mode {
            tracing::info!(artifact = %artifact.display(), "Dummy run, writing placeholder artifact");
            fs::write(&artifact, b"").map_err(|e| TraceError::WriteFailed {
                path: artifact.clone(),
                reason: e.to_string(),
            })?;
            return Ok(TraceResult {
                artifact,
                dummy: true,
                request: None,
            });
        }

        let request = TraceRequest::build(video, settings, artifact.clone());
        let request_path = slot.path.join(REQUEST_FILENAME);
        let body = serde_json::to_vec_pretty(&request).map_err(|e| TraceError::WriteFailed {
            path: request_path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&request_path, body).map_err(|e| TraceError::WriteFailed {
            path: request_path.clone(),
            reason: e.to_string(),
        })?;

        let invocation = ToolInvocation::new(&self.engine)
            .arg("--request")
            .arg(&request_path);

        tracing::info!(
            video = %video.path.display(),
            workers = settings.n_trace_processes,
            chunk_size = settings.chunk_size,
            face = %settings.face,
            "Running trace engine"
        );

        let output = self.runner.run(&invocation)?;

        if !output.success {
            return Err(TraceError::TraceEngineFailure {
                video: video.path.clone(),
                status: exit_status(output.code),
                diagnostics: output.stderr_tail(20),
            });
        }

        if !settings.skip_stitch && !artifact.is_file() {
            return Err(TraceError::TraceEngineFailure {
                video: video.path.clone(),
                status: exit_status(output.code),
                diagnostics: format!("engine exited cleanly but wrote no {}", artifact.display()),
            });
        }

        tracing::info!(artifact = %artifact.display(), "Tracing complete");

        Ok(TraceResult {
            artifact,
            dummy: false,
            request: Some(request),
        })
    }
}
