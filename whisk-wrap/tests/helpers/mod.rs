//! Test helper utilities
//!
//! Shared fixtures for the whisk-wrap integration tests: a session tree on a
//! temporary data root and a recording fake for the external tools.

#![allow(dead_code)]

use serde_json::Value;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use whisk_wrap::process::{ProcessError, ToolInvocation, ToolOutput, ToolRunner};
use whisk_wrap::{SessionKey, WrapConfig};

pub const SUBJECT: &str = "2P_mouse_M12";
pub const DATE: &str = "2020-03-14";
pub const SITE: &str = "site2";
pub const GRAB: &str = "grab03";

/// Data root holding one session's video directory
pub struct SessionFixture {
    pub root: TempDir,
    pub session: SessionKey,
    pub video_dir: PathBuf,
    pub config: WrapConfig,
}

impl SessionFixture {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let session = SessionKey::parse(SUBJECT, DATE, SITE, GRAB).unwrap();
        let video_dir = session.video_directory(root.path());
        fs::create_dir_all(&video_dir).unwrap();

        Self {
            root,
            session,
            video_dir,
            config: WrapConfig::default(),
        }
    }

    pub fn data_root(&self) -> &Path {
        self.root.path()
    }

    /// Create a video file in the session's video directory
    pub fn add_video(&self, name: &str) -> PathBuf {
        let path = self.video_dir.join(name);
        fs::write(&path, format!("frames of {}", name)).unwrap();
        path
    }

    /// Write a parameter record outside the data tree
    pub fn write_params(&self, params: &Value) -> PathBuf {
        let path = self.root.path().join("whiskiwrap_params.json");
        fs::write(&path, serde_json::to_string_pretty(params).unwrap()).unwrap();
        path
    }

    /// Output slot directories currently in the video directory
    pub fn slots(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.video_dir)
            .unwrap()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().unwrap().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("whiski_output_"))
            .collect();
        names.sort();
        names
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.video_dir.join(&self.config.metadata_filename)
    }

    pub fn read_metadata(&self) -> Value {
        serde_json::from_slice(&fs::read(self.metadata_path()).unwrap()).unwrap()
    }
}

/// Minimal valid parameter record, extended with `extra`
pub fn params_with(extra: Value) -> Value {
    let mut params = serde_json::json!({
        "pix_fmt": "gray",
        "bufsize": 10E8,
        "duration": "None",
        "start_frame_time": "None",
        "start_frame_number": "None",
        "write_stderr_to_screen": "True",
        "tiffs_to_trace_directory": "",
        "sensitive": "False",
        "chunk_size": 200,
        "chunk_name_pattern": "chunk%08d.tif",
        "stop_after_frame": "None",
        "delete_tiffs": "True",
        "timestamps_filename": "None",
        "monitor_video": "None",
        "monitor_video_kwargs": "None",
        "write_monitor_ffmpeg_stderr_to_screen": "False",
        "frame_func": "None",
        "n_trace_processes": 4,
        "expectedrows": 1000000,
        "verbose": "True",
        "skip_stitch": "False",
        "face": "right"
    });
    if let Some(extra) = extra.as_object() {
        for (key, value) in extra {
            params[key] = value.clone();
        }
    }
    params
}

/// Fake ffmpeg, tracing engine and scp
///
/// ffmpeg writes its last argument, the engine writes the `h5_filename` of
/// its request, version probes answer with a banner. Every call is recorded.
pub struct FakeRunner {
    pub calls: RefCell<Vec<ToolInvocation>>,
    pub engine_exit_code: i32,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            engine_exit_code: 0,
        }
    }

    pub fn failing_engine(code: i32) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            engine_exit_code: code,
        }
    }

    /// Command lines of all calls, in order
    pub fn commands(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.to_string()).collect()
    }

    /// Calls made to `program`, excluding version probes
    pub fn work_calls(&self, program: &str) -> Vec<ToolInvocation> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.program == Path::new(program))
            .filter(|c| !is_version_probe(c))
            .cloned()
            .collect()
    }
}

fn is_version_probe(invocation: &ToolInvocation) -> bool {
    invocation.args.len() == 1 && (invocation.args[0] == "-version" || invocation.args[0] == "--version")
}

fn ok(stdout: &str) -> ToolOutput {
    ToolOutput {
        success: true,
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ProcessError> {
        self.calls.borrow_mut().push(invocation.clone());

        if is_version_probe(invocation) {
            let banner = format!("{} version 1.0-test", invocation.program.display());
            return Ok(ok(&banner));
        }

        let program = invocation.program.to_string_lossy().into_owned();
        match program.as_str() {
            "ffmpeg" => {
                let output = invocation.args.last().unwrap();
                fs::write(output, b"prepared frames").unwrap();
                Ok(ok(""))
            }
            "whiskiwrap-trace" => {
                if self.engine_exit_code != 0 {
                    return Ok(ToolOutput {
                        success: false,
                        code: Some(self.engine_exit_code),
                        stdout: String::new(),
                        stderr: "stitching failed: chunk00000200.tif unreadable".to_string(),
                    });
                }
                let request: Value =
                    serde_json::from_slice(&fs::read(&invocation.args[1]).unwrap()).unwrap();
                let h5 = request["h5_filename"].as_str().unwrap().to_string();
                fs::write(h5, b"HDF5 whisker traces").unwrap();
                Ok(ok(""))
            }
            "scp" => Ok(ok("")),
            other => Err(ProcessError::BinaryNotFound(PathBuf::from(other))),
        }
    }
}
