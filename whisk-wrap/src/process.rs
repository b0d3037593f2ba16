//! External process execution
//!
//! Every external tool (ffmpeg, the tracing engine, scp) is launched through
//! [`ToolRunner`]. The runner only reports what happened; callers decide
//! whether a non-zero exit is fatal, and they always check.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use thiserror::Error;

/// Process launch errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Binary not found in PATH or at the configured location
    #[error("Binary not found: {0}")]
    BinaryNotFound(PathBuf),

    /// Failed to execute command
    #[error("Failed to execute {program}: {reason}")]
    ExecutionError { program: PathBuf, reason: String },
}

/// A fully built command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Pass the child's stderr through to ours instead of capturing it
    pub stream_stderr: bool,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stream_stderr: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn stream_stderr(mut self, stream: bool) -> Self {
        self.stream_stderr = stream;
        self
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Outcome of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Last `max_lines` lines of stderr, for error messages
    pub fn stderr_tail(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self.stderr.lines().collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }
}

/// Launches external tools
pub trait ToolRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ProcessError>;
}

/// Runs tools with `std::process::Command`, blocking until they exit
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ProcessError> {
        tracing::debug!(command = %invocation, "Launching external tool");

        let stderr = if invocation.stream_stderr {
            Stdio::inherit()
        } else {
            Stdio::piped()
        };

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stderr(stderr)
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    ProcessError::BinaryNotFound(invocation.program.clone())
                }
                _ => ProcessError::ExecutionError {
                    program: invocation.program.clone(),
                    reason: e.to_string(),
                },
            })?;

        Ok(ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// First line of a tool's version banner, or `"unavailable"`
pub fn probe_version(runner: &dyn ToolRunner, program: &std::path::Path, flag: &str) -> String {
    let invocation = ToolInvocation::new(program).arg(flag);
    match runner.run(&invocation) {
        Ok(output) if output.success => output
            .stdout
            .lines()
            .chain(output.stderr.lines())
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| "unavailable".to_string()),
        Ok(_) | Err(_) => "unavailable".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_display() {
        let invocation = ToolInvocation::new("ffmpeg").arg("-i").arg("in.avi").arg("out.mp4");
        assert_eq!(invocation.to_string(), "ffmpeg -i in.avi out.mp4");
    }

    #[test]
    fn test_stderr_tail() {
        let output = ToolOutput {
            stderr: "one\ntwo\nthree\n".to_string(),
            ..Default::default()
        };
        assert_eq!(output.stderr_tail(2), "two\nthree");
        assert_eq!(output.stderr_tail(10), "one\ntwo\nthree");
    }

    #[test]
    fn test_missing_binary_is_reported() {
        let invocation = ToolInvocation::new("/nonexistent/whisk-wrap-tool");
        let result = SystemRunner.run(&invocation);
        assert!(matches!(result, Err(ProcessError::BinaryNotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_reported_not_raised() {
        let invocation = ToolInvocation::new("sh").arg("-c").arg("echo oops >&2; exit 3");
        let output = SystemRunner.run(&invocation).unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[test]
    fn test_probe_version_unavailable() {
        let version = probe_version(
            &SystemRunner,
            std::path::Path::new("/nonexistent/whisk-wrap-tool"),
            "--version",
        );
        assert_eq!(version, "unavailable");
    }
}
