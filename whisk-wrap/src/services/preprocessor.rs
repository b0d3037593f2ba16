//! Raw capture preprocessing with ffmpeg
//!
//! Raw captures show white whiskers on a black background; the tracing
//! engine needs dark whiskers on a light background. One ffmpeg pass
//! inverts luma, crops to the region of interest and transcodes into the
//! prepared container:
//!
//! ```text
//! ffmpeg -nostdin -n -i in.avi -vf lutyuv=y=negval,crop=W:H:X:Y -vcodec mpeg4 -q:v 2 in.mp4
//! ```

use crate::process::{ProcessError, ToolInvocation, ToolRunner};
use crate::services::parameter_normalizer::{ParamError, ParameterSet};
use crate::services::session_locator::VideoAsset;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Preprocessing errors
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// Crop rectangle with zero width or height
    #[error("Invalid crop rectangle {0}: width and height must be positive")]
    InvalidCrop(CropRect),

    /// Prepared video already present; ffmpeg would refuse to overwrite it
    #[error("Prepared video already exists: {0}")]
    OutputExists(PathBuf),

    /// ffmpeg could not be launched
    #[error(transparent)]
    Launch(#[from] ProcessError),

    /// ffmpeg ran but failed
    #[error("Preprocessing of {input} failed ({status}): {stderr}")]
    PreprocessFailure {
        input: PathBuf,
        status: String,
        stderr: String,
    },
}

/// Crop rectangle in pixels, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    pub x: u64,
    pub y: u64,
    pub width: u64,
    pub height: u64,
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

impl CropRect {
    /// Crop from `crop_width`, `crop_height`, `crop_x`, `crop_y`
    ///
    /// All four unset means no preprocessing; a partial crop is an error.
    pub fn from_params(params: &ParameterSet) -> Result<Option<Self>, ParamError> {
        let values = (
            params.opt_integer("crop_width")?,
            params.opt_integer("crop_height")?,
            params.opt_integer("crop_x")?,
            params.opt_integer("crop_y")?,
        );

        match values {
            (Some(width), Some(height), Some(x), Some(y)) => Ok(Some(Self {
                x,
                y,
                width,
                height,
            })),
            (None, None, None, None) => Ok(None),
            _ => Err(ParamError::InvalidValue {
                key: "crop_width".to_string(),
                reason: "crop_width, crop_height, crop_x and crop_y must be set together"
                    .to_string(),
            }),
        }
    }

    /// ffmpeg filter chain: invert luma, then crop
    pub fn filter_chain(&self) -> String {
        format!(
            "lutyuv=y=negval,crop={}:{}:{}:{}",
            self.width, self.height, self.x, self.y
        )
    }
}

/// Encoder settings for the prepared video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSettings {
    pub codec: String,
    pub quality: u64,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            codec: "mpeg4".to_string(),
            quality: 2,
        }
    }
}

impl EncodeSettings {
    pub fn from_params(params: &ParameterSet) -> Result<Self, ParamError> {
        Ok(Self {
            codec: params.text("video_codec")?.to_string(),
            quality: params.integer("video_quality")?,
        })
    }
}

/// Prepared video path: raw capture stem with the prepared extension, same directory
pub fn prepared_path(raw: &VideoAsset, prepared_extension: &str) -> PathBuf {
    raw.directory().join(format!(
        "{}.{}",
        raw.stem(),
        prepared_extension.trim_start_matches('.')
    ))
}

/// Runs ffmpeg to prepare raw captures
pub struct Preprocessor<'a> {
    runner: &'a dyn ToolRunner,
    ffmpeg: PathBuf,
    encode: EncodeSettings,
}

impl<'a> Preprocessor<'a> {
    pub fn new(runner: &'a dyn ToolRunner, ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            ffmpeg: ffmpeg.into(),
            encode: EncodeSettings::default(),
        }
    }

    pub fn with_encode(mut self, encode: EncodeSettings) -> Self {
        self.encode = encode;
        self
    }

    /// Build the ffmpeg command line
    pub fn build_invocation(&self, input: &Path, crop: &CropRect, output: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.ffmpeg)
            .arg("-nostdin")
            .arg("-n")
            .arg("-i")
            .arg(input)
            .arg("-vf")
            .arg(crop.filter_chain())
            .arg("-vcodec")
            .arg(&self.encode.codec)
            .arg("-q:v")
            .arg(self.encode.quality.to_string())
            .arg(output)
    }

    /// Invert, crop and transcode `input` into `output`
    pub fn preprocess(
        &self,
        input: &VideoAsset,
        crop: &CropRect,
        output: &Path,
    ) -> Result<VideoAsset, PreprocessError> {
        if crop.width == 0 || crop.height == 0 {
            return Err(PreprocessError::InvalidCrop(*crop));
        }

        if output.exists() {
            return Err(PreprocessError::OutputExists(output.to_path_buf()));
        }

        let invocation = self.build_invocation(&input.path, crop, output);
        tracing::info!(
            input = %input.path.display(),
            output = %output.display(),
            crop = %crop,
            "Preprocessing raw capture"
        );
        tracing::debug!(command = %invocation, "ffmpeg command");

        let result = self.runner.run(&invocation)?;

        if !result.success {
            return Err(PreprocessError::PreprocessFailure {
                input: input.path.clone(),
                status: exit_status(result.code),
                stderr: result.stderr_tail(20),
            });
        }

        if !output.is_file() {
            return Err(PreprocessError::PreprocessFailure {
                input: input.path.clone(),
                status: "exit 0".to_string(),
                stderr: format!("ffmpeg reported success but {} was not written", output.display()),
            });
        }

        let format = output
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(VideoAsset::new(output.to_path_buf(), format))
    }
}

pub(crate) fn exit_status(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit {}", code),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ToolOutput;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Fake ffmpeg: records the call and optionally writes the output file
    struct FakeFfmpeg {
        calls: RefCell<Vec<ToolInvocation>>,
        exit_code: i32,
        write_output: bool,
    }

    impl FakeFfmpeg {
        fn new(exit_code: i32, write_output: bool) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                exit_code,
                write_output,
            }
        }
    }

    impl ToolRunner for FakeFfmpeg {
        fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ProcessError> {
            self.calls.borrow_mut().push(invocation.clone());
            if self.write_output {
                let output = invocation.args.last().unwrap();
                std::fs::write(output, b"prepared").unwrap();
            }
            Ok(ToolOutput {
                success: self.exit_code == 0,
                code: Some(self.exit_code),
                stderr: "Conversion failed!".to_string(),
                ..Default::default()
            })
        }
    }

    const CROP: CropRect = CropRect {
        x: 10,
        y: 20,
        width: 320,
        height: 240,
    };

    fn raw_asset(dir: &Path) -> VideoAsset {
        let path = dir.join("whiskers.avi");
        std::fs::write(&path, b"raw").unwrap();
        VideoAsset::new(path, "avi")
    }

    #[test]
    fn test_command_line() {
        let runner = FakeFfmpeg::new(0, false);
        let preprocessor = Preprocessor::new(&runner, "ffmpeg");
        let invocation = preprocessor.build_invocation(
            Path::new("/v/in.avi"),
            &CROP,
            Path::new("/v/in.mp4"),
        );

        assert_eq!(
            invocation.to_string(),
            "ffmpeg -nostdin -n -i /v/in.avi -vf lutyuv=y=negval,crop=320:240:10:20 \
             -vcodec mpeg4 -q:v 2 /v/in.mp4"
        );
    }

    #[test]
    fn test_prepared_path_keeps_stem() {
        let raw = VideoAsset::new(PathBuf::from("/v/session 1.avi"), "avi");
        assert_eq!(prepared_path(&raw, "mp4"), PathBuf::from("/v/session 1.mp4"));
    }

    #[test]
    fn test_successful_preprocess() {
        let dir = TempDir::new().unwrap();
        let raw = raw_asset(dir.path());
        let output = prepared_path(&raw, "mp4");
        let runner = FakeFfmpeg::new(0, true);

        let prepared = Preprocessor::new(&runner, "ffmpeg")
            .preprocess(&raw, &CROP, &output)
            .unwrap();

        assert_eq!(prepared.path, output);
        assert_eq!(prepared.format, "mp4");
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[test]
    fn test_non_zero_exit_is_failure() {
        let dir = TempDir::new().unwrap();
        let raw = raw_asset(dir.path());
        let runner = FakeFfmpeg::new(1, false);

        let result = Preprocessor::new(&runner, "ffmpeg").preprocess(
            &raw,
            &CROP,
            &prepared_path(&raw, "mp4"),
        );

        match result {
            Err(PreprocessError::PreprocessFailure { status, stderr, .. }) => {
                assert_eq!(status, "exit 1");
                assert!(stderr.contains("Conversion failed!"));
            }
            other => panic!("Expected PreprocessFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_success_without_output_is_failure() {
        let dir = TempDir::new().unwrap();
        let raw = raw_asset(dir.path());
        let runner = FakeFfmpeg::new(0, false);

        let result = Preprocessor::new(&runner, "ffmpeg").preprocess(
            &raw,
            &CROP,
            &prepared_path(&raw, "mp4"),
        );
        assert!(matches!(result, Err(PreprocessError::PreprocessFailure { .. })));
    }

    #[test]
    fn test_existing_output_and_empty_crop_rejected_before_launch() {
        let dir = TempDir::new().unwrap();
        let raw = raw_asset(dir.path());
        let output = prepared_path(&raw, "mp4");
        let runner = FakeFfmpeg::new(0, true);
        let preprocessor = Preprocessor::new(&runner, "ffmpeg");

        let empty = CropRect { width: 0, ..CROP };
        assert!(matches!(
            preprocessor.preprocess(&raw, &empty, &output),
            Err(PreprocessError::InvalidCrop(_))
        ));

        std::fs::write(&output, b"old").unwrap();
        assert!(matches!(
            preprocessor.preprocess(&raw, &CROP, &output),
            Err(PreprocessError::OutputExists(_))
        ));

        assert!(runner.calls.borrow().is_empty());
    }
}
