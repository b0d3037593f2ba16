//! Session video locator
//!
//! Resolves a session key to the single video file of a pipeline stage.
//! The video directory must contain exactly one regular file whose name
//! contains `.<extension>`; zero or several candidates are fatal.

use crate::session::SessionKey;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Locator errors
#[derive(Debug, Error)]
pub enum LocateError {
    /// Video directory does not exist for this session
    #[error("Video directory for session {session} not found: {directory}")]
    VideoDirectoryMissing {
        session: SessionKey,
        directory: PathBuf,
    },

    /// No file with the expected extension
    #[error(
        "No .{extension} video found for session {session}. \
         Please ensure that the video is saved in {directory}"
    )]
    NoCandidateFile {
        session: SessionKey,
        directory: PathBuf,
        extension: String,
    },

    /// More than one file with the expected extension
    #[error(
        "More than one .{extension} video found for session {session} in {directory}: {}. \
         Please ensure that only one video is saved there",
        join_paths(.candidates)
    )]
    AmbiguousCandidateFile {
        session: SessionKey,
        directory: PathBuf,
        extension: String,
        candidates: Vec<PathBuf>,
    },

    /// Cannot list the video directory
    #[error("Cannot read video directory {directory}: {reason}")]
    DirectoryAccess { directory: PathBuf, reason: String },
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A located video file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoAsset {
    pub path: PathBuf,
    /// Container format, i.e. the extension it was located by
    pub format: String,
}

impl VideoAsset {
    pub fn new(path: PathBuf, format: impl Into<String>) -> Self {
        Self {
            path,
            format: format.into(),
        }
    }

    /// File name without its final extension
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Directory holding the video
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Finds session videos under a data root
#[derive(Debug, Clone)]
pub struct SessionLocator {
    data_root: PathBuf,
}

impl SessionLocator {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Video directory of a session
    pub fn video_directory(&self, session: &SessionKey) -> PathBuf {
        session.video_directory(&self.data_root)
    }

    /// Locate the one video of `session` whose name contains `.<extension>`
    pub fn locate(&self, session: &SessionKey, extension: &str) -> Result<VideoAsset, LocateError> {
        let directory = self.video_directory(session);
        let extension = extension.trim_start_matches('.');

        if !directory.is_dir() {
            return Err(LocateError::VideoDirectoryMissing {
                session: session.clone(),
                directory,
            });
        }

        let needle = format!(".{}", extension);
        let mut candidates = Vec::new();

        for entry in WalkDir::new(&directory).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| LocateError::DirectoryAccess {
                directory: directory.clone(),
                reason: e.to_string(),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            if entry.file_name().to_string_lossy().contains(&needle) {
                candidates.push(entry.into_path());
            }
        }

        candidates.sort();

        match candidates.len() {
            0 => Err(LocateError::NoCandidateFile {
                session: session.clone(),
                directory,
                extension: extension.to_string(),
            }),
            1 => {
                let path = candidates.remove(0);
                tracing::info!(session = %session, path = %path.display(), "Located video");
                Ok(VideoAsset::new(path, extension))
            }
            _ => Err(LocateError::AmbiguousCandidateFile {
                session: session.clone(),
                directory,
                extension: extension.to_string(),
                candidates,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn session() -> SessionKey {
        SessionKey::parse("mouseA", "2020-01-01", "site1", "grab01").unwrap()
    }

    fn setup() -> (TempDir, SessionLocator, PathBuf) {
        let root = TempDir::new().unwrap();
        let locator = SessionLocator::new(root.path());
        let video_dir = locator.video_directory(&session());
        fs::create_dir_all(&video_dir).unwrap();
        (root, locator, video_dir)
    }

    #[test]
    fn test_single_match_is_returned() {
        let (_root, locator, video_dir) = setup();
        fs::write(video_dir.join("whiskers.mp4"), b"").unwrap();
        fs::write(video_dir.join("notes.txt"), b"").unwrap();

        let asset = locator.locate(&session(), "mp4").unwrap();
        assert_eq!(asset.path, video_dir.join("whiskers.mp4"));
        assert_eq!(asset.format, "mp4");
        assert_eq!(asset.stem(), "whiskers");
    }

    #[test]
    fn test_leading_dot_in_extension_is_accepted() {
        let (_root, locator, video_dir) = setup();
        fs::write(video_dir.join("whiskers.avi"), b"").unwrap();

        let asset = locator.locate(&session(), ".avi").unwrap();
        assert_eq!(asset.path, video_dir.join("whiskers.avi"));
    }

    #[test]
    fn test_no_match() {
        let (_root, locator, video_dir) = setup();
        fs::write(video_dir.join("whiskers.avi"), b"").unwrap();

        match locator.locate(&session(), "mp4") {
            Err(LocateError::NoCandidateFile { directory, session: s, .. }) => {
                assert_eq!(directory, video_dir);
                assert_eq!(s, session());
            }
            other => panic!("Expected NoCandidateFile, got {:?}", other),
        }
    }

    #[test]
    fn test_two_matches_are_ambiguous() {
        let (_root, locator, video_dir) = setup();
        fs::write(video_dir.join("b.mp4"), b"").unwrap();
        fs::write(video_dir.join("a.mp4"), b"").unwrap();

        match locator.locate(&session(), "mp4") {
            Err(LocateError::AmbiguousCandidateFile { candidates, .. }) => {
                assert_eq!(candidates, vec![video_dir.join("a.mp4"), video_dir.join("b.mp4")]);
            }
            other => panic!("Expected AmbiguousCandidateFile, got {:?}", other),
        }
    }

    #[test]
    fn test_directories_are_not_candidates() {
        let (_root, locator, video_dir) = setup();
        fs::create_dir(video_dir.join("old.mp4.d")).unwrap();
        fs::write(video_dir.join("whiskers.mp4"), b"").unwrap();

        let asset = locator.locate(&session(), "mp4").unwrap();
        assert_eq!(asset.path, video_dir.join("whiskers.mp4"));
    }

    #[test]
    fn test_missing_video_directory() {
        let root = TempDir::new().unwrap();
        let locator = SessionLocator::new(root.path());

        assert!(matches!(
            locator.locate(&session(), "mp4"),
            Err(LocateError::VideoDirectoryMissing { .. })
        ));
    }
}
