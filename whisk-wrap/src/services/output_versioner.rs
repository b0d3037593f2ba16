//! Output slot allocation
//!
//! Each run writes into a fresh `<prefix><N>` directory next to the video,
//! where `N` is one more than the largest existing suffix. Slots are never
//! reused, so rerunning a session never overwrites an earlier run.
//!
//! Allocation is a plain list-then-create and is not safe against two runs
//! targeting the same session at the same time. Creation uses
//! `create_dir`, so a directory that appears between the scan and the create
//! surfaces as `DirectoryCreationError` rather than being shared.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Slot allocation errors
#[derive(Debug, Error)]
pub enum SlotError {
    /// Cannot list the parent directory
    #[error("Cannot scan {directory} for output slots: {reason}")]
    ScanFailed { directory: PathBuf, reason: String },

    /// Cannot create the slot directory
    #[error("Failed to create output directory {path}: {reason}")]
    DirectoryCreationError { path: PathBuf, reason: String },

    /// An existing slot index leaves no larger u64 to allocate
    #[error("Output slot {name} in {directory} is at the index limit; no later slot can be numbered")]
    IndexExhausted { directory: PathBuf, name: String },
}

/// An allocated output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSlot {
    pub path: PathBuf,
    pub index: u64,
}

/// Digits after `prefix` when `name` is `<prefix><digits>`
fn slot_digits<'n>(name: &'n str, prefix: &str) -> Option<&'n str> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(digits)
}

/// Parse `<prefix><digits>` into its suffix; `None` also when the digits overflow u64
pub fn slot_suffix(name: &str, prefix: &str) -> Option<u64> {
    slot_digits(name, prefix)?.parse().ok()
}

/// Largest slot suffix among the immediate subdirectories, 0 if none
///
/// A slot whose digits do not fit in u64 is an error: no allocatable index
/// could be greater than it.
pub fn max_slot_suffix(directory: &Path, prefix: &str) -> Result<u64, SlotError> {
    let entries = fs::read_dir(directory).map_err(|e| SlotError::ScanFailed {
        directory: directory.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut max = 0;
    for entry in entries {
        let entry = entry.map_err(|e| SlotError::ScanFailed {
            directory: directory.to_path_buf(),
            reason: e.to_string(),
        })?;

        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(digits) = slot_digits(&name, prefix) {
            let suffix: u64 = digits.parse().map_err(|_| SlotError::IndexExhausted {
                directory: directory.to_path_buf(),
                name: name.clone(),
            })?;
            max = max.max(suffix);
        }
    }

    Ok(max)
}

/// Allocates versioned output directories
#[derive(Debug, Clone)]
pub struct OutputVersioner {
    prefix: String,
}

impl OutputVersioner {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Create `<prefix><max + 1>` under `directory`
    pub fn allocate_slot(&self, directory: &Path) -> Result<OutputSlot, SlotError> {
        let max = max_slot_suffix(directory, &self.prefix)?;
        let index = max.checked_add(1).ok_or_else(|| SlotError::IndexExhausted {
            directory: directory.to_path_buf(),
            name: format!("{}{}", self.prefix, max),
        })?;
        let path = directory.join(format!("{}{}", self.prefix, index));

        fs::create_dir(&path).map_err(|e| SlotError::DirectoryCreationError {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        tracing::info!(path = %path.display(), index, "Allocated output slot");

        Ok(OutputSlot { path, index })
    }
}
