//! File content checksums
//!
//! SHA-256 of file content, read in 1MB chunks, returned as lowercase hex.

use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Calculate SHA-256 hash of a file
///
/// **Algorithm:**
/// 1. Read file content in chunks (1MB at a time for memory efficiency)
/// 2. Feed each chunk to the hasher
/// 3. Return hex-encoded hash string
pub fn sha256_file(path: &Path) -> Result<String> {
    tracing::debug!(path = %path.display(), "Calculating SHA-256 hash");

    let mut file = File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open {} for hashing: {}", path.display(), e),
        ))
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024]; // 1MB chunks

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {} for hashing: {}", path.display(), e),
            ))
        })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash a file if it exists, `None` otherwise
pub fn sha256_file_if_exists(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    sha256_file(path).map(Some)
}
