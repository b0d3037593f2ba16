//! File write helpers

use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Write `contents` to `path` by writing a sibling temp file and renaming it into place.
///
/// Any existing file at `path` is replaced.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let temp_path = temp_sibling(path);
    fs::write(&temp_path, contents)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.json");

        write_atomic(&path, b"{}").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"{}");
        assert!(!dir.path().join("record.json.tmp").exists());
    }

    #[test]
    fn test_write_atomic_overwrites_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record.json");
        fs::write(&path, b"old contents that are longer").unwrap();

        write_atomic(&path, b"new").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
    }
}
