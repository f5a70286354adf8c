//! Filesystem utilities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// If `dir` holds exactly one entry and it is a directory, return it.
///
/// Release archives usually wrap their contents in a single top-level
/// folder; this finds it so the contents can be moved into place.
pub fn single_subdir(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?;

    let first = match entries.next() {
        Some(entry) => entry?,
        None => return Ok(None),
    };
    if entries.next().is_some() || !first.file_type()?.is_dir() {
        return Ok(None);
    }

    Ok(Some(first.path()))
}
