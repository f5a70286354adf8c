//! `.tar.gz` tool archives.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;

/// Extract a gzip-compressed tarball read from `reader` into `dest`.
///
/// Entries that would land outside `dest` (absolute paths, `..`) are
/// skipped. File modes are preserved so executables stay executable.
pub fn extract_tar_gz<R: Read>(reader: R, dest: &Path) -> Result<usize> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("failed to create directory: {}", dest.display()))?;

    let mut archive = Archive::new(GzDecoder::new(reader));
    archive.set_preserve_permissions(true);

    let mut unpacked = 0;
    for entry in archive.entries().context("failed to read archive entries")? {
        let mut entry = entry.context("failed to read archive entry")?;
        let path = entry
            .path()
            .context("invalid path in archive")?
            .to_string_lossy()
            .into_owned();

        if entry
            .unpack_in(dest)
            .with_context(|| format!("failed to extract {}", path))?
        {
            unpacked += 1;
        } else {
            tracing::warn!("Skipping archive entry outside destination: {}", path);
        }
    }

    Ok(unpacked)
}

/// Extract the tarball at `archive` into `dest`.
pub fn extract_tar_gz_file(archive: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive)
        .with_context(|| format!("failed to open archive: {}", archive.display()))?;
    extract_tar_gz(BufReader::new(file), dest)
        .with_context(|| format!("failed to extract archive: {}", archive.display()))
}
