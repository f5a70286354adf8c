//! Downloading and installing tool releases.
//!
//! Archives are downloaded into the staging directory and verified before
//! being extracted. Extraction happens next to the final install directory
//! and is moved into place in one rename, so a partially extracted tool is
//! never visible at its install path.

pub mod archive;

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;
use url::Url;

use crate::core::{ToolFlavour, ToolRef, ToolRelease};
use crate::util::fs::single_subdir;
use crate::util::hash::{digest_eq, sha256_file};
use crate::util::shell::{Shell, Status};

/// Ensures tools are present on disk.
pub trait Installer {
    /// Whether the release's executable is present.
    fn is_installed(&self, release: &ToolRelease) -> bool;

    /// Fetch the release's archive for the running host.
    fn download(&self, release: &ToolRelease, shell: &Arc<Shell>) -> Result<(), InstallError>;

    /// Unpack a previously downloaded archive into the install directory.
    fn install(&self, release: &ToolRelease, shell: &Arc<Shell>) -> Result<(), InstallError>;
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("no download of {tool} is available for {os}/{arch}")]
    NoFlavour {
        tool: ToolRef,
        os: String,
        arch: String,
    },

    #[error("failed to download {tool} from {url}: {message}")]
    Download {
        tool: ToolRef,
        url: Url,
        message: String,
    },

    #[error("downloaded archive of {tool} is corrupt: {message}")]
    Checksum { tool: ToolRef, message: String },

    #[error("failed to extract {tool}: {cause:#}")]
    Extract { tool: ToolRef, cause: anyhow::Error },

    #[error("archive of {tool} has not been downloaded to {}", path.display())]
    MissingArchive { tool: ToolRef, path: PathBuf },

    #[error("installed {tool} has no executable at {}", path.display())]
    MissingExecutable { tool: ToolRef, path: PathBuf },

    #[error("I/O error installing {tool}: {source}")]
    Io {
        tool: ToolRef,
        #[source]
        source: io::Error,
    },
}

const CHUNK_SIZE: usize = 64 * 1024;

/// Installs tools from `.tar.gz` archives fetched over HTTP.
#[derive(Debug, Clone)]
pub struct ToolInstaller {
    staging_dir: PathBuf,
    timeout: Duration,
}

impl ToolInstaller {
    /// Create an installer keeping archives in `staging_dir`.
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        ToolInstaller {
            staging_dir: staging_dir.into(),
            timeout: Duration::from_secs(300),
        }
    }

    /// Set the timeout for a whole download.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Where the archive of `flavour` is kept.
    pub fn archive_path(&self, flavour: &ToolFlavour) -> PathBuf {
        self.staging_dir.join(flavour.archive_file_name())
    }

    fn host_flavour<'a>(&self, release: &'a ToolRelease) -> Result<&'a ToolFlavour, InstallError> {
        release
            .flavour_for_host()
            .ok_or_else(|| InstallError::NoFlavour {
                tool: release.tool.clone(),
                os: std::env::consts::OS.to_string(),
                arch: std::env::consts::ARCH.to_string(),
            })
    }

    /// Whether a staged archive exists and matches the published checksum.
    fn is_cached(&self, flavour: &ToolFlavour) -> bool {
        let path = self.archive_path(flavour);
        match (&flavour.sha256, path.is_file()) {
            (Some(expected), true) => sha256_file(&path)
                .map(|actual| digest_eq(&actual, expected))
                .unwrap_or(false),
            _ => false,
        }
    }

    fn fetch(
        &self,
        tool: &ToolRef,
        flavour: &ToolFlavour,
        shell: &Arc<Shell>,
    ) -> Result<(), InstallError> {
        let io_err = |source| InstallError::Io {
            tool: tool.clone(),
            source,
        };
        let download_err = |message: String| InstallError::Download {
            tool: tool.clone(),
            url: flavour.url.clone(),
            message,
        };

        fs::create_dir_all(&self.staging_dir).map_err(io_err)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| download_err(e.to_string()))?;
        let mut response = client
            .get(flavour.url.clone())
            .send()
            .map_err(|e| download_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(download_err(format!("HTTP {}", response.status())));
        }

        let total = response.content_length().or(flavour.size).unwrap_or(0);
        let mut progress = shell.bytes_progress(tool, total);

        let mut tmp = NamedTempFile::new_in(&self.staging_dir).map_err(io_err)?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = response
                .read(&mut buf)
                .map_err(|e| download_err(e.to_string()))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            tmp.write_all(&buf[..n]).map_err(io_err)?;
            progress.inc(n as u64);
        }
        progress.finish();
        tmp.flush().map_err(io_err)?;

        let size = progress.position();
        if let Some(expected) = flavour.size {
            if size != expected {
                return Err(InstallError::Checksum {
                    tool: tool.clone(),
                    message: format!("expected {} bytes, got {}", expected, size),
                });
            }
        }

        let actual = hex::encode(hasher.finalize());
        if let Some(expected) = &flavour.sha256 {
            if !digest_eq(&actual, expected) {
                return Err(InstallError::Checksum {
                    tool: tool.clone(),
                    message: format!("expected sha256 {}, got {}", expected, actual),
                });
            }
        }
        tracing::debug!("Downloaded {} ({} bytes, sha256 {})", tool, size, actual);

        tmp.persist(self.archive_path(flavour))
            .map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl Installer for ToolInstaller {
    fn is_installed(&self, release: &ToolRelease) -> bool {
        release.executable_path().is_file()
    }

    fn download(&self, release: &ToolRelease, shell: &Arc<Shell>) -> Result<(), InstallError> {
        let flavour = self.host_flavour(release)?;

        if self.is_cached(flavour) {
            tracing::debug!("Using cached archive for {}", release.tool);
            return Ok(());
        }

        tracing::debug!("Downloading {} from {}", release.tool, flavour.url);
        self.fetch(&release.tool, flavour, shell)
    }

    fn install(&self, release: &ToolRelease, shell: &Arc<Shell>) -> Result<(), InstallError> {
        let tool = &release.tool;
        let io_err = |source| InstallError::Io {
            tool: tool.clone(),
            source,
        };
        let extract_err = |cause| InstallError::Extract {
            tool: tool.clone(),
            cause,
        };

        let flavour = self.host_flavour(release)?;
        let archive_path = self.archive_path(flavour);
        if !archive_path.is_file() {
            return Err(InstallError::MissingArchive {
                tool: tool.clone(),
                path: archive_path,
            });
        }

        let span = shell.span(Status::Installing, tool);

        let dest = &release.install_dir;
        let parent = dest.parent().ok_or_else(|| {
            io_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid install directory {}", dest.display()),
            ))
        })?;
        fs::create_dir_all(parent).map_err(io_err)?;

        let tmp = tempfile::Builder::new()
            .prefix(".installing-")
            .tempdir_in(parent)
            .map_err(io_err)?;

        let file = File::open(&archive_path).map_err(io_err)?;
        archive::extract_tar_gz(BufReader::new(file), tmp.path()).map_err(extract_err)?;

        let root = single_subdir(tmp.path())
            .map_err(extract_err)?
            .unwrap_or_else(|| tmp.path().to_path_buf());

        if dest.exists() {
            fs::remove_dir_all(dest).map_err(io_err)?;
        }
        fs::rename(&root, dest).map_err(io_err)?;

        let executable = release.executable_path();
        if !executable.is_file() {
            return Err(InstallError::MissingExecutable {
                tool: tool.clone(),
                path: executable,
            });
        }

        span.finish_with_message(Status::Installed, tool);
        Ok(())
    }
}
