//! Tools: versioned executables shipped by a packager (discoveries, uploaders).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context};
use semver::Version;
use serde::{Deserialize, Serialize};
use url::Url;

/// Identifies one release of a tool: `packager:name@version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToolRef {
    packager: String,
    name: String,
    version: Version,
}

impl ToolRef {
    /// Create a new tool reference.
    pub fn new(packager: impl Into<String>, name: impl Into<String>, version: Version) -> Self {
        ToolRef {
            packager: packager.into(),
            name: name.into(),
            version,
        }
    }

    /// The packager owning the tool.
    pub fn packager(&self) -> &str {
        &self.packager
    }

    /// The tool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tool version.
    pub fn version(&self) -> &Version {
        &self.version
    }
}

impl fmt::Display for ToolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.packager, self.name, self.version)
    }
}

impl FromStr for ToolRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (packager, rest) = s
            .split_once(':')
            .with_context(|| format!("invalid tool reference `{}`: missing packager", s))?;
        let (name, version) = rest
            .split_once('@')
            .with_context(|| format!("invalid tool reference `{}`: missing version", s))?;

        if packager.is_empty() || name.is_empty() {
            bail!("invalid tool reference `{}`", s);
        }

        let version = Version::parse(version)
            .with_context(|| format!("invalid version in tool reference `{}`", s))?;

        Ok(ToolRef::new(packager, name, version))
    }
}

/// A downloadable archive of a tool for one host platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFlavour {
    /// Operating system as in `std::env::consts::OS`
    pub os: String,

    /// CPU architecture as in `std::env::consts::ARCH`
    pub arch: String,

    /// Download location of a `.tar.gz` archive
    pub url: Url,

    /// Expected SHA-256 of the archive, when published
    #[serde(default)]
    pub sha256: Option<String>,

    /// Expected archive size in bytes, when published
    #[serde(default)]
    pub size: Option<u64>,
}

impl ToolFlavour {
    /// File name the archive is stored under in the staging directory.
    pub fn archive_file_name(&self) -> String {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-{}.tar.gz", self.os, self.arch))
    }
}

/// A tool release as known to the catalog: where it lives once installed
/// and where it can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRelease {
    pub tool: ToolRef,

    /// Directory the tool is (or will be) installed to
    pub install_dir: PathBuf,

    /// Available downloads; empty for tools installed by other means
    pub flavours: Vec<ToolFlavour>,
}

impl ToolRelease {
    /// Create a release without download information.
    pub fn new(tool: ToolRef, install_dir: impl Into<PathBuf>) -> Self {
        ToolRelease {
            tool,
            install_dir: install_dir.into(),
            flavours: Vec::new(),
        }
    }

    /// Attach download flavours.
    pub fn with_flavours(mut self, flavours: Vec<ToolFlavour>) -> Self {
        self.flavours = flavours;
        self
    }

    /// Flavour for the given platform.
    pub fn flavour_for(&self, os: &str, arch: &str) -> Option<&ToolFlavour> {
        self.flavours.iter().find(|f| f.os == os && f.arch == arch)
    }

    /// Flavour for the running host.
    pub fn flavour_for_host(&self) -> Option<&ToolFlavour> {
        self.flavour_for(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Path of the tool's main executable (named after the tool).
    pub fn executable_path(&self) -> PathBuf {
        executable_in(&self.install_dir, self.tool.name())
    }
}

/// Path of executable `name` inside `dir`, with the platform suffix.
pub fn executable_in(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}{}", name, std::env::consts::EXE_SUFFIX))
}
