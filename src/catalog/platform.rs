//! `platform.toml` manifests of installed hardware platforms.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::Properties;
use crate::util::fs;

/// File name of a platform manifest.
pub const PLATFORM_MANIFEST: &str = "platform.toml";

/// Parsed `platform.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformManifest {
    #[serde(default)]
    pub platform: PlatformInfo,

    /// Discoveries the platform needs, keyed by name
    #[serde(default)]
    pub discovery: BTreeMap<String, DiscoveryDecl>,

    #[serde(default, rename = "board")]
    pub boards: Vec<BoardDecl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformInfo {
    #[serde(default)]
    pub name: Option<String>,
}

/// A `[discovery.<name>]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryDecl {
    /// Command line, possibly containing `{runtime.*}` placeholders
    pub pattern: Option<String>,
}

/// A `[[board]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardDecl {
    pub id: String,
    pub name: String,

    /// Identification properties (`vid.0`, `pid.0`, ...)
    #[serde(default)]
    pub properties: Properties,
}

impl PlatformManifest {
    /// Parse manifest text.
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse platform manifest")
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents).with_context(|| format!("invalid manifest {}", path.display()))
    }
}

/// A platform found at `packages/<packager>/hardware/<arch>/<version>`.
#[derive(Debug, Clone)]
pub struct InstalledPlatform {
    pub packager: String,
    pub arch: String,
    pub version: String,

    /// Directory holding `platform.toml`
    pub dir: PathBuf,

    pub manifest: PlatformManifest,
}

impl InstalledPlatform {
    /// `packager:arch`, e.g. `arduino:avr`.
    pub fn id(&self) -> String {
        format!("{}:{}", self.packager, self.arch)
    }

    /// FQBN of one of this platform's boards.
    pub fn fqbn(&self, board: &BoardDecl) -> String {
        format!("{}:{}:{}", self.packager, self.arch, board.id)
    }

    pub fn display_name(&self) -> String {
        self.manifest
            .platform
            .name
            .clone()
            .unwrap_or_else(|| self.id())
    }
}
