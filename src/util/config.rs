//! Configuration file support for Porthole.
//!
//! The configuration lives in `config.toml` inside the data directory:
//!
//! ```toml
//! [board_list]
//! timeout = "2s"
//!
//! [network]
//! download_timeout = 300
//! tools_mirror = "https://mirror.example.com/tools/"
//! ```
//!
//! Every setting is optional. Command-line flags take precedence.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::util::fs;

/// Timeout used by `board list` when neither the flag nor the config sets one.
pub const DEFAULT_LIST_TIMEOUT: &str = "1s";

const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Porthole configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `board list` settings
    pub board_list: BoardListConfig,

    /// Network settings
    pub network: NetConfig,
}

/// Settings for board discovery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardListConfig {
    /// Default per-discovery timeout, e.g. `"1s"`
    pub timeout: Option<String>,
}

/// Network-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Tool download timeout in seconds
    pub download_timeout: Option<u64>,

    /// Base URL replacing the default download host for builtin tools
    pub tools_mirror: Option<Url>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;

        Self::parse(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from TOML content.
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// The timeout string `board list` should use when no flag is given.
    pub fn list_timeout(&self) -> &str {
        self.board_list
            .timeout
            .as_deref()
            .unwrap_or(DEFAULT_LIST_TIMEOUT)
    }

    /// Timeout applied to tool downloads.
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(
            self.network
                .download_timeout
                .unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        )
    }
}
