//! Global context for Porthole operations.
//!
//! Provides centralized access to configuration and the data directory,
//! which holds installed hardware packages, tools and the download cache:
//!
//! ```text
//! <data_dir>/
//! ├── config.toml
//! ├── packages/<packager>/hardware/<arch>/<version>/platform.toml
//! ├── packages/<packager>/tools/<tool>/<version>/
//! └── staging/                   # downloaded archives
//! ```

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};

use crate::util::config::Config;

const CONFIG_FILE: &str = "config.toml";

/// Project directories for Porthole
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("dev", "porthole", "porthole"));

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Root of all Porthole data
    data_dir: PathBuf,

    /// Loaded configuration
    config: Config,
}

impl GlobalContext {
    /// Create a context, using `data_dir` when given instead of the default.
    pub fn with_data_dir(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        let config = Config::load_or_default(&data_dir.join(CONFIG_FILE));

        Ok(GlobalContext { data_dir, config })
    }

    /// Get the data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    /// Get the directory holding installed packages.
    pub fn packages_dir(&self) -> PathBuf {
        self.data_dir.join("packages")
    }

    /// Get the directory where downloaded archives are kept.
    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir.join("staging")
    }
}

fn default_data_dir() -> Result<PathBuf> {
    if let Some(dirs) = PROJECT_DIRS.as_ref() {
        return Ok(dirs.data_dir().to_path_buf());
    }

    // Fallback to ~/.porthole
    BaseDirs::new()
        .map(|b| b.home_dir().join(".porthole"))
        .context("could not determine a data directory; set PORTHOLE_DATA_DIR")
}
