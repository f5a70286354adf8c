//! Making sure the builtin serial discovery is installed before listing.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use crate::catalog::builtin::{serial_discovery_ref, SERIAL_DISCOVERY_NAME};
use crate::catalog::Catalog;
use crate::core::{ToolRef, ToolRelease};
use crate::discovery::{DiscoveryError, PluggableDiscovery};
use crate::install::{InstallError, Installer};
use crate::util::shell::{Shell, Status};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("tool {tool} is not known to the catalog")]
    Unknown { tool: ToolRef },

    #[error("failed to download missing tool {tool}")]
    Download {
        tool: ToolRef,
        #[source]
        source: InstallError,
    },

    #[error("failed to install missing tool {tool}")]
    Install {
        tool: ToolRef,
        #[source]
        source: InstallError,
    },

    #[error("could not load hardware packages")]
    Reload {
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("missing tool {tool}")]
    Missing { tool: ToolRef },

    #[error("error setting up {tool}")]
    Setup {
        tool: ToolRef,
        #[source]
        source: DiscoveryError,
    },
}

/// Resolve `tool`, downloading and installing it first if needed.
///
/// A missing tool gets exactly one attempt: download, install, reload the
/// catalog and resolve again. If it is still not installed after that the
/// result is [`BootstrapError::Missing`].
pub fn ensure_installed(
    tool: &ToolRef,
    catalog: &mut dyn Catalog,
    installer: &dyn Installer,
    shell: &Arc<Shell>,
) -> Result<ToolRelease, BootstrapError> {
    let release = catalog
        .tool_release(tool)
        .ok_or_else(|| BootstrapError::Unknown { tool: tool.clone() })?;

    if installer.is_installed(&release) {
        tracing::debug!("Tool {} found at {}", tool, release.install_dir.display());
        return Ok(release);
    }

    shell.status(
        Status::Downloading,
        format!("missing tool {}", tool),
    );
    tracing::debug!("Downloading and installing missing tool: {}", tool);

    installer
        .download(&release, shell)
        .map_err(|source| BootstrapError::Download {
            tool: tool.clone(),
            source,
        })?;
    installer
        .install(&release, shell)
        .map_err(|source| BootstrapError::Install {
            tool: tool.clone(),
            source,
        })?;

    catalog
        .reload()
        .map_err(|e| BootstrapError::Reload { source: e.into() })?;

    catalog
        .tool_release(tool)
        .filter(|release| installer.is_installed(release))
        .ok_or_else(|| BootstrapError::Missing { tool: tool.clone() })
}

/// The builtin serial discovery, installed on demand.
pub fn ensure_builtin_discovery(
    catalog: &mut dyn Catalog,
    installer: &dyn Installer,
    shell: &Arc<Shell>,
) -> Result<PluggableDiscovery, BootstrapError> {
    let tool = serial_discovery_ref();
    let release = ensure_installed(&tool, catalog, installer, shell)?;
    let executable = release.executable_path();

    PluggableDiscovery::new(SERIAL_DISCOVERY_NAME, &[executable.to_string_lossy()])
        .map_err(|source| BootstrapError::Setup { tool, source })
}
