//! Compiled-in metadata for the builtin serial discovery tool.
//!
//! The tool is always known to the catalog, installed or not, so that it
//! can be bootstrapped on first use.

use std::path::Path;

use anyhow::{Context, Result};
use semver::Version;
use url::Url;

use crate::core::{ToolFlavour, ToolRef, ToolRelease};

/// Packager name reserved for tools shipped with porthole.
pub const BUILTIN_PACKAGER: &str = "builtin";

/// Name of the serial discovery tool and of its executable.
pub const SERIAL_DISCOVERY_TOOL: &str = "serial-discovery";

/// Registry name of the builtin serial discovery.
pub const SERIAL_DISCOVERY_NAME: &str = "serial";

const SERIAL_DISCOVERY_VERSION: Version = Version::new(1, 0, 0);

/// Base URL for builtin tool archives when `network.tools_mirror` is unset.
///
/// Nothing is published here yet, so installing a builtin tool needs a mirror.
pub const DEFAULT_TOOLS_BASE: &str = "https://downloads.porthole.dev/tools/";

/// Host platforms a serial-discovery archive is published for.
const HOSTS: &[(&str, &str)] = &[
    ("linux", "x86_64"),
    ("linux", "aarch64"),
    ("linux", "arm"),
    ("macos", "x86_64"),
    ("macos", "aarch64"),
    ("windows", "x86_64"),
];

/// `builtin:serial-discovery@1.0.0`
pub fn serial_discovery_ref() -> ToolRef {
    ToolRef::new(
        BUILTIN_PACKAGER,
        SERIAL_DISCOVERY_TOOL,
        SERIAL_DISCOVERY_VERSION,
    )
}

/// Whether `tool` names a builtin tool (any version).
pub fn is_builtin(tool: &ToolRef) -> bool {
    tool.packager() == BUILTIN_PACKAGER && tool.name() == SERIAL_DISCOVERY_TOOL
}

/// Download flavours of `tool` below `base`.
pub fn flavours(tool: &ToolRef, base: &Url) -> Result<Vec<ToolFlavour>> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    HOSTS
        .iter()
        .map(|(os, arch)| {
            let file = format!(
                "{name}/{version}/{name}-{version}-{os}-{arch}.tar.gz",
                name = tool.name(),
                version = tool.version(),
            );
            let url = base
                .join(&file)
                .with_context(|| format!("invalid download URL for {}", tool))?;

            Ok(ToolFlavour {
                os: os.to_string(),
                arch: arch.to_string(),
                url,
                sha256: None,
                size: None,
            })
        })
        .collect()
}

/// The release of `tool` installed under `packages_dir`, with downloads
/// from `mirror` or the default host.
pub fn release(tool: &ToolRef, packages_dir: &Path, mirror: Option<&Url>) -> Result<ToolRelease> {
    let base = match mirror {
        Some(url) => url.clone(),
        None => Url::parse(DEFAULT_TOOLS_BASE).context("invalid default tools URL")?,
    };

    let install_dir = packages_dir
        .join(tool.packager())
        .join("tools")
        .join(tool.name())
        .join(tool.version().to_string());

    Ok(ToolRelease::new(tool.clone(), install_dir).with_flavours(flavours(tool, &base)?))
}
