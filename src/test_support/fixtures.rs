//! Test fixtures for common test scenarios.
//!
//! Builders for on-disk package trees, tool archives and ports.

use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, Header};
use url::Url;

use crate::core::tool::executable_in;
use crate::core::{Port, ToolFlavour, ToolRef, ToolRelease};

/// The port an Arduino Uno shows up as on Linux.
pub fn uno_port() -> Port {
    Port::new("/dev/ttyACM0", "serial")
        .with_protocol_label("Serial Port (USB)")
        .with_identification("vid", "0x2341")
        .with_identification("pid", "0x0043")
}

/// A port nothing in the catalog matches.
pub fn unknown_port(address: &str) -> Port {
    Port::new(address, "serial")
        .with_protocol_label("Serial Port")
        .with_identification("vid", "0xffff")
        .with_identification("pid", "0xffff")
}

/// A network port without identification properties.
pub fn network_port(address: &str) -> Port {
    Port::new(address, "network").with_protocol_label("Network Port")
}

/// Write `packages/<packager>/hardware/<arch>/<version>/platform.toml`.
///
/// Returns the platform directory.
pub fn write_platform(
    packages: &Path,
    packager: &str,
    arch: &str,
    version: &str,
    manifest: &str,
) -> PathBuf {
    let dir = packages
        .join(packager)
        .join("hardware")
        .join(arch)
        .join(version);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("platform.toml"), manifest).unwrap();
    dir
}

/// Install a tool whose executable (named after the tool) is `script`.
///
/// Returns the install directory.
pub fn install_tool(
    packages: &Path,
    packager: &str,
    tool: &str,
    version: &str,
    script: &str,
) -> PathBuf {
    let dir = packages
        .join(packager)
        .join("tools")
        .join(tool)
        .join(version);
    std::fs::create_dir_all(&dir).unwrap();

    let exe = executable_in(&dir, tool);
    std::fs::write(&exe, script).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    dir
}

/// A gzip-compressed tarball of `(path, contents, mode)` entries.
pub fn tar_gz(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let mut data = Vec::new();
    {
        let encoder = GzEncoder::new(&mut data, Compression::default());
        let mut builder = Builder::new(encoder);

        for (path, contents, mode) in entries {
            let mut header = Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(contents.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append(&header, *contents).unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap();
    }
    data
}

/// A release of `tool` installed below `packages`, downloadable from `url`
/// for the running host only.
pub fn host_release(packages: &Path, tool: ToolRef, url: &str, sha256: Option<String>) -> ToolRelease {
    let install_dir = packages
        .join(tool.packager())
        .join("tools")
        .join(tool.name())
        .join(tool.version().to_string());

    ToolRelease::new(tool, install_dir).with_flavours(vec![ToolFlavour {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        url: Url::parse(url).unwrap(),
        sha256,
        size: None,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_install_tool_is_executable() {
        let tmp = TempDir::new().unwrap();
        let dir = install_tool(tmp.path(), "arduino", "mdns-discovery", "1.0.0", "#!/bin/sh\n");
        assert!(executable_in(&dir, "mdns-discovery").is_file());
    }

    #[test]
    fn test_uno_port() {
        let port = uno_port();
        assert_eq!(port.identification_prefs.len(), 2);
        assert_eq!(port.protocol, "serial");
    }
}
