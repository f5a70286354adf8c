//! The hardware catalog: installed platforms, their boards and discoveries,
//! and installed tools.
//!
//! Everything is read from the packages directory:
//!
//! ```text
//! packages/<packager>/hardware/<arch>/<version>/platform.toml
//! packages/<packager>/tools/<tool>/<version>/
//! ```

pub mod builtin;
pub mod identify;
pub mod platform;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::{Captures, Regex};
use semver::Version;
use url::Url;
use walkdir::WalkDir;

use crate::core::{BoardCandidate, Properties, ToolRef, ToolRelease};
use crate::util::process::split_quoted;

pub use identify::{identify, BoardDefinition};
pub use platform::{InstalledPlatform, PlatformManifest, PLATFORM_MANIFEST};

/// Read access to installed hardware definitions.
pub trait Catalog {
    /// Command lines of every discovery declared by installed platforms.
    fn declared_discoveries(&self) -> BTreeMap<String, Vec<String>>;

    /// Boards whose identification properties match `attrs`, in catalog order.
    fn identify_board(&self, attrs: &Properties) -> Vec<BoardCandidate>;

    /// Re-read the catalog from its source.
    fn reload(&mut self) -> Result<()>;

    /// Resolve a tool release, installed or (for builtin tools) installable.
    fn tool_release(&self, tool: &ToolRef) -> Option<ToolRelease>;
}

static RUNTIME_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{runtime\.(?:tools\.([A-Za-z0-9_.\-]+?)\.path|platform\.path)\}")
        .expect("placeholder pattern is valid")
});

/// A catalog read from a packages directory.
#[derive(Debug, Clone)]
pub struct HardwareCatalog {
    packages_dir: PathBuf,
    tools_mirror: Option<Url>,
    platforms: Vec<InstalledPlatform>,
    boards: Vec<BoardDefinition>,
    /// `(packager, tool)` to installed versions
    tools: BTreeMap<(String, String), BTreeMap<Version, PathBuf>>,
}

impl HardwareCatalog {
    /// Load every platform and tool below `packages_dir`.
    ///
    /// A missing directory is an empty catalog.
    pub fn load(packages_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut catalog = HardwareCatalog {
            packages_dir: packages_dir.into(),
            tools_mirror: None,
            platforms: Vec::new(),
            boards: Vec::new(),
            tools: BTreeMap::new(),
        };
        catalog.scan()?;
        Ok(catalog)
    }

    /// Download builtin tools from `mirror` instead of the default host.
    pub fn with_tools_mirror(mut self, mirror: Option<Url>) -> Self {
        self.tools_mirror = mirror;
        self
    }

    pub fn packages_dir(&self) -> &Path {
        &self.packages_dir
    }

    pub fn platforms(&self) -> &[InstalledPlatform] {
        &self.platforms
    }

    pub fn boards(&self) -> &[BoardDefinition] {
        &self.boards
    }

    /// Newest installed version of a tool.
    pub fn installed_tool(&self, packager: &str, name: &str) -> Option<(&Version, &Path)> {
        self.tools
            .get(&(packager.to_string(), name.to_string()))
            .and_then(|versions| versions.iter().next_back())
            .map(|(version, dir)| (version, dir.as_path()))
    }

    fn scan(&mut self) -> Result<()> {
        self.platforms.clear();
        self.boards.clear();
        self.tools.clear();

        if !self.packages_dir.is_dir() {
            tracing::debug!(
                "No packages directory at {}",
                self.packages_dir.display()
            );
            return Ok(());
        }

        for path in self.walk(5, |rel| rel[1] == "hardware" && rel[4] == PLATFORM_MANIFEST) {
            let rel = relative_components(&self.packages_dir, &path);
            let manifest = PlatformManifest::load(&path)?;
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

            let platform = InstalledPlatform {
                packager: rel[0].clone(),
                arch: rel[2].clone(),
                version: rel[3].clone(),
                dir,
                manifest,
            };
            tracing::debug!(
                "Loaded platform {} {} ({} boards)",
                platform.display_name(),
                platform.version,
                platform.manifest.boards.len()
            );

            for board in &platform.manifest.boards {
                self.boards.push(BoardDefinition::new(
                    &board.name,
                    platform.fqbn(board),
                    board.properties.clone(),
                ));
            }
            self.platforms.push(platform);
        }

        for path in self.walk(4, |rel| rel[1] == "tools") {
            if !path.is_dir() {
                continue;
            }
            let rel = relative_components(&self.packages_dir, &path);
            let version = match Version::parse(&rel[3]) {
                Ok(version) => version,
                Err(e) => {
                    tracing::warn!("Ignoring tool at {}: {}", path.display(), e);
                    continue;
                }
            };
            self.tools
                .entry((rel[0].clone(), rel[2].clone()))
                .or_default()
                .insert(version, path);
        }

        Ok(())
    }

    /// Paths exactly `depth` levels below the packages directory, sorted,
    /// whose relative components satisfy `filter`.
    fn walk(&self, depth: usize, filter: impl Fn(&[String]) -> bool) -> Vec<PathBuf> {
        WalkDir::new(&self.packages_dir)
            .min_depth(depth)
            .max_depth(depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|path| {
                let rel = relative_components(&self.packages_dir, path);
                rel.len() == depth && filter(&rel)
            })
            .collect()
    }

    /// Directory of the newest installed `tool`, preferring `packager`.
    fn resolve_tool_path(&self, packager: &str, tool: &str) -> Option<&Path> {
        if let Some((_, dir)) = self.installed_tool(packager, tool) {
            return Some(dir);
        }

        self.tools
            .iter()
            .filter(|((_, name), _)| name == tool)
            .filter_map(|(_, versions)| versions.iter().next_back())
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, dir)| dir.as_path())
    }

    /// Expand `{runtime.*}` placeholders of a discovery pattern.
    fn expand_pattern(&self, platform: &InstalledPlatform, pattern: &str) -> String {
        RUNTIME_PLACEHOLDER
            .replace_all(pattern, |caps: &Captures| {
                let resolved = match caps.get(1) {
                    Some(tool) => self.resolve_tool_path(&platform.packager, tool.as_str()),
                    None => Some(platform.dir.as_path()),
                };
                match resolved {
                    Some(path) => path.display().to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

impl Catalog for HardwareCatalog {
    fn declared_discoveries(&self) -> BTreeMap<String, Vec<String>> {
        let mut discoveries = BTreeMap::new();

        for platform in &self.platforms {
            for (name, decl) in &platform.manifest.discovery {
                let Some(pattern) = decl.pattern.as_deref() else {
                    tracing::warn!(
                        "Discovery `{}` of {} has no pattern; skipping",
                        name,
                        platform.display_name()
                    );
                    continue;
                };

                let cmdline = self.expand_pattern(platform, pattern);
                match split_quoted(&cmdline) {
                    Ok(argv) if !argv.is_empty() => {
                        discoveries.insert(name.clone(), argv);
                    }
                    Ok(_) => tracing::warn!(
                        "Discovery `{}` of {} has an empty pattern; skipping",
                        name,
                        platform.display_name()
                    ),
                    Err(e) => tracing::warn!(
                        "Discovery `{}` of {} has an invalid pattern: {}",
                        name,
                        platform.display_name(),
                        e
                    ),
                }
            }
        }

        discoveries
    }

    fn identify_board(&self, attrs: &Properties) -> Vec<BoardCandidate> {
        identify(&self.boards, attrs)
    }

    fn reload(&mut self) -> Result<()> {
        tracing::debug!("Reloading catalog from {}", self.packages_dir.display());
        self.scan()
    }

    fn tool_release(&self, tool: &ToolRef) -> Option<ToolRelease> {
        if builtin::is_builtin(tool) {
            return match builtin::release(tool, &self.packages_dir, self.tools_mirror.as_ref()) {
                Ok(release) => Some(release),
                Err(e) => {
                    tracing::warn!("{:#}", e);
                    None
                }
            };
        }

        self.tools
            .get(&(tool.packager().to_string(), tool.name().to_string()))
            .and_then(|versions| versions.get(tool.version()))
            .map(|dir| ToolRelease::new(tool.clone(), dir))
    }
}

fn relative_components(base: &Path, path: &Path) -> Vec<String> {
    path.strip_prefix(base)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}
