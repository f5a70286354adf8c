//! Porthole - discovers boards attached to the host
//!
//! This crate provides the core library functionality for Porthole:
//! running pluggable discovery processes, identifying the boards behind
//! the ports they report, and installing the tools they need.

pub mod catalog;
pub mod core;
pub mod discovery;
pub mod install;
pub mod ops;
pub mod util;

/// Test utilities and mocks for Porthole unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides mock discoveries, catalogs and installers.
#[cfg(test)]
pub mod test_support;

pub use core::{BoardCandidate, DetectedPort, DetectedPorts, Port};

pub use catalog::{Catalog, HardwareCatalog};
pub use discovery::{Discovery, DiscoveryRegistry, PluggableDiscovery};
pub use install::{Installer, ToolInstaller};
pub use util::context::GlobalContext;
