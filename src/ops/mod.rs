//! High-level operations.
//!
//! This module contains the implementation of Porthole commands.

pub mod board_list;
pub mod bootstrap;
pub mod render;

pub use board_list::{
    board_list, discover_all, BackendFailure, BoardListError, DiscoveryReport, ListOptions,
};
pub use bootstrap::{ensure_builtin_discovery, ensure_installed, BootstrapError};
pub use render::{render_json, render_table};
