//! Shared utilities

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod duration;
pub mod exit_code;
pub mod fs;
pub mod hash;
pub mod process;
pub mod shell;

pub use config::Config;
pub use context::GlobalContext;
pub use diagnostic::Diagnostic;
pub use duration::parse_duration;
pub use process::ProcessBuilder;
pub use shell::{Shell, Status};
