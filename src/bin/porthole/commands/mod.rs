//! Command implementations

pub mod board;
pub mod completions;
