//! Core data types: ports, detected boards and tools.

pub mod board;
pub mod port;
pub mod tool;

pub use board::{BoardCandidate, DetectedPort, DetectedPorts};
pub use port::{Port, Properties, SERIAL_PROTOCOL};
pub use tool::{ToolFlavour, ToolRef, ToolRelease};
