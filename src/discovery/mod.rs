//! Discoveries: independent sources of ports.
//!
//! Every discovery goes through the same lifecycle:
//!
//! ```text
//! Created --start()--> Started --close()--> Closed
//!                        |  ^
//!                        list(timeout)
//! ```
//!
//! `list` may be called any number of times while started. A listing that
//! times out leaves the discovery started. `close` releases the underlying
//! process and is a no-op when called again or before `start`.

pub mod pluggable;
pub mod registry;

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::core::Port;

pub use pluggable::PluggableDiscovery;
pub use registry::DiscoveryRegistry;

/// A source of ports with an explicit start/list/close lifecycle.
pub trait Discovery: Send {
    /// The name the discovery is registered under.
    fn name(&self) -> &str;

    /// Launch the discovery.
    fn start(&mut self) -> Result<(), DiscoveryError>;

    /// Snapshot the ports currently visible, waiting at most `timeout`.
    fn list(&mut self, timeout: Duration) -> Result<Vec<Port>, DiscoveryError>;

    /// Release the discovery's resources.
    fn close(&mut self) -> Result<(), DiscoveryError>;
}

/// Lifecycle state of a discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Created,
    Started,
    Closed,
}

/// Errors raised by a single discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid command line for discovery `{name}`: {message}")]
    InvalidCommand { name: String, message: String },

    #[error("discovery `{name}` failed to start: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("discovery `{name}` is already started")]
    AlreadyStarted { name: String },

    #[error("discovery `{name}` has not been started")]
    NotStarted { name: String },

    #[error("discovery `{name}` is closed")]
    Closed { name: String },

    #[error("discovery `{name}` did not answer within {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("discovery `{name}` exited unexpectedly")]
    Exited { name: String },

    #[error("I/O error talking to discovery `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("discovery `{name}` sent an invalid reply: {message}")]
    Protocol { name: String, message: String },

    #[error("discovery `{name}` reported an error: {message}")]
    Backend { name: String, message: String },
}

impl DiscoveryError {
    /// Name of the discovery the error came from.
    pub fn discovery_name(&self) -> &str {
        match self {
            DiscoveryError::InvalidCommand { name, .. }
            | DiscoveryError::Spawn { name, .. }
            | DiscoveryError::AlreadyStarted { name }
            | DiscoveryError::NotStarted { name }
            | DiscoveryError::Closed { name }
            | DiscoveryError::Timeout { name, .. }
            | DiscoveryError::Exited { name }
            | DiscoveryError::Io { name, .. }
            | DiscoveryError::Protocol { name, .. }
            | DiscoveryError::Backend { name, .. } => name,
        }
    }

    /// Whether the discovery simply did not answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DiscoveryError::Timeout { .. })
    }
}
