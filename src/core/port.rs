//! Ports reported by discoveries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Flat key/value properties, as used for port identification and board
/// definitions.
pub type Properties = BTreeMap<String, String>;

/// Protocol code used by the builtin serial discovery.
pub const SERIAL_PROTOCOL: &str = "serial";

/// A connection endpoint as reported by one discovery's `LIST` reply.
///
/// Ports are snapshots: a new set is produced by every listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    /// Address in the discovery's own namespace (`/dev/ttyACM0`, `192.168.1.5`)
    pub address: String,

    /// Human-readable label for the address
    #[serde(default)]
    pub label: String,

    /// Short protocol code (`serial`, `network`)
    #[serde(default)]
    pub protocol: String,

    /// Human-readable protocol name
    #[serde(default)]
    pub protocol_label: String,

    /// Extra properties not used for identification
    #[serde(default)]
    pub prefs: Properties,

    /// Properties matched against board definitions (e.g. `vid`, `pid`)
    #[serde(default)]
    pub identification_prefs: Properties,
}

impl Port {
    /// Create a port with the given address and protocol.
    pub fn new(address: impl Into<String>, protocol: impl Into<String>) -> Self {
        let address = address.into();
        Port {
            label: address.clone(),
            address,
            protocol: protocol.into(),
            ..Port::default()
        }
    }

    /// Set the protocol label.
    pub fn with_protocol_label(mut self, label: impl Into<String>) -> Self {
        self.protocol_label = label.into();
        self
    }

    /// Add an identification property.
    pub fn with_identification(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.identification_prefs.insert(key.into(), value.into());
        self
    }
}
