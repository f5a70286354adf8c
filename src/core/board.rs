//! Detected ports and the boards they may belong to.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::core::port::{Port, SERIAL_PROTOCOL};

/// A board definition that matches a port's identification properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardCandidate {
    /// Display name, e.g. `Arduino Uno`
    pub name: String,

    /// Fully qualified board name, e.g. `arduino:avr:uno`
    pub fqbn: String,
}

impl BoardCandidate {
    /// Create a new candidate.
    pub fn new(name: impl Into<String>, fqbn: impl Into<String>) -> Self {
        BoardCandidate {
            name: name.into(),
            fqbn: fqbn.into(),
        }
    }
}

/// A port together with every board it could be.
///
/// An empty `boards` list means the board is unknown. Several entries mean
/// the hardware signature is ambiguous; none of them is preferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedPort {
    pub address: String,
    pub protocol: String,
    pub protocol_label: String,
    pub boards: Vec<BoardCandidate>,
}

impl DetectedPort {
    /// Build a detected port from a discovery port and its candidates.
    pub fn new(port: &Port, boards: Vec<BoardCandidate>) -> Self {
        DetectedPort {
            address: port.address.clone(),
            protocol: port.protocol.clone(),
            protocol_label: port.protocol_label.clone(),
            boards,
        }
    }

    /// Address as shown to users.
    ///
    /// Serial ports are shown bare; other protocols get a `protocol://` prefix.
    pub fn display_address(&self) -> String {
        if self.protocol == SERIAL_PROTOCOL {
            self.address.clone()
        } else {
            format!("{}://{}", self.protocol, self.address)
        }
    }

    /// Candidates in display order: by name, then by FQBN.
    pub fn sorted_boards(&self) -> Vec<&BoardCandidate> {
        let mut boards: Vec<_> = self.boards.iter().collect();
        boards.sort_by(|a, b| compare_boards(a, b));
        boards
    }
}

/// Display ordering for ports: protocol, then address.
///
/// Ports equal on both keys compare equal; stable sorts keep them in
/// arrival order.
pub fn compare_ports(a: &DetectedPort, b: &DetectedPort) -> Ordering {
    a.protocol
        .cmp(&b.protocol)
        .then_with(|| a.address.cmp(&b.address))
}

/// Display ordering for candidates: name, then FQBN.
pub fn compare_boards(a: &BoardCandidate, b: &BoardCandidate) -> Ordering {
    a.name.cmp(&b.name).then_with(|| a.fqbn.cmp(&b.fqbn))
}

/// Every port found in one run, across all discoveries.
///
/// Order is arrival order; sorting is only applied when rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedPorts {
    pub ports: Vec<DetectedPort>,
}

impl DetectedPorts {
    /// Create an empty collection.
    pub fn new() -> Self {
        DetectedPorts { ports: Vec::new() }
    }

    /// Append a port.
    pub fn push(&mut self, port: DetectedPort) {
        self.ports.push(port);
    }

    /// Number of ports.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Whether no port was found.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Iterate in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &DetectedPort> {
        self.ports.iter()
    }

    /// Ports in display order, leaving the collection untouched.
    pub fn sorted(&self) -> Vec<&DetectedPort> {
        let mut ports: Vec<_> = self.ports.iter().collect();
        ports.sort_by(|a, b| compare_ports(a, b));
        ports
    }
}

impl Extend<DetectedPort> for DetectedPorts {
    fn extend<T: IntoIterator<Item = DetectedPort>>(&mut self, iter: T) {
        self.ports.extend(iter);
    }
}
