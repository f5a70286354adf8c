//! Rendering detected ports as a table or JSON.

use anyhow::{Context, Result};

use crate::core::DetectedPorts;

const HEADER: [&str; 4] = ["Port", "Type", "Board Name", "FQBN"];

/// Board name shown for ports without a matching board.
pub const UNKNOWN_BOARD: &str = "Unknown";

/// Rows of the table: one per candidate board, or a single "Unknown" row.
///
/// Ports are sorted by protocol and address, boards by name and FQBN.
/// Address and type are only shown on the first row of each port.
pub fn table_rows(ports: &DetectedPorts) -> Vec<[String; 4]> {
    let mut rows = Vec::new();

    for port in ports.sorted() {
        let mut address = port.display_address();
        let mut protocol = port.protocol_label.clone();

        let boards = port.sorted_boards();
        if boards.is_empty() {
            rows.push([address, protocol, UNKNOWN_BOARD.to_string(), String::new()]);
            continue;
        }

        for board in boards {
            rows.push([
                std::mem::take(&mut address),
                std::mem::take(&mut protocol),
                board.name.clone(),
                board.fqbn.clone(),
            ]);
        }
    }

    rows
}

/// Render ports as an aligned text table, header included.
pub fn render_table(ports: &DetectedPorts) -> String {
    let rows = table_rows(ports);

    let mut widths = HEADER.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header = HEADER.map(str::to_string);
    for row in std::iter::once(&header).chain(&rows) {
        let line = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Render ports as pretty-printed JSON, in arrival order.
pub fn render_json(ports: &DetectedPorts) -> Result<String> {
    serde_json::to_string_pretty(ports).context("failed to serialize port list")
}
