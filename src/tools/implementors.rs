//! Implementor listing and corpus statistics handlers.

use crate::implementors::{ImplementorEntry, ImplementorSnapshot};
use crate::state::SearchState;
use rmcp::schemars;
use serde::Deserialize;
use std::fmt::Write as _;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListImplementorsRequest {
    /// Interface path as registered, e.g. "Iterator" or "core::iter::Iterator".
    /// Omit to list the known interfaces.
    #[serde(default)]
    pub interface: Option<String>,
}

/// Answer from the last snapshot delivered to the attached consumer.
pub fn handle_list_implementors(
    snapshot: &ImplementorSnapshot,
    request: ListImplementorsRequest,
) -> Result<String, String> {
    let Some(interface) = request.interface else {
        if snapshot.is_empty() {
            return Ok("No implementor records registered yet.".to_string());
        }
        let mut output = format!("Interfaces with implementors ({}):\n", snapshot.len());
        for (interface, entries) in snapshot {
            let _ = writeln!(output, "  • {} ({})", interface, entries.len());
        }
        return Ok(output);
    };

    let entries = snapshot.get(&interface).ok_or_else(|| {
        let known: Vec<&str> = snapshot.keys().map(String::as_str).take(20).collect();
        format!(
            "No implementors registered for '{}'. Known interfaces: {}",
            interface,
            if known.is_empty() {
                "none".to_string()
            } else {
                known.join(", ")
            }
        )
    })?;

    let mut output = format!("Implementors of '{}' ({}):\n", interface, entries.len());
    for entry in entries {
        output.push_str(&format_entry(entry));
    }
    Ok(output)
}

fn format_entry(entry: &ImplementorEntry) -> String {
    let mut line = format!(
        "  • {} [{}]",
        entry.implementing_type_text, entry.source_package
    );
    if !entry.generic_constraints.is_empty() {
        let _ = write!(line, " where {}", entry.generic_constraints.join(", "));
    }
    line.push('\n');
    line
}

pub fn handle_index_stats(state: &SearchState) -> Result<String, String> {
    serde_json::to_string_pretty(&state.stats()).map_err(|e| e.to_string())
}
