//! Parsing of the structured-operation envelope carried in model replies.
//!
//! The system prompt instructs the model to answer either in plain prose
//! (exchange finished) or with a JSON envelope requesting operations:
//!
//! ```json
//! { "status": "in_progress",
//!   "operations": [ { "type": "terminal_command", "command": "ls" } ] }
//! ```
//!
//! The envelope may arrive bare or inside a fenced ```json block. Anything
//! that does not parse as an envelope is treated as plain text.

use herald_core::ops::{CompletionStatus, Operation};
use serde::Deserialize;

/// A parsed operation request from the model.
#[derive(Debug, Deserialize)]
pub struct OperationEnvelope {
    #[serde(default = "default_status")]
    pub status: CompletionStatus,
    pub operations: Vec<Operation>,
}

fn default_status() -> CompletionStatus {
    CompletionStatus::InProgress
}

/// Extract an operation envelope from a model reply, if present.
pub fn parse_operation_envelope(text: &str) -> Option<OperationEnvelope> {
    let candidate = extract_json_candidate(text)?;
    let envelope: OperationEnvelope = serde_json::from_str(candidate).ok()?;
    if envelope.operations.is_empty() {
        return None;
    }
    Some(envelope)
}

/// Find the JSON object to try parsing: a fenced block wins over bare text.
fn extract_json_candidate(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + "```json".len()..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim());
        }
    }
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            let inner = rest[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    None
}
