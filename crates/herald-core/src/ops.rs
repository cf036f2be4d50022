//! Structured operations requested by the completion provider and their results.

use serde::{Deserialize, Serialize};

/// A single side-effecting action requested by the completion provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    TerminalCommand {
        command: String,
    },
    WriteFile {
        path: String,
        content: String,
    },
    ReadFile {
        path: String,
    },
    BrowserAction {
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

impl Operation {
    /// The wire tag for this operation kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TerminalCommand { .. } => "terminal_command",
            Self::WriteFile { .. } => "write_file",
            Self::ReadFile { .. } => "read_file",
            Self::BrowserAction { .. } => "browser_action",
        }
    }
}

/// Result of executing one operation in the remote sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub operation_type: String,
    pub success: bool,
    /// Command stdout/stderr or action result, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// File content for read operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Whether the provider considers the exchange finished after this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Complete,
    InProgress,
}

/// One completion round from the provider.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Natural-language reply text.
    pub text: String,
    /// Operations the provider wants executed before it can finish.
    pub operations: Vec<Operation>,
    pub status: CompletionStatus,
    pub tokens_used: Option<u64>,
    pub model: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_tagged_serde() {
        let op = Operation::WriteFile {
            path: "hello.py".into(),
            content: "print('Hello World')".into(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "write_file");
        assert_eq!(json["path"], "hello.py");

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_terminal_command_parse() {
        let op: Operation =
            serde_json::from_str(r#"{"type":"terminal_command","command":"python3 hello.py"}"#)
                .unwrap();
        assert_eq!(op.kind(), "terminal_command");
    }

    #[test]
    fn test_browser_action_optional_fields() {
        let op: Operation =
            serde_json::from_str(r#"{"type":"browser_action","action":"navigate","url":"https://example.com"}"#)
                .unwrap();
        match op {
            Operation::BrowserAction {
                action,
                url,
                selector,
                text,
            } => {
                assert_eq!(action, "navigate");
                assert_eq!(url.as_deref(), Some("https://example.com"));
                assert!(selector.is_none());
                assert!(text.is_none());
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn test_completion_status_serde() {
        assert_eq!(
            serde_json::to_string(&CompletionStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        let status: CompletionStatus = serde_json::from_str("\"complete\"").unwrap();
        assert_eq!(status, CompletionStatus::Complete);
    }
}
