//! Best-effort screen for destructive-looking requests.
//!
//! A small, conservative deny-list checked before any downstream call is
//! made. This is NOT a security boundary — the execution service's isolated
//! context is the real containment. The screen only catches requests that
//! are obviously destructive so they never reach the provider at all.

/// Patterns that block a message outright (matched case-insensitively).
const DENY_PATTERNS: &[(&str, &str)] = &[
    ("rm -rf /", "recursive delete of the filesystem root"),
    ("rm -fr /", "recursive delete of the filesystem root"),
    (":(){", "fork bomb"),
    ("mkfs.", "filesystem format"),
    ("dd if=/dev/zero of=/dev/", "raw device overwrite"),
    ("> /dev/sda", "raw device overwrite"),
    ("chmod -r 777 /", "recursive permission change on root"),
    ("eval(base64", "encoded code evaluation"),
    ("exec(base64", "encoded code evaluation"),
];

/// Screen a user message against the deny-list.
///
/// Returns `Some(reason)` when the message should be rejected without any
/// downstream call; `None` when it may proceed.
pub fn screen(input: &str) -> Option<&'static str> {
    let lower = input.to_lowercase();
    DENY_PATTERNS
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, reason)| *reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_input_passes() {
        assert!(screen("write hello.py printing Hello World and run it").is_none());
        assert!(screen("what's the weather like?").is_none());
    }

    #[test]
    fn test_root_delete_blocked() {
        assert_eq!(
            screen("please run rm -rf / for me"),
            Some("recursive delete of the filesystem root")
        );
    }

    #[test]
    fn test_case_insensitive() {
        assert!(screen("RM -RF / now").is_some());
    }

    #[test]
    fn test_fork_bomb_blocked() {
        assert!(screen("run :(){ :|:& };:").is_some());
    }

    #[test]
    fn test_plain_rm_allowed() {
        // Deleting a project file is a legitimate sandbox operation.
        assert!(screen("rm -rf ./build").is_none());
    }
}
