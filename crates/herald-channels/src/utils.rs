//! Shared utilities for channel implementations.

/// Split a long message into chunks that respect a platform's character limit.
///
/// All slice boundaries are aligned to UTF-8 char boundaries to avoid panics
/// on multi-byte content (Cyrillic, CJK, emoji, etc.). Prefers splitting at
/// newline boundaries when possible.
pub fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // max_len smaller than one char — take the whole char anyway.
            end = text[start..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| start + i)
                .unwrap_or(text.len());
        }

        let break_at = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map(|i| start + i + 1)
                .unwrap_or(end)
        } else {
            end
        };
        chunks.push(&text[start..break_at]);
        start = break_at;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_message_untouched() {
        assert_eq!(split_message("hello", 4096), vec!["hello"]);
    }

    #[test]
    fn test_long_message_splits() {
        let text = "a".repeat(10_000);
        let chunks = split_message(&text, 4096);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= 4096));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_prefers_newline_boundary() {
        let text = format!("{}\n{}", "a".repeat(10), "b".repeat(10));
        let chunks = split_message(&text, 15);
        assert_eq!(chunks[0], "aaaaaaaaaa\n");
        assert_eq!(chunks[1], "bbbbbbbbbb");
    }

    #[test]
    fn test_multibyte_safe() {
        let text = "é".repeat(5000); // 2 bytes each
        let chunks = split_message(&text, 4096);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks.concat(), text);
        for chunk in chunks {
            // Would panic inside split_message if a boundary were misaligned;
            // also verify no chunk exceeds the byte limit.
            assert!(chunk.len() <= 4096);
        }
    }

    #[test]
    fn test_emoji_not_bisected() {
        let text = "🚀".repeat(2000); // 4 bytes each
        let chunks = split_message(&text, 4096);
        assert_eq!(chunks.concat(), text);
        for chunk in chunks {
            assert_eq!(chunk.chars().filter(|c| *c != '🚀').count(), 0);
        }
    }
}
