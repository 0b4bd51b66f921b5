//! Character-level text helpers
//!
//! All length limits in the pipeline count Unicode scalar values, never
//! bytes, so multi-byte scripts are cut at character boundaries.

/// Prefix of `text` holding at most `max_chars` characters
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hi", 10), "hi");
        assert_eq!(truncate_chars("", 5), "");
        assert_eq!(truncate_chars("giải thích", 4), "giải");
    }

    #[test]
    fn test_char_len_counts_scalars() {
        assert_eq!(char_len("chi tiết"), 8);
    }
}
