//! Utility functions for text handling

use crate::types::TextFlags;

/// Characters collapsed by `NORMALIZE`. Non-breaking spaces are content.
const COLLAPSIBLE: [char; 6] = [' ', '\t', '\n', '\r', '\x0B', '\x0C'];

/// Characters stripped from both ends by `TRIM` and `NORMALIZE`
const TRIMMABLE: [char; 6] = [' ', '\t', '\n', '\r', '\0', '\x0B'];

/// Replace every ASCII whitespace run with a single space (no trimming)
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;

    for c in text.chars() {
        if COLLAPSIBLE.contains(&c) {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }

    out
}

/// Apply `text()` flags to raw text content
///
/// `NORMALIZE` collapses first and then trims. `TRIM` alone only trims.
pub fn apply_text_flags(text: String, flags: TextFlags) -> String {
    if flags.contains(TextFlags::NORMALIZE) {
        return collapse_whitespace(&text).trim_matches(&TRIMMABLE[..]).to_string();
    }
    if flags.contains(TextFlags::TRIM) {
        return text.trim_matches(&TRIMMABLE[..]).to_string();
    }
    text
}

/// Cap text length for log output, on a char boundary
pub fn cap_text_length(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "  a\n\tb   c \r\n";

    #[test]
    fn test_cap_text_length() {
        assert_eq!(cap_text_length("hello", 10), "hello");
        assert_eq!(cap_text_length("hello world", 5), "hello...");
        assert_eq!(cap_text_length("héllo", 2), "hé...");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace(SAMPLE), " a b c ");
        assert_eq!(collapse_whitespace("plain"), "plain");
    }

    #[test]
    fn test_apply_text_flags() {
        assert_eq!(apply_text_flags(SAMPLE.to_string(), TextFlags::NORMALIZE), "a b c");
        assert_eq!(apply_text_flags(SAMPLE.to_string(), TextFlags::TRIM), "a\n\tb   c");
        assert_eq!(apply_text_flags(SAMPLE.to_string(), TextFlags::NONE), SAMPLE);
        assert_eq!(
            apply_text_flags(SAMPLE.to_string(), TextFlags::TRIM | TextFlags::NORMALIZE),
            "a b c"
        );
    }

    #[test]
    fn test_non_breaking_space_is_content() {
        let padded = "\u{00A0}x\u{00A0}".to_string();
        assert_eq!(apply_text_flags(padded.clone(), TextFlags::TRIM), padded);
        assert_eq!(apply_text_flags(padded.clone(), TextFlags::NORMALIZE), padded);
        assert_eq!(collapse_whitespace("a\u{00A0}\u{00A0}b"), "a\u{00A0}\u{00A0}b");
    }

    #[test]
    fn test_nul_and_vertical_tab_are_trimmed() {
        assert_eq!(apply_text_flags("\0y\0".to_string(), TextFlags::TRIM), "y");
        assert_eq!(apply_text_flags("\x0B y \0".to_string(), TextFlags::NORMALIZE), "y");
        assert_eq!(collapse_whitespace("a\x0C\x0Bb"), "a b");
    }
}
