//! Timestamped transcript handling.
//!
//! A raw transcript is a sequence of `(start_seconds, text)` items. For
//! refinement and chunking it is carried as a single string with inline
//! curly-brace timestamp markers: `{12.34} some words {15.1} more words`.

mod refiner;

pub use refiner::TranscriptRefiner;

use crate::media::TranscriptItem;
use regex::Regex;
use std::sync::OnceLock;

/// Regex matching a curly-brace timestamp token.
pub fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^{}]*)\}").expect("Invalid regex"))
}

/// Concatenate transcript items into marker form:
/// each item prefixed with its `{start_seconds}` token.
pub fn to_marked_text(items: &[TranscriptItem]) -> String {
    items
        .iter()
        .map(|item| format!("{{{}}} {}", item.start_seconds, item.text))
        .collect::<Vec<_>>()
        .join(" ")
}

/// All timestamp tokens of a marked text, in order.
pub fn timestamp_tokens(text: &str) -> Vec<String> {
    timestamp_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Strip all timestamp tokens, collapsing the leftover whitespace.
pub fn strip_timestamps(text: &str) -> String {
    let stripped = timestamp_regex().replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split marked text into segments of at most `max_length` characters
/// without splitting inside a word.
pub fn split_segments(text: &str, max_length: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        if rest.chars().count() <= max_length {
            segments.push(rest.to_string());
            break;
        }

        // Byte offset of the max_length-th character.
        let cut = rest
            .char_indices()
            .nth(max_length)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        // Back off to the last whitespace so no word is split.
        let boundary = rest[..cut].rfind(char::is_whitespace).unwrap_or(cut);
        let boundary = if boundary == 0 { cut } else { boundary };

        segments.push(rest[..boundary].trim_end().to_string());
        rest = rest[boundary..].trim_start();
    }

    segments.retain(|s| !s.is_empty());
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::TranscriptItem;

    fn items() -> Vec<TranscriptItem> {
        vec![
            TranscriptItem {
                start_seconds: 0.0,
                text: "hello world".to_string(),
            },
            TranscriptItem {
                start_seconds: 4.2,
                text: "second item".to_string(),
            },
        ]
    }

    #[test]
    fn test_to_marked_text() {
        assert_eq!(to_marked_text(&items()), "{0} hello world {4.2} second item");
    }

    #[test]
    fn test_strip_timestamps() {
        let marked = to_marked_text(&items());
        assert_eq!(strip_timestamps(&marked), "hello world second item");
    }

    #[test]
    fn test_split_segments_preserves_token_order() {
        let marked = to_marked_text(&items());
        let segments = split_segments(&marked, 20);

        let rejoined = segments.join(" ");
        assert_eq!(timestamp_tokens(&rejoined), timestamp_tokens(&marked));
    }

    #[test]
    fn test_split_segments_respects_word_boundaries() {
        let text = "alpha beta gamma delta epsilon";
        for segment in split_segments(text, 12) {
            assert!(segment.chars().count() <= 12);
            assert!(!segment.starts_with(' ') && !segment.ends_with(' '));
        }
        assert_eq!(
            split_segments(text, 12).join(" "),
            "alpha beta gamma delta epsilon"
        );
    }

    #[test]
    fn test_split_segments_short_input() {
        assert_eq!(split_segments("tiny", 100), vec!["tiny".to_string()]);
        assert!(split_segments("", 100).is_empty());
    }
}
