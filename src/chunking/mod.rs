//! Time-anchored chunking strategies for refined transcripts.
//!
//! Both strategies consume marked transcript text (inline `{t}` tokens) and
//! produce the same output type: chunks with a numeric time anchor, visible
//! text, and character length.

mod llm;
mod sentence;

pub use llm::LlmDirectedChunker;
pub use sentence::SentenceMergeChunker;

use crate::config::Prompts;
use crate::error::Result;
use crate::transcript::{strip_timestamps, timestamp_regex};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// A time-anchored chunk of refined transcript text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Anchor time in seconds, non-decreasing within a video.
    pub time: f64,
    /// Visible chunk text (timestamp tokens stripped).
    pub text: String,
    /// Character count of `text`.
    pub length: usize,
}

/// A chunk before time resolution: the anchor may be absent or non-numeric.
#[derive(Debug, Clone)]
pub struct RawChunk {
    pub time: Option<String>,
    pub text: String,
}

/// Chunking strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Greedy sentence merging (default).
    SentenceMerge,
    /// LLM-directed logical chunking.
    LlmDirected,
}

impl std::str::FromStr for ChunkingStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sentence" | "sentence_merge" => Ok(ChunkingStrategy::SentenceMerge),
            "llm" | "llm_directed" | "detailed" => Ok(ChunkingStrategy::LlmDirected),
            _ => Err(format!("Unknown chunking strategy: {}", s)),
        }
    }
}

/// Configuration for chunking.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters (before overlap).
    pub chunk_max_length: usize,
    /// Characters of overlap prepended from the previous chunk.
    pub chunk_overlap_length: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_max_length: 550,
            chunk_overlap_length: 50,
        }
    }
}

impl ChunkingConfig {
    /// Budget available to the merge step before overlap is added.
    pub fn merge_budget(&self) -> usize {
        self.chunk_max_length
            .saturating_sub(self.chunk_overlap_length)
    }
}

/// Trait for chunking implementations.
#[async_trait]
pub trait Chunker: Send {
    /// Split marked transcript text into time-anchored chunks.
    async fn chunk(&mut self, marked_text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>>;
}

/// Create a chunker for the given strategy.
pub fn create_chunker(
    strategy: ChunkingStrategy,
    prompts: Prompts,
    model: &str,
    max_input_length_llm: usize,
    api_base: Option<&str>,
    requests_per_pause: u32,
    pause_seconds: u64,
) -> Box<dyn Chunker> {
    match strategy {
        ChunkingStrategy::SentenceMerge => Box::new(SentenceMergeChunker::new()),
        ChunkingStrategy::LlmDirected => Box::new(LlmDirectedChunker::new(
            prompts,
            model,
            max_input_length_llm,
            api_base,
            requests_per_pause,
            pause_seconds,
        )),
    }
}

fn numeric_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").expect("Invalid regex"))
}

/// Resolve chunk times: parse as float, fall back to the first numeric run,
/// impute missing times as previous + 20 s, and drop chunks that still have
/// none. Times are clamped to be non-decreasing.
pub fn finalize_times(raw_chunks: Vec<RawChunk>) -> Vec<Chunk> {
    let mut chunks = Vec::with_capacity(raw_chunks.len());
    let mut previous: Option<f64> = None;

    for raw in raw_chunks {
        let parsed = raw.time.as_deref().and_then(parse_time);

        let time = match (parsed, previous) {
            (Some(t), Some(prev)) => t.max(prev),
            (Some(t), None) => t,
            (None, Some(prev)) => prev + 20.0,
            (None, None) => continue,
        };

        previous = Some(time);
        let length = raw.text.chars().count();
        chunks.push(Chunk {
            time,
            text: raw.text,
            length,
        });
    }

    chunks
}

fn parse_time(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if let Ok(t) = trimmed.parse::<f64>() {
        return Some(t);
    }
    numeric_run_regex()
        .find(trimmed)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Extract the first timestamp token of a marked piece and strip all
/// tokens from the visible text.
pub fn split_time_and_text(marked: &str) -> RawChunk {
    let time = timestamp_regex()
        .captures(marked)
        .map(|caps| caps[1].to_string());

    RawChunk {
        time,
        text: strip_timestamps(marked),
    }
}

/// Prepend a word-aligned suffix of each chunk's predecessor.
///
/// The suffix starts `overlap` characters from the end of the previous
/// chunk's text and is truncated forward to the next space so no word is
/// split.
pub fn apply_overlap(chunks: &mut [Chunk], overlap: usize) {
    if overlap == 0 || chunks.len() < 2 {
        return;
    }

    let prefixes: Vec<Option<String>> = chunks
        .iter()
        .map(|c| overlap_suffix(&c.text, overlap))
        .collect();

    for i in (1..chunks.len()).rev() {
        if let Some(prefix) = &prefixes[i - 1] {
            chunks[i].text = format!("{} {}", prefix, chunks[i].text);
            chunks[i].length = chunks[i].text.chars().count();
        }
    }
}

/// Word-aligned suffix of at most `overlap` characters.
fn overlap_suffix(text: &str, overlap: usize) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return None;
    }

    let mut start = chars.len().saturating_sub(overlap);

    // Truncate forward to the next space when landing mid-word.
    if start > 0 && !chars[start - 1].is_whitespace() && !chars[start].is_whitespace() {
        match chars[start..].iter().position(|c| c.is_whitespace()) {
            Some(offset) => start += offset + 1,
            None => return None,
        }
    }

    while start < chars.len() && chars[start].is_whitespace() {
        start += 1;
    }

    if start >= chars.len() {
        return None;
    }

    Some(chars[start..].iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(time: Option<&str>, text: &str) -> RawChunk {
        RawChunk {
            time: time.map(|t| t.to_string()),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_finalize_times_imputation() {
        let chunks = finalize_times(vec![
            raw(Some("10.0"), "a"),
            raw(None, "b"),
            raw(None, "c"),
        ]);

        let times: Vec<f64> = chunks.iter().map(|c| c.time).collect();
        assert_eq!(times, vec![10.0, 30.0, 50.0]);
    }

    #[test]
    fn test_finalize_times_numeric_run() {
        let chunks = finalize_times(vec![raw(Some("t=12.5s"), "a")]);
        assert_eq!(chunks[0].time, 12.5);
    }

    #[test]
    fn test_finalize_times_drops_untimed_head() {
        let chunks = finalize_times(vec![raw(None, "dropped"), raw(Some("3.0"), "kept")]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "kept");
    }

    #[test]
    fn test_finalize_times_monotone() {
        let chunks = finalize_times(vec![
            raw(Some("30.0"), "a"),
            raw(Some("10.0"), "b"),
            raw(Some("45.0"), "c"),
        ]);
        let times: Vec<f64> = chunks.iter().map(|c| c.time).collect();
        assert_eq!(times, vec![30.0, 30.0, 45.0]);
    }

    #[test]
    fn test_split_time_and_text() {
        let raw = split_time_and_text("{12.3} hello {14.0} world");
        assert_eq!(raw.time.as_deref(), Some("12.3"));
        assert_eq!(raw.text, "hello world");
    }

    #[test]
    fn test_apply_overlap_word_aligned() {
        let mut chunks = vec![
            Chunk {
                time: 0.0,
                text: "the quick brown fox".to_string(),
                length: 19,
            },
            Chunk {
                time: 5.0,
                text: "jumps over".to_string(),
                length: 10,
            },
        ];

        // 7 chars back lands inside "brown", so the prefix is truncated
        // forward to the next space and only "fox" is carried over.
        apply_overlap(&mut chunks, 7);
        assert_eq!(chunks[1].text, "fox jumps over");
        assert_eq!(chunks[1].length, 14);

        chunks[1].text = "jumps over".to_string();
        chunks[1].length = 10;
        // 9 chars back lands exactly on a word boundary.
        apply_overlap(&mut chunks, 9);
        assert_eq!(chunks[1].text, "brown fox jumps over");
    }

    #[test]
    fn test_apply_overlap_zero_is_noop() {
        let mut chunks = vec![
            Chunk {
                time: 0.0,
                text: "one".to_string(),
                length: 3,
            },
            Chunk {
                time: 1.0,
                text: "two".to_string(),
                length: 3,
            },
        ];

        apply_overlap(&mut chunks, 0);
        assert_eq!(chunks[1].text, "two");
    }

    #[test]
    fn test_overlap_bound_holds() {
        let max = 20;
        let overlap = 8;
        let mut chunks = vec![
            Chunk {
                time: 0.0,
                text: "aaaa bbbb cccc".to_string(),
                length: 14,
            },
            Chunk {
                time: 1.0,
                text: "x".repeat(max - overlap),
                length: max - overlap,
            },
        ];

        apply_overlap(&mut chunks, overlap);
        assert!(chunks[1].length <= max + overlap);
    }
}
