//! Greedy sentence-merge chunking (the default strategy).

use super::{
    apply_overlap, finalize_times, split_time_and_text, Chunk, Chunker, ChunkingConfig, RawChunk,
};
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

/// Sentence-merge chunker.
///
/// Splits the marked text on sentence punctuation, then greedily merges
/// consecutive sentences while the merged marked length stays within the
/// budget left after overlap.
pub struct SentenceMergeChunker;

impl SentenceMergeChunker {
    pub fn new() -> Self {
        Self
    }

    /// Split marked text into sentences on `[.!?]` followed by whitespace.
    /// The terminating punctuation stays with its sentence.
    fn split_sentences(text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            current.push(c);

            if matches!(c, '.' | '!' | '?') {
                // Consume trailing punctuation runs like "?!".
                while let Some(&next) = chars.peek() {
                    if matches!(next, '.' | '!' | '?') {
                        current.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }

                if chars.peek().map(|n| n.is_whitespace()).unwrap_or(true) {
                    let sentence = current.trim().to_string();
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                    current.clear();
                }
            }
        }

        let tail = current.trim().to_string();
        if !tail.is_empty() {
            sentences.push(tail);
        }

        sentences
    }

    /// Greedily merge marked sentences into chunks of at most `budget`
    /// marked characters, then resolve each chunk's anchor time.
    fn merge(sentences: Vec<String>, budget: usize) -> Vec<RawChunk> {
        let mut raw_chunks = Vec::new();
        let mut current = String::new();

        for sentence in sentences {
            let next_len = sentence.chars().count();
            let current_len = current.chars().count();

            if !current.is_empty() && current_len + next_len > budget {
                raw_chunks.push(split_time_and_text(&current));
                current.clear();
            }

            if current.is_empty() {
                current = sentence;
            } else {
                current.push(' ');
                current.push_str(&sentence);
            }
        }

        if !current.is_empty() {
            raw_chunks.push(split_time_and_text(&current));
        }

        raw_chunks
    }
}

impl Default for SentenceMergeChunker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Chunker for SentenceMergeChunker {
    async fn chunk(&mut self, marked_text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
        let sentences = Self::split_sentences(marked_text);
        debug!("Split transcript into {} sentences", sentences.len());

        let raw_chunks = Self::merge(sentences, config.merge_budget());
        let mut chunks = finalize_times(raw_chunks);

        apply_overlap(&mut chunks, config.chunk_overlap_length);

        debug!("Produced {} chunks", chunks.len());
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_one_sentence_per_chunk_when_budget_is_tight() {
        let mut chunker = SentenceMergeChunker::new();
        let config = ChunkingConfig {
            chunk_max_length: 5,
            chunk_overlap_length: 0,
        };

        let chunks = chunker
            .chunk("{0.0} A. {1.0} B. {2.0} C. {3.0} D.", &config)
            .await
            .unwrap();

        assert_eq!(chunks.len(), 4);
        let expected = [(0.0, "A."), (1.0, "B."), (2.0, "C."), (3.0, "D.")];
        for (chunk, (time, text)) in chunks.iter().zip(expected) {
            assert_eq!(chunk.time, time);
            assert_eq!(chunk.text, text);
            assert_eq!(chunk.length, 2);
        }
    }

    #[tokio::test]
    async fn test_merges_within_budget() {
        let mut chunker = SentenceMergeChunker::new();
        let config = ChunkingConfig {
            chunk_max_length: 100,
            chunk_overlap_length: 0,
        };

        let chunks = chunker
            .chunk("{0.0} First sentence. {5.0} Second sentence.", &config)
            .await
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].time, 0.0);
        assert_eq!(chunks[0].text, "First sentence. Second sentence.");
    }

    #[tokio::test]
    async fn test_chunk_inherits_first_available_time() {
        let mut chunker = SentenceMergeChunker::new();
        let config = ChunkingConfig {
            chunk_max_length: 100,
            chunk_overlap_length: 0,
        };

        // The first sentence carries no timestamp; the chunk anchors on
        // the next sentence's token.
        let chunks = chunker
            .chunk("Intro words here. {7.5} Timed sentence.", &config)
            .await
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].time, 7.5);
    }

    #[tokio::test]
    async fn test_times_are_monotone() {
        let mut chunker = SentenceMergeChunker::new();
        let config = ChunkingConfig {
            chunk_max_length: 12,
            chunk_overlap_length: 0,
        };

        let chunks = chunker
            .chunk("{0.0} Aa. {4.0} Bb. {9.0} Cc. {14.0} Dd.", &config)
            .await
            .unwrap();

        for pair in chunks.windows(2) {
            assert!(pair[1].time >= pair[0].time);
        }
    }

    #[tokio::test]
    async fn test_no_punctuation_yields_single_chunk() {
        let mut chunker = SentenceMergeChunker::new();
        let config = ChunkingConfig {
            chunk_max_length: 10,
            chunk_overlap_length: 0,
        };

        let chunks = chunker
            .chunk("{0.0} words without any sentence punctuation at all", &config)
            .await
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].time, 0.0);
    }

    #[tokio::test]
    async fn test_max_equals_overlap_terminates() {
        let mut chunker = SentenceMergeChunker::new();
        let config = ChunkingConfig {
            chunk_max_length: 50,
            chunk_overlap_length: 50,
        };

        // Budget is zero; every sentence becomes its own chunk and the
        // merge still terminates.
        let chunks = chunker
            .chunk("{0.0} One. {1.0} Two. {2.0} Three.", &config)
            .await
            .unwrap();

        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_split_sentences_keeps_punctuation_runs() {
        let sentences =
            SentenceMergeChunker::split_sentences("Really?! Yes. And then some trailing");
        assert_eq!(sentences, vec!["Really?!", "Yes.", "And then some trailing"]);
    }
}
