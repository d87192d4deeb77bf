//! LLM-directed chunking.
//!
//! Asks the model for logically coherent, size-balanced chunks joined by a
//! literal `%%%%` delimiter, windowing long inputs and sub-splitting
//! oversized pieces.

use super::{
    apply_overlap, finalize_times, split_time_and_text, Chunk, Chunker, ChunkingConfig, RawChunk,
};
use crate::config::Prompts;
use crate::error::{Result, SkueError};
use crate::openai::{create_client_with_base, RequestPacer};
use crate::transcript::split_segments;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Delimiter the model is asked to emit between chunks. The same literal is
/// used by the parser.
pub const CHUNK_DELIMITER: &str = "%%%%";

/// Sub-split recursion bound; beyond it an oversized piece is kept as-is.
const MAX_SUBSPLIT_DEPTH: usize = 3;

/// LLM-directed chunker.
pub struct LlmDirectedChunker {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_input_length: usize,
    prompts: Prompts,
    pacer: RequestPacer,
}

impl LlmDirectedChunker {
    pub fn new(
        prompts: Prompts,
        model: &str,
        max_input_length: usize,
        api_base: Option<&str>,
        requests_per_pause: u32,
        pause_seconds: u64,
    ) -> Self {
        Self {
            client: create_client_with_base(api_base),
            model: model.to_string(),
            max_input_length,
            prompts,
            pacer: RequestPacer::new(requests_per_pause, pause_seconds, api_base.is_none()),
        }
    }

    /// Split a model response on the chunk delimiter.
    fn parse_pieces(response: &str) -> Vec<String> {
        response
            .split(CHUNK_DELIMITER)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }

    async fn complete(&mut self, system: String, user: String) -> Result<String> {
        self.pacer.tick().await;

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| SkueError::OpenAI(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| SkueError::OpenAI(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.2)
            .build()
            .map_err(|e| SkueError::OpenAI(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SkueError::OpenAI(format!("Chunking request failed: {}", e)))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| SkueError::OpenAI("Empty chunking response".to_string()))
    }

    async fn request_split(&mut self, text: &str, budget: usize) -> Result<Vec<String>> {
        let mut vars = HashMap::new();
        vars.insert("transcript".to_string(), text.to_string());
        vars.insert("chunk_max_length".to_string(), budget.to_string());

        let system = self
            .prompts
            .render_with_custom(&self.prompts.chunking.system, &vars);
        let user = self
            .prompts
            .render_with_custom(&self.prompts.chunking.user, &vars);

        let response = self.complete(system, user).await?;
        Ok(Self::parse_pieces(&response))
    }

    async fn request_subsplit(&mut self, piece: &str, budget: usize) -> Result<Vec<String>> {
        let mut vars = HashMap::new();
        vars.insert("chunk".to_string(), piece.to_string());
        vars.insert("chunk_max_length".to_string(), budget.to_string());

        let system = self
            .prompts
            .render_with_custom(&self.prompts.chunking.system, &vars);
        let user = self
            .prompts
            .render_with_custom(&self.prompts.chunking.subsplit_user, &vars);

        let response = self.complete(system, user).await?;
        Ok(Self::parse_pieces(&response))
    }

    /// Verification pass: pieces longer than the budget are recursively
    /// sub-split and replaced in place.
    async fn verify(&mut self, pieces: Vec<String>, budget: usize) -> Result<Vec<String>> {
        let mut queue: Vec<(String, usize)> = pieces.into_iter().map(|p| (p, 0)).collect();
        let mut verified = Vec::new();

        while !queue.is_empty() {
            let mut next_queue = Vec::new();

            for (piece, depth) in queue {
                if piece.chars().count() <= budget || depth >= MAX_SUBSPLIT_DEPTH {
                    if depth >= MAX_SUBSPLIT_DEPTH {
                        warn!("Keeping oversized piece after {} sub-splits", depth);
                    }
                    verified.push(piece);
                    continue;
                }

                let parts = self.request_subsplit(&piece, budget).await?;
                if parts.len() <= 1 {
                    verified.push(piece);
                } else {
                    next_queue.extend(parts.into_iter().map(|p| (p, depth + 1)));
                }
            }

            queue = next_queue;
        }

        Ok(verified)
    }
}

#[async_trait]
impl Chunker for LlmDirectedChunker {
    async fn chunk(&mut self, marked_text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
        let budget = config.chunk_max_length;

        let mut pieces = if marked_text.chars().count() < self.max_input_length {
            self.request_split(marked_text, budget).await?
        } else {
            // Window the input and carry the last produced chunk of each
            // window as the prefix of the next, so logical units are not
            // cut at window boundaries.
            let windows = split_segments(marked_text, self.max_input_length);
            debug!("Chunking {} windows", windows.len());

            let mut collected = Vec::new();
            let mut carry = String::new();

            for window in windows {
                let input = if carry.is_empty() {
                    window
                } else {
                    format!("{} {}", carry, window)
                };

                let mut window_pieces = self.request_split(&input, budget).await?;
                carry = window_pieces.pop().unwrap_or_default();
                collected.extend(window_pieces);
            }

            if !carry.is_empty() {
                collected.push(carry);
            }

            collected
        };

        pieces = self.verify(pieces, budget).await?;
        pieces.retain(|p| p.chars().count() > 1);

        let raw_chunks: Vec<RawChunk> = pieces.iter().map(|p| split_time_and_text(p)).collect();
        let mut chunks = finalize_times(raw_chunks);

        apply_overlap(&mut chunks, config.chunk_overlap_length);

        debug!("Produced {} chunks", chunks.len());
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;

    #[test]
    fn test_parse_pieces() {
        let response = "{0.0} first part %%%% {4.0} second part %%%%  ";
        let pieces = LlmDirectedChunker::parse_pieces(response);
        assert_eq!(pieces, vec!["{0.0} first part", "{4.0} second part"]);
    }

    #[test]
    fn test_parse_pieces_without_delimiter() {
        let pieces = LlmDirectedChunker::parse_pieces("single chunk only");
        assert_eq!(pieces, vec!["single chunk only"]);
    }

    #[test]
    fn test_prompt_and_parser_use_same_delimiter() {
        let prompts = Prompts::default();
        assert!(prompts.chunking.system.contains(CHUNK_DELIMITER));
        assert!(prompts.chunking.user.contains(CHUNK_DELIMITER));
        assert!(prompts.chunking.subsplit_user.contains(CHUNK_DELIMITER));
    }
}
