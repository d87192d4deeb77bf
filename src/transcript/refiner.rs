//! LLM-based transcript refinement.
//!
//! Corrects grammar, capitalization, punctuation, and mishearings in the
//! marked transcript while preserving the curly-brace timestamp tokens.
//! Segments that fail to refine are emitted unrefined.

use super::split_segments;
use crate::config::Prompts;
use crate::error::{Result, SkueError};
use crate::openai::{create_client_with_base, RequestPacer};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Refines a marked transcript segment by segment.
pub struct TranscriptRefiner {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_segment_length: usize,
    prompts: Prompts,
    pacer: RequestPacer,
}

impl TranscriptRefiner {
    pub fn new(
        model: &str,
        max_segment_length: usize,
        prompts: Prompts,
        api_base: Option<&str>,
        requests_per_pause: u32,
        pause_seconds: u64,
    ) -> Self {
        Self {
            client: create_client_with_base(api_base),
            model: model.to_string(),
            max_segment_length,
            prompts,
            pacer: RequestPacer::new(requests_per_pause, pause_seconds, api_base.is_none()),
        }
    }

    /// Refine the whole marked transcript. Returns the refined text with
    /// all timestamp tokens preserved.
    pub async fn refine(&mut self, marked_text: &str) -> Result<String> {
        let segments = split_segments(marked_text, self.max_segment_length);
        info!("Refining transcript in {} segments", segments.len());

        let mut refined = Vec::with_capacity(segments.len());

        for (i, segment) in segments.iter().enumerate() {
            self.pacer.tick().await;

            match self.refine_segment(segment).await {
                Ok(text) => refined.push(text),
                Err(e) => {
                    warn!("Segment {} refinement failed, keeping raw text: {}", i, e);
                    refined.push(segment.clone());
                }
            }
        }

        Ok(refined.join(" "))
    }

    async fn refine_segment(&self, segment: &str) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("segment".to_string(), segment.to_string());

        let user_message = self
            .prompts
            .render_with_custom(&self.prompts.refine.user, &vars);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.refine.system.clone())
                .build()
                .map_err(|e| SkueError::OpenAI(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()
                .map_err(|e| SkueError::OpenAI(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.0)
            .build()
            .map_err(|e| SkueError::OpenAI(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SkueError::OpenAI(format!("Refinement request failed: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| SkueError::OpenAI("Empty refinement response".to_string()))?;

        debug!("Refined segment of {} chars", segment.len());
        Ok(content.trim().to_string())
    }
}
