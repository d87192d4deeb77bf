//! Answer generation.
//!
//! Assembles the routed prompt template with the reranked context and the
//! question, then streams tokens from the selected LLM (or returns the
//! concatenated string when streaming is disabled).

use super::ContextPassage;
use crate::config::Prompts;
use crate::error::{Result, SkueError};
use crate::openai::create_client_with_base;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Sampling parameters; invalid values fall back to defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Temperature in [0, 1].
    pub temperature: f32,
    /// Nucleus sampling in [0, 1].
    pub top_p: f32,
    /// Top-k sampling, kept for providers that accept it; the
    /// OpenAI-compatible wire format carries only temperature and top_p.
    pub top_k: i64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.9,
            top_k: 40,
        }
    }
}

impl GenerationParams {
    /// Replace out-of-range values with the defaults (0.8 / 0.9 / 40).
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        Self {
            temperature: if (0.0..=1.0).contains(&self.temperature) {
                self.temperature
            } else {
                defaults.temperature
            },
            top_p: if (0.0..=1.0).contains(&self.top_p) {
                self.top_p
            } else {
                defaults.top_p
            },
            top_k: if self.top_k >= 0 {
                self.top_k
            } else {
                defaults.top_k
            },
        }
    }
}

/// Join the reranked passages into the prompt's context block, indexed.
pub fn format_context(passages: &[ContextPassage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| {
            format!(
                "[{}] {} @ {:.0}s\n{}",
                i + 1,
                p.video_title,
                p.time,
                p.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Streams or collects grounded answers.
pub struct AnswerGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    prompts: Prompts,
}

impl AnswerGenerator {
    pub fn new(model: &str, prompts: Prompts, api_base: Option<&str>) -> Self {
        Self {
            client: create_client_with_base(api_base),
            model: model.to_string(),
            prompts,
        }
    }

    fn build_messages(
        &self,
        template: &str,
        passages: &[ContextPassage],
        question: &str,
        history: &[(String, String)],
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let system = self.prompts.rag_system_for(template).to_string();

        let mut vars = HashMap::new();
        vars.insert("context".to_string(), format_context(passages));
        vars.insert("question".to_string(), question.to_string());

        let user = self.prompts.render_with_custom(&self.prompts.rag.user, &vars);

        let mut messages: Vec<ChatCompletionRequestMessage> =
            vec![ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| SkueError::Rag(e.to_string()))?
                .into()];

        for (user_turn, assistant_turn) in history {
            messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_turn.clone())
                    .build()
                    .map_err(|e| SkueError::Rag(e.to_string()))?
                    .into(),
            );
            messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(assistant_turn.clone())
                    .build()
                    .map_err(|e| SkueError::Rag(e.to_string()))?
                    .into(),
            );
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| SkueError::Rag(e.to_string()))?
                .into(),
        );

        Ok(messages)
    }

    /// Stream answer tokens.
    #[instrument(skip(self, passages, history), fields(question = %question))]
    pub async fn stream(
        &self,
        template: &str,
        passages: &[ContextPassage],
        question: &str,
        history: &[(String, String)],
        params: GenerationParams,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let params = params.sanitized();
        let messages = self.build_messages(template, passages, question, history)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(params.temperature)
            .top_p(params.top_p)
            .build()
            .map_err(|e| SkueError::Rag(e.to_string()))?;

        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| SkueError::OpenAI(format!("Failed to start generation: {}", e)))?;

        debug!("Answer stream started");

        Ok(stream
            .filter_map(|chunk| async move {
                match chunk {
                    Ok(response) => response
                        .choices
                        .first()
                        .and_then(|c| c.delta.content.clone())
                        .filter(|token| !token.is_empty())
                        .map(Ok),
                    Err(e) => Some(Err(SkueError::OpenAI(format!("Stream error: {}", e)))),
                }
            })
            .boxed())
    }

    /// Generate the full answer as one string.
    #[instrument(skip(self, passages, history), fields(question = %question))]
    pub async fn generate(
        &self,
        template: &str,
        passages: &[ContextPassage],
        question: &str,
        history: &[(String, String)],
        params: GenerationParams,
    ) -> Result<String> {
        let mut stream = self
            .stream(template, passages, question, history, params)
            .await?;

        let mut answer = String::new();
        while let Some(token) = stream.next().await {
            answer.push_str(&token?);
        }

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_accepts_valid_values() {
        let params = GenerationParams {
            temperature: 0.5,
            top_p: 0.2,
            top_k: 10,
        };
        assert_eq!(params.sanitized(), params);
    }

    #[test]
    fn test_sanitized_replaces_invalid_values() {
        let params = GenerationParams {
            temperature: 1.7,
            top_p: -0.1,
            top_k: -5,
        };
        let sane = params.sanitized();
        assert_eq!(sane.temperature, 0.8);
        assert_eq!(sane.top_p, 0.9);
        assert_eq!(sane.top_k, 40);
    }

    #[test]
    fn test_format_context_indexes_passages() {
        let passages = vec![
            ContextPassage {
                text: "first passage".to_string(),
                video_id: "v1".to_string(),
                video_title: "Video One".to_string(),
                time: 10.0,
                score: 0.9,
            },
            ContextPassage {
                text: "second passage".to_string(),
                video_id: "v2".to_string(),
                video_title: "Video Two".to_string(),
                time: 20.0,
                score: 0.8,
            },
        ];

        let context = format_context(&passages);
        assert!(context.starts_with("[1] Video One @ 10s\nfirst passage"));
        assert!(context.contains("\n\n[2] Video Two @ 20s\nsecond passage"));
    }
}
