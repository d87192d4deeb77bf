//! Logical and semantic routing.
//!
//! Logical routing selects a knowledge base (vector collection) from the
//! closed subject set; semantic routing selects a prompt template by
//! embedding similarity. Both are independently toggleable and bypassed by
//! default.

use crate::config::Prompts;
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{Result, SkueError};
use crate::openai::create_client_with_base;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Subject meaning "search every collection".
pub const DEFAULT_SUBJECT: &str = "all";

/// Subject returned when a requested or classified subject is not in the
/// known set.
pub const OTHER_SUBJECT: &str = "other";

/// Resolve an explicitly requested subject against the known set.
///
/// No subjects known => the default subject; a requested subject not in
/// the set => `"other"`.
pub fn resolve_subject(requested: Option<&str>, subjects: &[String]) -> String {
    match requested {
        None => DEFAULT_SUBJECT.to_string(),
        Some(r) if r == DEFAULT_SUBJECT => DEFAULT_SUBJECT.to_string(),
        Some(r) => {
            if subjects.iter().any(|s| s == r) {
                r.to_string()
            } else {
                OTHER_SUBJECT.to_string()
            }
        }
    }
}

/// LLM classification over the closed subject set.
pub struct LogicalRouter {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    prompts: Prompts,
}

impl LogicalRouter {
    pub fn new(model: &str, prompts: Prompts, api_base: Option<&str>) -> Self {
        Self {
            client: create_client_with_base(api_base),
            model: model.to_string(),
            prompts,
        }
    }

    /// Pick one subject from `subjects` for the question. Any answer
    /// outside the set yields `"other"`; an empty set yields the default.
    pub async fn route(
        &self,
        question: &str,
        history: &[String],
        subjects: &[String],
    ) -> Result<String> {
        if subjects.is_empty() {
            return Ok(DEFAULT_SUBJECT.to_string());
        }

        let history_block = if history.is_empty() {
            String::new()
        } else {
            format!("Previous messages:\n{}\n\n", history.join("\n"))
        };

        let mut vars = HashMap::new();
        vars.insert("subjects".to_string(), subjects.join(", "));
        vars.insert("question".to_string(), question.to_string());
        vars.insert("history".to_string(), history_block);

        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.router.logical, &vars);

        let messages: Vec<ChatCompletionRequestMessage> =
            vec![ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| SkueError::Rag(e.to_string()))?
                .into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.0)
            .build()
            .map_err(|e| SkueError::Rag(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SkueError::OpenAI(format!("Routing request failed: {}", e)))?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        let subject = subjects
            .iter()
            .find(|s| s.eq_ignore_ascii_case(&answer))
            .cloned()
            .unwrap_or_else(|| OTHER_SUBJECT.to_string());

        info!("Logical routing: '{}' -> '{}'", answer, subject);
        Ok(subject)
    }
}

/// Prompt template selection by embedding similarity.
pub struct SemanticRouter {
    embedder: Arc<dyn Embedder>,
    /// `(template key, representative text)` pairs.
    templates: Vec<(String, String)>,
}

impl SemanticRouter {
    /// Router over the built-in template set.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        let templates = vec![
            (
                "physics".to_string(),
                "Questions about physics: mechanics, forces, energy, waves, \
                 electromagnetism, thermodynamics, relativity, quantum phenomena."
                    .to_string(),
            ),
            (
                "math".to_string(),
                "Questions about mathematics: algebra, calculus, geometry, \
                 probability, statistics, proofs, equations, linear algebra."
                    .to_string(),
            ),
            (
                "fallback".to_string(),
                "General questions about any other subject or topic.".to_string(),
            ),
        ];

        Self {
            embedder,
            templates,
        }
    }

    /// Router with a custom template set.
    pub fn with_templates(embedder: Arc<dyn Embedder>, templates: Vec<(String, String)>) -> Self {
        Self {
            embedder,
            templates,
        }
    }

    /// Select the template with maximum cosine similarity to the question.
    pub async fn route(&self, question: &str) -> Result<String> {
        if self.templates.is_empty() {
            return Ok("fallback".to_string());
        }

        let mut texts: Vec<String> = self.templates.iter().map(|(_, t)| t.clone()).collect();
        texts.push(question.to_string());

        let mut embeddings = self.embedder.embed_batch(&texts).await?;
        let question_embedding = embeddings
            .pop()
            .ok_or_else(|| SkueError::Rag("Empty embedding batch".to_string()))?;

        let best = self
            .templates
            .iter()
            .zip(embeddings.iter())
            .map(|((key, _), emb)| (key, cosine_similarity(&question_embedding, emb)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(key, score)| (key.clone(), score));

        match best {
            Some((key, score)) => {
                debug!("Semantic routing: '{}' (score {:.3})", key, score);
                Ok(key)
            }
            None => Ok("fallback".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[test]
    fn test_resolve_subject_defaults_to_all() {
        assert_eq!(resolve_subject(None, &[]), "all");
        assert_eq!(resolve_subject(None, &["ml".to_string()]), "all");
    }

    #[test]
    fn test_resolve_subject_unknown_is_other() {
        let subjects = vec!["ml".to_string(), "physics".to_string()];
        assert_eq!(resolve_subject(Some("foo"), &subjects), "other");
        assert_eq!(resolve_subject(Some("ml"), &subjects), "ml");
        assert_eq!(resolve_subject(Some("all"), &subjects), "all");
    }

    /// Embedder mapping known strings to fixed axes.
    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> crate::error::Result<Vec<f32>> {
            Ok(if text.contains("physics") {
                vec![1.0, 0.0, 0.0]
            } else if text.contains("math") {
                vec![0.0, 1.0, 0.0]
            } else {
                vec![0.0, 0.0, 1.0]
            })
        }

        async fn embed_batch(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    #[tokio::test]
    async fn test_semantic_routing_picks_closest_template() {
        let router = SemanticRouter::new(Arc::new(StubEmbedder));

        assert_eq!(router.route("a math question").await.unwrap(), "math");
        assert_eq!(router.route("some physics here").await.unwrap(), "physics");
        assert_eq!(router.route("anything else").await.unwrap(), "fallback");
    }
}
