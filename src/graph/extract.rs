//! LLM extraction of entities and relationships from chunks.
//!
//! The model is instructed to answer line by line in exactly two shapes:
//! `Node: <Name>` or `Relationship: <Src>, <Type>, <Dst>`.

use crate::config::Prompts;
use crate::error::{Result, SkueError};
use crate::openai::{create_client_with_base, RequestPacer};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use std::collections::HashMap;
use tracing::debug;

/// A directed, typed relationship between two named entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub source: String,
    pub rel_type: String,
    pub target: String,
}

/// Extraction result for one chunk.
#[derive(Debug, Clone, Default)]
pub struct ExtractedGraph {
    /// Unique node names, in order of first appearance.
    pub nodes: Vec<String>,
    pub relationships: Vec<Relationship>,
}

/// Normalize a relationship type: spaces and hyphens become underscores,
/// everything is uppercased, and other punctuation is dropped.
pub fn normalize_relationship_type(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other,
        })
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_uppercase()
}

/// Parse the line-oriented extraction response. Malformed lines are skipped.
pub fn parse_extraction(response: &str) -> ExtractedGraph {
    let mut graph = ExtractedGraph::default();

    for line in response.lines() {
        let line = line.trim();

        if let Some(name) = line.strip_prefix("Node:") {
            let name = name.trim();
            if !name.is_empty() && !graph.nodes.iter().any(|n| n == name) {
                graph.nodes.push(name.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("Relationship:") {
            let parts: Vec<&str> = rest.splitn(3, ',').map(|p| p.trim()).collect();
            if parts.len() == 3 && parts.iter().all(|p| !p.is_empty()) {
                let rel_type = normalize_relationship_type(parts[1]);
                if !rel_type.is_empty() {
                    graph.relationships.push(Relationship {
                        source: parts[0].to_string(),
                        rel_type,
                        target: parts[2].to_string(),
                    });
                }
            }
        }
    }

    graph
}

/// Extracts the entity graph of a video chunk by chunk.
pub struct GraphExtractor {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    prompts: Prompts,
    pacer: RequestPacer,
}

impl GraphExtractor {
    pub fn new(
        model: &str,
        prompts: Prompts,
        api_base: Option<&str>,
        requests_per_pause: u32,
        pause_seconds: u64,
    ) -> Self {
        Self {
            client: create_client_with_base(api_base),
            model: model.to_string(),
            prompts,
            pacer: RequestPacer::new(requests_per_pause, pause_seconds, api_base.is_none()),
        }
    }

    /// Extract nodes and relationships from one chunk's text.
    pub async fn extract_chunk(&mut self, chunk_text: &str) -> Result<ExtractedGraph> {
        self.pacer.tick().await;

        let mut vars = HashMap::new();
        vars.insert("chunk".to_string(), chunk_text.to_string());

        let user = self
            .prompts
            .render_with_custom(&self.prompts.graph.user, &vars);

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.graph.system.clone())
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
            .temperature(0.0)
            .build()
            .map_err(|e| SkueError::OpenAI(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SkueError::ExtractionFailed(format!("Extraction request failed: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| SkueError::ExtractionFailed("Empty extraction response".to_string()))?;

        let graph = parse_extraction(content);
        debug!(
            "Extracted {} nodes, {} relationships",
            graph.nodes.len(),
            graph.relationships.len()
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_relationship_type() {
        assert_eq!(normalize_relationship_type("is used in"), "IS_USED_IN");
        assert_eq!(normalize_relationship_type("back-propagates"), "BACK_PROPAGATES");
        assert_eq!(normalize_relationship_type("trains!"), "TRAINS");
        assert_eq!(normalize_relationship_type("  extends  "), "EXTENDS");
    }

    #[test]
    fn test_parse_extraction() {
        let response = r#"
Node: Gradient Descent
Node: Neural Network
Node: Gradient Descent
Relationship: Gradient Descent, optimizes, Neural Network
Relationship: broken line without commas
some stray commentary
Relationship: Neural Network, is trained by, Gradient Descent
"#;

        let graph = parse_extraction(response);

        assert_eq!(graph.nodes, vec!["Gradient Descent", "Neural Network"]);
        assert_eq!(
            graph.relationships,
            vec![
                Relationship {
                    source: "Gradient Descent".to_string(),
                    rel_type: "OPTIMIZES".to_string(),
                    target: "Neural Network".to_string(),
                },
                Relationship {
                    source: "Neural Network".to_string(),
                    rel_type: "IS_TRAINED_BY".to_string(),
                    target: "Gradient Descent".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_extraction_empty() {
        let graph = parse_extraction("no structured lines here");
        assert!(graph.nodes.is_empty());
        assert!(graph.relationships.is_empty());
    }
}
