//! End-to-end query pipeline: validate, route, retrieve, rerank, generate.

use super::{
    create_reranker, format_context, resolve_subject, AnswerGenerator, ContextPassage,
    DatabaseKind, GenerationParams, LogicalRouter, Retriever, SemanticRouter,
};
use crate::config::{Prompts, Settings};
use crate::embedding::Embedder;
use crate::error::{Result, SkueError};
use crate::graph::GraphStore;
use crate::vector_store::VectorStore;
use futures::stream::BoxStream;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// One query against the knowledge base.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub prompt: String,
    /// Generation model override.
    pub model_id: Option<String>,
    /// Alternating `(user, assistant)` turns of prior conversation.
    pub message_history: Vec<(String, String)>,
    /// Explicit knowledge base selection (bypassed by logical routing).
    pub knowledge_base: Option<String>,
    pub database: DatabaseKind,
    pub use_logical_routing: bool,
    pub use_semantic_routing: bool,
    pub params: GenerationParams,
}

impl QueryRequest {
    pub fn new(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            model_id: None,
            message_history: Vec::new(),
            knowledge_base: None,
            database: DatabaseKind::Vector,
            use_logical_routing: false,
            use_semantic_routing: false,
            params: GenerationParams::default(),
        }
    }
}

/// Routed context for one query, returned alongside the answer.
#[derive(Debug, Clone)]
pub struct RoutedContext {
    pub subject: String,
    pub template: String,
    pub passages: Vec<ContextPassage>,
}

/// The stateless query pipeline.
pub struct QueryPipeline {
    settings: Settings,
    prompts: Prompts,
    vector_store: Arc<dyn VectorStore>,
    graph_store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
}

impl QueryPipeline {
    pub fn new(
        settings: Settings,
        prompts: Prompts,
        vector_store: Arc<dyn VectorStore>,
        graph_store: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            settings,
            prompts,
            vector_store,
            graph_store,
            embedder,
        }
    }

    fn validate(request: &QueryRequest) -> Result<()> {
        if request.prompt.trim().is_empty() {
            return Err(SkueError::InvalidInput(
                "The prompt must not be empty!".to_string(),
            ));
        }
        Ok(())
    }

    /// Route the question and assemble its reranked context.
    #[instrument(skip(self, request), fields(prompt = %request.prompt))]
    pub async fn retrieve_context(&self, request: &QueryRequest) -> Result<RoutedContext> {
        Self::validate(request)?;

        let subjects = self.vector_store.list_collections().await?;

        let subject = if request.use_logical_routing {
            let router = LogicalRouter::new(
                &self.settings.router.model,
                self.prompts.clone(),
                self.settings.local_api_base(),
            );
            let history: Vec<String> = request
                .message_history
                .iter()
                .map(|(user, _)| user.clone())
                .collect();
            router.route(&request.prompt, &history, &subjects).await?
        } else {
            resolve_subject(request.knowledge_base.as_deref(), &subjects)
        };

        let template = if request.use_semantic_routing {
            let router = SemanticRouter::new(self.embedder.clone());
            router.route(&request.prompt).await?
        } else {
            "fallback".to_string()
        };

        debug!("Routed to subject '{}', template '{}'", subject, template);

        let top_k = self.settings.rag.vectorstore_top_k;
        let mut passages: Vec<ContextPassage> = Vec::new();

        if matches!(request.database, DatabaseKind::Vector | DatabaseKind::All) {
            let retriever = Retriever::new(self.vector_store.clone(), self.embedder.clone());
            passages.extend(
                retriever
                    .retrieve(&subject, &request.prompt, top_k)
                    .await?,
            );
        }

        if matches!(request.database, DatabaseKind::Graph | DatabaseKind::All) {
            let terms: Vec<String> = request
                .prompt
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| t.len() > 3)
                .map(|t| t.to_string())
                .collect();

            let mentions = self.graph_store.search_mentions(&terms, top_k).await?;
            passages.extend(mentions.into_iter().map(ContextPassage::from));
        }

        let reranker = create_reranker(&self.settings.rag.reranker, self.embedder.clone());
        let passages = reranker
            .rerank(
                &request.prompt,
                passages,
                self.settings.rag.reranking_top_k,
            )
            .await?;

        info!("Assembled {} context passages", passages.len());

        Ok(RoutedContext {
            subject,
            template,
            passages,
        })
    }

    fn generator(&self, request: &QueryRequest) -> AnswerGenerator {
        let model = request
            .model_id
            .clone()
            .unwrap_or_else(|| self.settings.rag.model.clone());
        AnswerGenerator::new(&model, self.prompts.clone(), self.settings.local_api_base())
    }

    /// Answer as a complete string.
    pub async fn answer(&self, request: &QueryRequest) -> Result<(RoutedContext, String)> {
        let context = self.retrieve_context(request).await?;
        let generator = self.generator(request);

        let answer = generator
            .generate(
                &context.template,
                &context.passages,
                &request.prompt,
                &request.message_history,
                request.params,
            )
            .await?;

        Ok((context, answer))
    }

    /// Answer as a token stream.
    pub async fn answer_stream(
        &self,
        request: &QueryRequest,
    ) -> Result<(RoutedContext, BoxStream<'static, Result<String>>)> {
        let context = self.retrieve_context(request).await?;
        let generator = self.generator(request);

        let stream = generator
            .stream(
                &context.template,
                &context.passages,
                &request.prompt,
                &request.message_history,
                request.params,
            )
            .await?;

        Ok((context, stream))
    }

    /// Formatted context block, for display surfaces.
    pub fn display_context(context: &RoutedContext) -> String {
        format_context(&context.passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_prompt_is_rejected() {
        let request = QueryRequest::new("   ");
        let err = QueryPipeline::validate(&request).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_default_request_bypasses_routing() {
        let request = QueryRequest::new("what is a tensor?");
        assert!(!request.use_logical_routing);
        assert!(!request.use_semantic_routing);
        assert_eq!(request.database, DatabaseKind::Vector);
    }
}
