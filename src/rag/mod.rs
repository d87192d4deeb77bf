//! RAG query pipeline: routing, retrieval, reranking, generation.

mod pipeline;
mod response;
mod retriever;
mod router;

pub use pipeline::{QueryPipeline, QueryRequest, RoutedContext};
pub use response::{format_context, AnswerGenerator, GenerationParams};
pub use retriever::{
    create_reranker, Bm25Reranker, CrossEncoderReranker, EmbeddingReranker, Reranker, Retriever,
};
pub use router::{resolve_subject, LogicalRouter, SemanticRouter, DEFAULT_SUBJECT, OTHER_SUBJECT};

use crate::graph::MentionPassage;
use crate::vector_store::SearchResult;
use serde::{Deserialize, Serialize};

/// Which store(s) the query pipeline retrieves from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    #[default]
    Vector,
    Graph,
    All,
}

impl std::str::FromStr for DatabaseKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vector" => Ok(DatabaseKind::Vector),
            "graph" => Ok(DatabaseKind::Graph),
            "all" => Ok(DatabaseKind::All),
            _ => Err(format!("Unknown database kind: {}", s)),
        }
    }
}

/// A retrieved context passage, from either store.
#[derive(Debug, Clone)]
pub struct ContextPassage {
    pub text: String,
    pub video_id: String,
    pub video_title: String,
    pub time: f64,
    pub score: f32,
}

impl ContextPassage {
    /// Watch URL pointing at the passage's timestamp.
    pub fn url(&self) -> String {
        format!(
            "https://youtube.com/watch?v={}&t={}s",
            self.video_id, self.time as u32
        )
    }
}

impl From<SearchResult> for ContextPassage {
    fn from(result: SearchResult) -> Self {
        Self {
            text: result.document.content,
            video_id: result.document.video_id,
            video_title: result.document.video_title,
            time: result.document.time,
            score: result.score,
        }
    }
}

impl From<MentionPassage> for ContextPassage {
    fn from(passage: MentionPassage) -> Self {
        Self {
            text: passage.text,
            video_id: passage.video_id,
            video_title: passage.video_title,
            time: passage.time,
            score: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_database_kind_from_str() {
        assert_eq!(DatabaseKind::from_str("vector").unwrap(), DatabaseKind::Vector);
        assert_eq!(DatabaseKind::from_str("GRAPH").unwrap(), DatabaseKind::Graph);
        assert_eq!(DatabaseKind::from_str("all").unwrap(), DatabaseKind::All);
        assert!(DatabaseKind::from_str("both").is_err());
    }

    #[test]
    fn test_passage_url() {
        let passage = ContextPassage {
            text: String::new(),
            video_id: "dQw4w9WgXcQ".to_string(),
            video_title: String::new(),
            time: 93.7,
            score: 0.0,
        };
        assert_eq!(
            passage.url(),
            "https://youtube.com/watch?v=dQw4w9WgXcQ&t=93s"
        );
    }
}
