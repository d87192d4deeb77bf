//! Retrieval and reranking.
//!
//! Vector-similarity retrieval produces a top-K shortlist; a reranker
//! reorders it and keeps top-N. The default reranker is a cross-encoder;
//! BM25 and bi-encoder cosine are selectable alternatives.

use super::{ContextPassage, DEFAULT_SUBJECT, OTHER_SUBJECT};
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{Result, SkueError};
use crate::vector_store::VectorStore;
use async_trait::async_trait;
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// Vector-similarity retrieval over the routed collection.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Retrieve the top-K passages for a question. Subject `"all"` (or
    /// `"other"`) searches every collection.
    #[instrument(skip(self), fields(subject = %subject))]
    pub async fn retrieve(
        &self,
        subject: &str,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<ContextPassage>> {
        let query_embedding = self.embedder.embed(question).await?;

        let collection = if subject == DEFAULT_SUBJECT || subject == OTHER_SUBJECT {
            None
        } else {
            Some(subject)
        };

        let results = self
            .store
            .search(collection, &query_embedding, top_k)
            .await?;

        debug!("Retrieved {} candidates", results.len());
        Ok(results.into_iter().map(ContextPassage::from).collect())
    }
}

/// Trait for rerankers over a retrieved shortlist.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rescore the passages against the question and keep the top N.
    async fn rerank(
        &self,
        question: &str,
        passages: Vec<ContextPassage>,
        top_n: usize,
    ) -> Result<Vec<ContextPassage>>;
}

/// Create a reranker by configured name. Unknown names fall back to the
/// cross-encoder default.
pub fn create_reranker(kind: &str, embedder: Arc<dyn Embedder>) -> Box<dyn Reranker> {
    match kind.to_lowercase().as_str() {
        "bm25" => Box::new(Bm25Reranker::new()),
        "embedding" | "bi-encoder" => Box::new(EmbeddingReranker::new(embedder)),
        _ => Box::new(CrossEncoderReranker::new()),
    }
}

/// Cross-encoder reranker scoring each (question, passage) pair jointly.
pub struct CrossEncoderReranker {
    model: Mutex<Option<TextRerank>>,
}

impl CrossEncoderReranker {
    /// The model is loaded lazily on the first rerank call.
    pub fn new() -> Self {
        Self {
            model: Mutex::new(None),
        }
    }
}

impl Default for CrossEncoderReranker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    async fn rerank(
        &self,
        question: &str,
        passages: Vec<ContextPassage>,
        top_n: usize,
    ) -> Result<Vec<ContextPassage>> {
        if passages.is_empty() {
            return Ok(passages);
        }

        let mut guard = self
            .model
            .lock()
            .map_err(|e| SkueError::Rag(format!("Reranker lock poisoned: {}", e)))?;

        if guard.is_none() {
            let model = TextRerank::try_new(RerankInitOptions::new(RerankerModel::BGERerankerBase))
                .map_err(|e| SkueError::Rag(format!("Cross-encoder init failed: {}", e)))?;
            *guard = Some(model);
        }

        let model = guard.as_mut().expect("initialized above");

        let documents: Vec<&str> = passages.iter().map(|p| p.text.as_str()).collect();
        let scored = model
            .rerank(question, documents, false, None)
            .map_err(|e| SkueError::Rag(format!("Cross-encoder rerank failed: {}", e)))?;

        let mut reranked: Vec<ContextPassage> = scored
            .into_iter()
            .filter_map(|r| {
                passages.get(r.index).map(|p| {
                    let mut p = p.clone();
                    p.score = r.score;
                    p
                })
            })
            .collect();

        reranked.truncate(top_n);
        Ok(reranked)
    }
}

/// Bi-encoder cosine reranker: question and passages embedded separately.
pub struct EmbeddingReranker {
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingReranker {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl Reranker for EmbeddingReranker {
    async fn rerank(
        &self,
        question: &str,
        passages: Vec<ContextPassage>,
        top_n: usize,
    ) -> Result<Vec<ContextPassage>> {
        if passages.is_empty() {
            return Ok(passages);
        }

        let question_embedding = self.embedder.embed(question).await?;
        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let mut reranked: Vec<ContextPassage> = passages
            .into_iter()
            .zip(embeddings)
            .map(|(mut p, emb)| {
                p.score = cosine_similarity(&question_embedding, &emb);
                p
            })
            .collect();

        reranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        reranked.truncate(top_n);
        Ok(reranked)
    }
}

/// BM25 reranker over the candidate set only.
pub struct Bm25Reranker {
    k1: f32,
    b: f32,
}

impl Bm25Reranker {
    pub fn new() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect()
    }
}

impl Default for Bm25Reranker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reranker for Bm25Reranker {
    async fn rerank(
        &self,
        question: &str,
        passages: Vec<ContextPassage>,
        top_n: usize,
    ) -> Result<Vec<ContextPassage>> {
        if passages.is_empty() {
            return Ok(passages);
        }

        let query_terms: HashSet<String> = Self::tokenize(question).into_iter().collect();
        let docs: Vec<Vec<String>> = passages.iter().map(|p| Self::tokenize(&p.text)).collect();

        let n = docs.len() as f32;
        let avg_len = docs.iter().map(|d| d.len()).sum::<usize>() as f32 / n;

        // Document frequency per query term, over the candidate set.
        let mut df: HashMap<&String, f32> = HashMap::new();
        for term in &query_terms {
            let count = docs.iter().filter(|d| d.contains(term)).count() as f32;
            df.insert(term, count);
        }

        let mut reranked: Vec<ContextPassage> = passages
            .into_iter()
            .zip(docs.iter())
            .map(|(mut p, doc)| {
                let doc_len = doc.len() as f32;
                let mut score = 0.0f32;

                for term in &query_terms {
                    let tf = doc.iter().filter(|t| *t == term).count() as f32;
                    if tf == 0.0 {
                        continue;
                    }

                    let df_t = df[term];
                    let idf = ((n - df_t + 0.5) / (df_t + 0.5) + 1.0).ln();
                    let denom = tf + self.k1 * (1.0 - self.b + self.b * doc_len / avg_len.max(1.0));
                    score += idf * tf * (self.k1 + 1.0) / denom;
                }

                p.score = score;
                p
            })
            .collect();

        reranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        reranked.truncate(top_n);
        Ok(reranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(text: &str) -> ContextPassage {
        ContextPassage {
            text: text.to_string(),
            video_id: "v".to_string(),
            video_title: "t".to_string(),
            time: 0.0,
            score: 0.0,
        }
    }

    #[tokio::test]
    async fn test_bm25_ranks_matching_passage_first() {
        let reranker = Bm25Reranker::new();

        let passages = vec![
            passage("completely unrelated content about cooking"),
            passage("gradient descent optimizes the loss function"),
            passage("the loss went down slightly"),
        ];

        let reranked = reranker
            .rerank("what does gradient descent optimize", passages, 2)
            .await
            .unwrap();

        assert_eq!(reranked.len(), 2);
        assert!(reranked[0].text.contains("gradient descent"));
        assert!(reranked[0].score > reranked[1].score);
    }

    #[tokio::test]
    async fn test_bm25_empty_input() {
        let reranker = Bm25Reranker::new();
        let reranked = reranker.rerank("anything", Vec::new(), 5).await.unwrap();
        assert!(reranked.is_empty());
    }

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(if text.contains("match") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            })
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn test_embedding_reranker_orders_by_cosine() {
        let reranker = EmbeddingReranker::new(Arc::new(FixedEmbedder));

        let passages = vec![passage("nothing here"), passage("a match here")];
        let reranked = reranker
            .rerank("find the match", passages, 1)
            .await
            .unwrap();

        assert_eq!(reranked.len(), 1);
        assert!(reranked[0].text.contains("match"));
    }
}
