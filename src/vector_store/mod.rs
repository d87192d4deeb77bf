//! Vector store abstraction.
//!
//! Chunks are stored per-topic: the collection name is the video's topic
//! label. Backends are replaceable adapters behind the `VectorStore` trait.

mod sqlite;

pub use sqlite::SqliteVectorStore;

use crate::chunking::Chunk;
use crate::error::Result;
use crate::media::VideoMetadata;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::embedding::cosine_similarity;

/// A chunk document stored in a vector collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable id: `<video_id>#<chunk_index>`. Re-ingesting a video
    /// replaces its documents in place by this id.
    pub id: String,
    /// Collection (topic label) this document belongs to.
    pub collection: String,
    /// Video ID this document belongs to.
    pub video_id: String,
    /// Visible chunk text.
    pub content: String,
    /// Anchor time in seconds.
    pub time: f64,
    /// Character count of `content`.
    pub length: usize,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Denormalized video metadata for retrieval display.
    pub video_title: String,
    pub video_uploaddate: String,
    pub video_duration: f64,
    pub channel_url: String,
    /// When this document was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Document {
    /// Build a document from a chunk and its owning video.
    pub fn from_chunk(
        chunk: &Chunk,
        chunk_index: usize,
        metadata: &VideoMetadata,
        topic: &str,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: format!("{}#{}", metadata.id, chunk_index),
            collection: topic.to_string(),
            video_id: metadata.id.clone(),
            content: chunk.text.clone(),
            time: chunk.time,
            length: chunk.length,
            embedding,
            video_title: metadata.title.clone(),
            video_uploaddate: metadata.upload_date.clone(),
            video_duration: metadata.duration_seconds,
            channel_url: metadata.uploader_url.clone(),
            indexed_at: Utc::now(),
        }
    }

    /// Format the anchor time for display.
    pub fn format_timestamp(&self) -> String {
        let total_seconds = self.time as u32;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let secs = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, secs)
        } else {
            format!("{:02}:{:02}", minutes, secs)
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched document.
    pub document: Document,
    /// Cosine similarity (higher is better).
    pub score: f32,
}

/// Summary information about an indexed video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedVideo {
    pub video_id: String,
    pub video_title: String,
    pub collection: String,
    pub chunk_count: u32,
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Bulk upsert documents (replace-by-id).
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize>;

    /// Cosine-similarity search. `collection = None` searches everything.
    async fn search(
        &self,
        collection: Option<&str>,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Delete all documents of a video, across collections.
    async fn delete_by_video_id(&self, video_id: &str) -> Result<usize>;

    /// Names of the existing collections (the router's subject set).
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// List all indexed videos.
    async fn list_videos(&self) -> Result<Vec<IndexedVideo>>;

    /// Check if a video has indexed documents.
    async fn is_video_indexed(&self, video_id: &str) -> Result<bool>;

    /// Get total document count.
    async fn document_count(&self) -> Result<usize>;
}

/// Persist the per-video chunk table as CSV, embeddings included.
pub fn write_chunks_csv(docs: &[Document], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut out = String::from(
        "chunks,time,length,video_id,video_topic,video_title,video_uploaddate,video_duration,channel_url,chunks_embedded\n",
    );

    for doc in docs {
        let embedded = serde_json::to_string(&doc.embedding)?;
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            csv_escape(&doc.content),
            doc.time,
            doc.length,
            csv_escape(&doc.video_id),
            csv_escape(&doc.collection),
            csv_escape(&doc.video_title),
            csv_escape(&doc.video_uploaddate),
            doc.video_duration,
            csv_escape(&doc.channel_url),
            csv_escape(&embedded),
        ));
    }

    std::fs::write(path, out)?;
    Ok(())
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document {
            id: "vid#0".to_string(),
            collection: "ml".to_string(),
            video_id: "vid".to_string(),
            content: "hello, world".to_string(),
            time: 125.0,
            length: 12,
            embedding: vec![0.5, 0.5],
            video_title: "Title".to_string(),
            video_uploaddate: "20240101".to_string(),
            video_duration: 600.0,
            channel_url: "https://example.com".to_string(),
            indexed_at: Utc::now(),
        }
    }

    #[test]
    fn test_document_timestamp_format() {
        assert_eq!(doc().format_timestamp(), "02:05");
    }

    #[test]
    fn test_write_chunks_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.csv");

        write_chunks_csv(&[doc()], &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();

        assert!(content.starts_with("chunks,time,length,video_id,video_topic"));
        // Comma-bearing chunk text gets quoted.
        assert!(content.contains("\"hello, world\",125,12,vid,ml"));
    }

    #[test]
    fn test_from_chunk_assigns_composite_id() {
        let chunk = crate::chunking::Chunk {
            time: 1.0,
            text: "t".to_string(),
            length: 1,
        };
        let mut meta = crate::media::VideoMetadata::default();
        meta.id = "dQw4w9WgXcQ".to_string();

        let doc = Document::from_chunk(&chunk, 7, &meta, "topic", vec![]);
        assert_eq!(doc.id, "dQw4w9WgXcQ#7");
        assert_eq!(doc.collection, "topic");
    }
}
