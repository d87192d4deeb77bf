//! SQLite-based vector store implementation.
//!
//! Cosine similarity is computed in Rust over the candidate rows. For large
//! deployments swap in a dedicated vector database behind the trait.

use super::{cosine_similarity, Document, IndexedVideo, SearchResult, VectorStore};
use crate::error::{Result, SkueError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

/// SQLite-backed vector collections.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    video_id TEXT NOT NULL,
    content TEXT NOT NULL,
    time REAL NOT NULL,
    length INTEGER NOT NULL,
    embedding BLOB NOT NULL,
    video_title TEXT NOT NULL,
    video_uploaddate TEXT NOT NULL,
    video_duration REAL NOT NULL,
    channel_url TEXT NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
CREATE INDEX IF NOT EXISTS idx_documents_video_id ON documents(video_id);
"#;

impl SqliteVectorStore {
    /// Open (or create) the store at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SkueError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
        let embedding_bytes: Vec<u8> = row.get(6)?;
        let indexed_at_str: String = row.get(11)?;

        Ok(Document {
            id: row.get(0)?,
            collection: row.get(1)?,
            video_id: row.get(2)?,
            content: row.get(3)?,
            time: row.get(4)?,
            length: row.get::<_, i64>(5)? as usize,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            video_title: row.get(7)?,
            video_uploaddate: row.get(8)?,
            video_duration: row.get(9)?,
            channel_url: row.get(10)?,
            indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

const SELECT_COLUMNS: &str = "id, collection, video_id, content, time, length, embedding, \
     video_title, video_uploaddate, video_duration, channel_url, indexed_at";

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, docs))]
    async fn upsert_batch(&self, docs: &[Document]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for doc in docs {
            let embedding_bytes = Self::embedding_to_bytes(&doc.embedding);

            tx.execute(
                r#"
                INSERT OR REPLACE INTO documents
                (id, collection, video_id, content, time, length, embedding,
                 video_title, video_uploaddate, video_duration, channel_url, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    doc.id,
                    doc.collection,
                    doc.video_id,
                    doc.content,
                    doc.time,
                    doc.length as i64,
                    embedding_bytes,
                    doc.video_title,
                    doc.video_uploaddate,
                    doc.video_duration,
                    doc.channel_url,
                    doc.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Batch upserted {} documents", docs.len());
        Ok(docs.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        collection: Option<&str>,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.lock()?;

        let mut results: Vec<SearchResult> = match collection {
            Some(name) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM documents WHERE collection = ?1",
                    SELECT_COLUMNS
                ))?;
                let docs = stmt.query_map(params![name], Self::row_to_document)?;
                docs.filter_map(|d| d.ok())
                    .map(|doc| {
                        let score = cosine_similarity(query_embedding, &doc.embedding);
                        SearchResult {
                            document: doc,
                            score,
                        }
                    })
                    .collect()
            }
            None => {
                let mut stmt =
                    conn.prepare(&format!("SELECT {} FROM documents", SELECT_COLUMNS))?;
                let docs = stmt.query_map([], Self::row_to_document)?;
                docs.filter_map(|d| d.ok())
                    .map(|doc| {
                        let score = cosine_similarity(query_embedding, &doc.embedding);
                        SearchResult {
                            document: doc,
                            score,
                        }
                    })
                    .collect()
            }
        };

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn delete_by_video_id(&self, video_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM documents WHERE video_id = ?1",
            params![video_id],
        )?;

        info!("Deleted {} documents for video {}", deleted, video_id);
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn list_collections(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT collection FROM documents ORDER BY collection")?;

        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(names.filter_map(|n| n.ok()).collect())
    }

    #[instrument(skip(self))]
    async fn list_videos(&self) -> Result<Vec<IndexedVideo>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT video_id, video_title, collection, COUNT(*) as chunk_count,
                   MAX(indexed_at) as indexed_at
            FROM documents
            GROUP BY video_id
            ORDER BY indexed_at DESC
            "#,
        )?;

        let videos = stmt.query_map([], |row| {
            let indexed_at_str: String = row.get(4)?;
            Ok(IndexedVideo {
                video_id: row.get(0)?,
                video_title: row.get(1)?,
                collection: row.get(2)?,
                chunk_count: row.get(3)?,
                indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;

        Ok(videos.filter_map(|v| v.ok()).collect())
    }

    async fn is_video_indexed(&self, video_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE video_id = ?1",
            params![video_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    async fn document_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(id: &str, collection: &str, video_id: &str, embedding: Vec<f32>) -> Document {
        Document {
            id: id.to_string(),
            collection: collection.to_string(),
            video_id: video_id.to_string(),
            content: format!("content of {}", id),
            time: 0.0,
            length: 10,
            embedding,
            video_title: "Test Video".to_string(),
            video_uploaddate: "20240101".to_string(),
            video_duration: 100.0,
            channel_url: "https://youtube.com/@test".to_string(),
            indexed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_search_delete() {
        let store = SqliteVectorStore::in_memory().unwrap();

        store
            .upsert_batch(&[
                doc("v1#0", "ml", "v1", vec![1.0, 0.0]),
                doc("v1#1", "ml", "v1", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = store.search(Some("ml"), &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.id, "v1#0");
        assert!((results[0].score - 1.0).abs() < 0.001);

        let deleted = store.delete_by_video_id("v1").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(!store.is_video_indexed("v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_search_scoped_to_collection() {
        let store = SqliteVectorStore::in_memory().unwrap();

        store
            .upsert_batch(&[
                doc("v1#0", "physics", "v1", vec![1.0, 0.0]),
                doc("v2#0", "math", "v2", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let scoped = store.search(Some("physics"), &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].document.video_id, "v1");

        let all = store.search(None, &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_reingest_replaces_by_id() {
        let store = SqliteVectorStore::in_memory().unwrap();

        store
            .upsert_batch(&[doc("v1#0", "ml", "v1", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert_batch(&[doc("v1#0", "ml", "v1", vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(store.document_count().await.unwrap(), 1);

        let results = store.search(Some("ml"), &[0.0, 1.0], 10).await.unwrap();
        assert!((results[0].score - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_list_collections() {
        let store = SqliteVectorStore::in_memory().unwrap();

        store
            .upsert_batch(&[
                doc("v1#0", "physics", "v1", vec![1.0]),
                doc("v2#0", "math", "v2", vec![1.0]),
                doc("v3#0", "math", "v3", vec![1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(
            store.list_collections().await.unwrap(),
            vec!["math", "physics"]
        );

        let videos = store.list_videos().await.unwrap();
        assert_eq!(videos.len(), 3);
    }
}
