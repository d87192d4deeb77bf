//! SQLite-based graph store implementation.
//!
//! Entity nodes live in one table with their parallel list attributes as a
//! JSON document; relationships are a composite-keyed edge table merged
//! with INSERT OR IGNORE. Swap in a graph database behind the trait for
//! large deployments.

use super::{EntityAttributes, GraphEntity, GraphStore, MentionAttrs, MentionPassage};
use crate::error::{Result, SkueError};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

/// SQLite-backed entity graph.
pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    name TEXT PRIMARY KEY,
    attributes TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS relationships (
    source TEXT NOT NULL,
    rel_type TEXT NOT NULL,
    target TEXT NOT NULL,
    PRIMARY KEY (source, rel_type, target)
);
"#;

impl SqliteGraphStore {
    /// Open (or create) the store at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite graph store at {:?}", path);

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
            .map_err(|e| SkueError::GraphStore(format!("Failed to acquire lock: {}", e)))
    }

    fn load_attributes(conn: &Connection, name: &str) -> Result<Option<EntityAttributes>> {
        let json: Option<String> = conn
            .query_row(
                "SELECT attributes FROM entities WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn store_attributes(conn: &Connection, name: &str, attrs: &EntityAttributes) -> Result<()> {
        let json = serde_json::to_string(attrs)?;
        conn.execute(
            "INSERT OR REPLACE INTO entities (name, attributes) VALUES (?1, ?2)",
            params![name, json],
        )?;
        Ok(())
    }

    /// Ensure an entity row exists, leaving existing attributes untouched.
    fn ensure_entity(conn: &Connection, name: &str) -> Result<()> {
        let empty = serde_json::to_string(&EntityAttributes::default())?;
        conn.execute(
            "INSERT OR IGNORE INTO entities (name, attributes) VALUES (?1, ?2)",
            params![name, empty],
        )?;
        Ok(())
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    #[instrument(skip(self, mention))]
    async fn merge_mention(&self, name: &str, mention: MentionAttrs) -> Result<()> {
        let conn = self.lock()?;

        let mut attrs = Self::load_attributes(&conn, name)?.unwrap_or_default();
        attrs.push_mention(mention);
        Self::store_attributes(&conn, name, &attrs)?;

        debug!("Entity '{}' now has {} mentions", name, attrs.len());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn merge_relationship(&self, source: &str, rel_type: &str, target: &str) -> Result<()> {
        let conn = self.lock()?;

        Self::ensure_entity(&conn, source)?;
        Self::ensure_entity(&conn, target)?;

        conn.execute(
            "INSERT OR IGNORE INTO relationships (source, rel_type, target) VALUES (?1, ?2, ?3)",
            params![source, rel_type, target],
        )?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn attach_frame(
        &self,
        video_id: &str,
        frame_time: f64,
        frame_name: &str,
        frame_description: &str,
    ) -> Result<bool> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT name, attributes FROM entities")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        // Closest mention of this video across all entities.
        let mut best: Option<(String, EntityAttributes, usize, f64)> = None;

        for row in rows.flatten() {
            let (name, json) = row;
            let attrs: EntityAttributes = serde_json::from_str(&json)?;

            for (i, time) in attrs.time.iter().enumerate() {
                if attrs.url_id.get(i).map(|v| v == video_id) != Some(true) {
                    continue;
                }

                let distance = (time - frame_time).abs();
                let closer = best
                    .as_ref()
                    .map(|(_, _, _, d)| distance < *d)
                    .unwrap_or(true);

                if closer {
                    best = Some((name.clone(), attrs.clone(), i, distance));
                }
            }
        }
        drop(stmt);

        match best {
            Some((name, mut attrs, index, _)) => {
                attrs.attach_frame(index, frame_name, frame_description);
                Self::store_attributes(&conn, &name, &attrs)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(skip(self))]
    async fn prune_isolated(&self) -> Result<usize> {
        let conn = self.lock()?;

        let deleted = conn.execute(
            r#"
            DELETE FROM entities
            WHERE name NOT IN (SELECT source FROM relationships)
              AND name NOT IN (SELECT target FROM relationships)
            "#,
            [],
        )?;

        info!("Pruned {} isolated entities", deleted);
        Ok(deleted)
    }

    async fn entity(&self, name: &str) -> Result<Option<GraphEntity>> {
        let conn = self.lock()?;

        Ok(Self::load_attributes(&conn, name)?.map(|attributes| GraphEntity {
            name: name.to_string(),
            attributes,
        }))
    }

    async fn entity_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    async fn relationship_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    #[instrument(skip(self))]
    async fn search_mentions(&self, terms: &[String], limit: usize) -> Result<Vec<MentionPassage>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT name, attributes FROM entities")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let lowered: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();
        let mut passages = Vec::new();

        for row in rows.flatten() {
            let (name, json) = row;
            let name_lower = name.to_lowercase();

            if !lowered.iter().any(|t| name_lower.contains(t.as_str())) {
                continue;
            }

            let attrs: EntityAttributes = serde_json::from_str(&json)?;
            for i in 0..attrs.len() {
                passages.push(MentionPassage {
                    entity: name.clone(),
                    time: attrs.time[i],
                    text: attrs.text[i].clone(),
                    video_id: attrs.url_id[i].clone(),
                    video_title: attrs.title.get(i).cloned().unwrap_or_default(),
                });

                if passages.len() >= limit {
                    return Ok(passages);
                }
            }
        }

        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(time: f64, video_id: &str) -> MentionAttrs {
        MentionAttrs {
            time,
            text: format!("mention at {}", time),
            url_id: video_id.to_string(),
            title: "Lecture".to_string(),
            description: String::new(),
            duration: 0.0,
            view_count: 0,
            uploader: String::new(),
            tags: String::new(),
            thumbnail: String::new(),
            uploader_url: String::new(),
            age_limit: 0,
            categories: String::new(),
            like_count: 0,
            upload_date: String::new(),
        }
    }

    #[tokio::test]
    async fn test_merge_mention_appends() {
        let store = SqliteGraphStore::in_memory().unwrap();

        store
            .merge_mention("Gradient Descent", mention(1.0, "v1"))
            .await
            .unwrap();
        store
            .merge_mention("Gradient Descent", mention(2.0, "v2"))
            .await
            .unwrap();

        let entity = store.entity("Gradient Descent").await.unwrap().unwrap();
        assert_eq!(entity.attributes.len(), 2);
        assert_eq!(entity.attributes.url_id, vec!["v1", "v2"]);
        assert_eq!(entity.attributes.frame_names.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_relationship_is_idempotent() {
        let store = SqliteGraphStore::in_memory().unwrap();

        store.merge_relationship("A", "USES", "B").await.unwrap();
        store.merge_relationship("A", "USES", "B").await.unwrap();

        assert_eq!(store.relationship_count().await.unwrap(), 1);
        assert_eq!(store.entity_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_attach_frame_picks_closest_mention() {
        let store = SqliteGraphStore::in_memory().unwrap();

        store.merge_mention("A", mention(10.0, "v1")).await.unwrap();
        store.merge_mention("B", mention(100.0, "v1")).await.unwrap();
        store.merge_mention("C", mention(50.0, "other")).await.unwrap();

        let attached = store
            .attach_frame("v1", 95.0, "frame95_95000.jpg", "a chart")
            .await
            .unwrap();
        assert!(attached);

        let b = store.entity("B").await.unwrap().unwrap();
        assert_eq!(b.attributes.frame_names[0], "frame95_95000.jpg");

        let a = store.entity("A").await.unwrap().unwrap();
        assert_eq!(a.attributes.frame_names[0], "");
    }

    #[tokio::test]
    async fn test_attach_frame_without_mentions() {
        let store = SqliteGraphStore::in_memory().unwrap();
        let attached = store
            .attach_frame("missing", 0.0, "frame0_0.jpg", "desc")
            .await
            .unwrap();
        assert!(!attached);
    }

    #[tokio::test]
    async fn test_prune_isolated() {
        let store = SqliteGraphStore::in_memory().unwrap();

        store.merge_mention("Connected", mention(1.0, "v1")).await.unwrap();
        store.merge_mention("Isolated", mention(2.0, "v1")).await.unwrap();
        store
            .merge_relationship("Connected", "USES", "Other")
            .await
            .unwrap();

        let pruned = store.prune_isolated().await.unwrap();
        assert_eq!(pruned, 1);

        assert!(store.entity("Isolated").await.unwrap().is_none());
        assert!(store.entity("Connected").await.unwrap().is_some());
        assert!(store.entity("Other").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_search_mentions() {
        let store = SqliteGraphStore::in_memory().unwrap();

        store
            .merge_mention("Gradient Descent", mention(5.0, "v1"))
            .await
            .unwrap();
        store
            .merge_mention("Transformer", mention(9.0, "v1"))
            .await
            .unwrap();

        let passages = store
            .search_mentions(&["gradient".to_string()], 10)
            .await
            .unwrap();

        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].entity, "Gradient Descent");
        assert_eq!(passages[0].time, 5.0);
    }
}
