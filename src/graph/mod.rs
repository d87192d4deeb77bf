//! Entity/relationship graph construction and storage.
//!
//! Entities are nodes keyed by name with parallel list-valued attributes:
//! index `i` across all lists describes the i-th mention of the entity in
//! some chunk. Relationships are typed directed edges merged on repeat.

mod extract;
mod sqlite;

pub use extract::{normalize_relationship_type, parse_extraction, ExtractedGraph, GraphExtractor, Relationship};
pub use sqlite::SqliteGraphStore;

use crate::chunking::Chunk;
use crate::error::Result;
use crate::media::VideoMetadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One mention of an entity: the chunk anchor plus the owning video's
/// metadata, denormalized per mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionAttrs {
    pub time: f64,
    pub text: String,
    pub url_id: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub view_count: u64,
    pub uploader: String,
    pub tags: String,
    pub thumbnail: String,
    pub uploader_url: String,
    pub age_limit: u32,
    pub categories: String,
    pub like_count: u64,
    pub upload_date: String,
}

impl MentionAttrs {
    /// Build the mention record for a chunk of a video.
    pub fn from_chunk(chunk: &Chunk, metadata: &VideoMetadata) -> Self {
        Self {
            time: chunk.time,
            text: chunk.text.clone(),
            url_id: metadata.id.clone(),
            title: metadata.title.clone(),
            description: metadata.description.clone(),
            duration: metadata.duration_seconds,
            view_count: metadata.view_count,
            uploader: metadata.uploader.clone(),
            tags: metadata.tags.join("; "),
            thumbnail: metadata.thumbnail_url.clone(),
            uploader_url: metadata.uploader_url.clone(),
            age_limit: metadata.age_limit,
            categories: metadata.categories.join("; "),
            like_count: metadata.like_count,
            upload_date: metadata.upload_date.clone(),
        }
    }
}

/// Parallel list-valued attributes of an entity node. All lists grow
/// together so index `i` is coherent across them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityAttributes {
    pub time: Vec<f64>,
    pub text: Vec<String>,
    pub url_id: Vec<String>,
    pub title: Vec<String>,
    pub description: Vec<String>,
    pub duration: Vec<f64>,
    pub view_count: Vec<u64>,
    pub uploader: Vec<String>,
    pub tags: Vec<String>,
    pub thumbnail: Vec<String>,
    pub uploader_url: Vec<String>,
    pub age_limit: Vec<u32>,
    pub categories: Vec<String>,
    pub like_count: Vec<u64>,
    pub upload_date: Vec<String>,
    pub frame_names: Vec<String>,
    pub frame_descriptions: Vec<String>,
}

impl EntityAttributes {
    /// Number of mentions.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Append one mention to every list. Frame attributes start empty and
    /// are filled by frame attachment.
    pub fn push_mention(&mut self, m: MentionAttrs) {
        self.time.push(m.time);
        self.text.push(m.text);
        self.url_id.push(m.url_id);
        self.title.push(m.title);
        self.description.push(m.description);
        self.duration.push(m.duration);
        self.view_count.push(m.view_count);
        self.uploader.push(m.uploader);
        self.tags.push(m.tags);
        self.thumbnail.push(m.thumbnail);
        self.uploader_url.push(m.uploader_url);
        self.age_limit.push(m.age_limit);
        self.categories.push(m.categories);
        self.like_count.push(m.like_count);
        self.upload_date.push(m.upload_date);
        self.frame_names.push(String::new());
        self.frame_descriptions.push(String::new());
    }

    /// Attach a frame at a mention index. Multiple frames on the same
    /// index are joined with "; " so list lengths never diverge.
    pub fn attach_frame(&mut self, index: usize, frame_name: &str, frame_description: &str) {
        if index >= self.len() {
            return;
        }

        let append = |slot: &mut String, value: &str| {
            if slot.is_empty() {
                slot.push_str(value);
            } else {
                slot.push_str("; ");
                slot.push_str(value);
            }
        };

        append(&mut self.frame_names[index], frame_name);
        append(&mut self.frame_descriptions[index], frame_description);
    }
}

/// An entity node as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEntity {
    pub name: String,
    pub attributes: EntityAttributes,
}

/// A mention passage surfaced by graph-backed retrieval.
#[derive(Debug, Clone)]
pub struct MentionPassage {
    pub entity: String,
    pub time: f64,
    pub text: String,
    pub video_id: String,
    pub video_title: String,
}

/// Trait for graph store implementations.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Merge an entity by name and append one mention to its lists.
    async fn merge_mention(&self, name: &str, mention: MentionAttrs) -> Result<()>;

    /// Merge the typed edge `(source)-[rel_type]->(target)`. Creates
    /// missing endpoint entities with empty attributes.
    async fn merge_relationship(&self, source: &str, rel_type: &str, target: &str) -> Result<()>;

    /// Attach a frame to the mention of this video whose time is closest
    /// to the frame's time. Returns false when the video has no mentions.
    async fn attach_frame(
        &self,
        video_id: &str,
        frame_time: f64,
        frame_name: &str,
        frame_description: &str,
    ) -> Result<bool>;

    /// Delete entities that participate in no relationship. Returns the
    /// number of deleted entities.
    async fn prune_isolated(&self) -> Result<usize>;

    /// Fetch an entity by name.
    async fn entity(&self, name: &str) -> Result<Option<GraphEntity>>;

    /// Total entity count.
    async fn entity_count(&self) -> Result<usize>;

    /// Total relationship count.
    async fn relationship_count(&self) -> Result<usize>;

    /// Passages from entities whose names match any of the query terms.
    async fn search_mentions(&self, terms: &[String], limit: usize) -> Result<Vec<MentionPassage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(time: f64, video_id: &str) -> MentionAttrs {
        MentionAttrs {
            time,
            text: format!("chunk at {}", time),
            url_id: video_id.to_string(),
            title: "Title".to_string(),
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

    #[test]
    fn test_push_mention_keeps_lists_parallel() {
        let mut attrs = EntityAttributes::default();
        attrs.push_mention(mention(1.0, "v1"));
        attrs.push_mention(mention(2.0, "v2"));

        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.text.len(), 2);
        assert_eq!(attrs.url_id.len(), 2);
        assert_eq!(attrs.frame_names.len(), 2);
        assert_eq!(attrs.frame_descriptions.len(), 2);
    }

    #[test]
    fn test_attach_frame_joins_on_same_index() {
        let mut attrs = EntityAttributes::default();
        attrs.push_mention(mention(1.0, "v1"));

        attrs.attach_frame(0, "frame0_0.jpg", "a slide");
        attrs.attach_frame(0, "frame30_1000.jpg", "a chart");

        assert_eq!(attrs.frame_names[0], "frame0_0.jpg; frame30_1000.jpg");
        assert_eq!(attrs.frame_descriptions[0], "a slide; a chart");
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn test_attach_frame_out_of_range_is_ignored() {
        let mut attrs = EntityAttributes::default();
        attrs.push_mention(mention(1.0, "v1"));
        attrs.attach_frame(5, "frame", "desc");
        assert_eq!(attrs.frame_names[0], "");
    }
}
