//! Configuration settings for Skue.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Marker replaced by the video id in the processed-videos path template.
pub const VIDEO_ID_TOKEN: &str = "_video_id_";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub media: MediaSettings,
    pub frames: FrameSettings,
    pub refiner: RefinerSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub topics: TopicSettings,
    pub vector_store: VectorStoreSettings,
    pub graph_store: GraphStoreSettings,
    pub rag: RagSettings,
    pub router: RouterSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Per-video data directory template; must contain `_video_id_`.
    /// The presence of this directory is the ingestion ledger.
    pub processed_videos_path: String,
    /// Path of the topic registry CSV.
    pub topic_overview_path: String,
    /// Optional log file; also settable via LOG_FILE_PATH.
    pub log_file_path: Option<String>,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            processed_videos_path: "~/.skue/media/_video_id_".to_string(),
            topic_overview_path: "~/.skue/topic_overview.csv".to_string(),
            log_file_path: None,
            log_level: "info".to_string(),
        }
    }
}

/// Media adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    /// Preferred transcript language code.
    pub transcript_language: String,
    /// Base URL of the secondary (Invidious-compatible) provider.
    pub fallback_api_base: String,
    /// Maximum number of videos taken from a playlist.
    pub playlist_limit: usize,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            transcript_language: "en".to_string(),
            fallback_api_base: "https://inv.nadeko.net".to_string(),
            playlist_limit: 50,
        }
    }
}

/// Frame extraction, dedup, and captioning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSettings {
    /// Wall-clock sampling interval between frames.
    pub seconds_between_frames: u32,
    /// Frames whose rescaled cosine similarity against the running
    /// reference is at or above this value are dropped.
    pub max_limit_similarity: f32,
    /// Vision model used for captions.
    pub caption_model: String,
    /// Remote requests before pausing.
    pub requests_per_pause: u32,
    /// Pause duration in seconds.
    pub pause_seconds: u64,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            seconds_between_frames: 120,
            max_limit_similarity: 0.85,
            caption_model: "gpt-4o-mini".to_string(),
            requests_per_pause: 10,
            pause_seconds: 60,
        }
    }
}

/// Transcript refiner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinerSettings {
    /// Maximum characters per refinement segment.
    pub max_segment_length: usize,
    /// Model used for grammar/punctuation repair.
    pub model: String,
    /// Remote requests before pausing.
    pub requests_per_pause: u32,
    /// Pause duration in seconds.
    pub pause_seconds: u64,
}

impl Default for RefinerSettings {
    fn default() -> Self {
        Self {
            max_segment_length: 3000,
            model: "gpt-4o-mini".to_string(),
            requests_per_pause: 10,
            pause_seconds: 60,
        }
    }
}

/// Content chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum chunk length in characters (before overlap).
    pub chunk_max_length: usize,
    /// Characters of overlap prepended from the previous chunk.
    pub chunk_overlap_length: usize,
    /// Maximum characters sent to the LLM chunker per window.
    pub max_input_length_llm: usize,
    /// Model used for LLM-directed chunking.
    pub model: String,
    /// Remote requests before pausing.
    pub requests_per_pause: u32,
    /// Pause duration in seconds.
    pub pause_seconds: u64,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_max_length: 550,
            chunk_overlap_length: 50,
            max_input_length_llm: 8000,
            model: "gpt-4o-mini".to_string(),
            requests_per_pause: 10,
            pause_seconds: 60,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions (fixed across a knowledge base).
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Topic induction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicSettings {
    /// Model used for topic labeling and label dedup.
    pub model: String,
    /// Characters of refined transcript included in the labeling prompt.
    pub preview_chars: usize,
}

impl Default for TopicSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            preview_chars: 500,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Path to the SQLite database backing the vector collections.
    pub sqlite_path: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.skue/vectors.db".to_string(),
        }
    }
}

/// Graph store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphStoreSettings {
    /// Path to the SQLite database backing the entity graph.
    pub sqlite_path: String,
    /// Model used for entity/relationship extraction.
    pub extraction_model: String,
    /// Remote requests before pausing.
    pub requests_per_pause: u32,
    /// Pause duration in seconds.
    pub pause_seconds: u64,
}

impl Default for GraphStoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.skue/graph.db".to_string(),
            extraction_model: "gpt-4o-mini".to_string(),
            requests_per_pause: 14,
            pause_seconds: 50,
        }
    }
}

/// RAG query pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// LLM model for answer generation.
    pub model: String,
    /// Candidates retrieved from the vector store.
    pub vectorstore_top_k: usize,
    /// Passages kept after reranking.
    pub reranking_top_k: usize,
    /// Reranker selection: cross-encoder, embedding, or bm25.
    pub reranker: String,
    /// Sampling temperature in [0, 1].
    pub temperature: f32,
    /// Nucleus sampling in [0, 1].
    pub top_p: f32,
    /// Top-k sampling, >= 0 (forwarded only to providers that accept it).
    pub top_k: u32,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            vectorstore_top_k: 25,
            reranking_top_k: 5,
            reranker: "cross-encoder".to_string(),
            temperature: 0.8,
            top_p: 0.9,
            top_k: 40,
        }
    }
}

/// Router settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Select the knowledge base by LLM classification over known subjects.
    pub use_logical_routing: bool,
    /// Select the prompt template by embedding similarity.
    pub use_semantic_routing: bool,
    /// Model used for logical routing.
    pub model: String,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            use_logical_routing: false,
            use_semantic_routing: false,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
    /// Base URL of a local OpenAI-compatible server, used when the
    /// pipeline runs with local models.
    pub local_api_base: Option<String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    /// Environment variables override the file for deployment-critical paths.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Settings>(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PROCESSED_VIDEOS_PATH") {
            self.general.processed_videos_path = v;
        }
        if let Ok(v) = std::env::var("TOPIC_OVERVIEW_PATH") {
            self.general.topic_overview_path = v;
        }
        if let Ok(v) = std::env::var("LOG_FILE_PATH") {
            self.general.log_file_path = Some(v);
        }
        if let Ok(v) = std::env::var("GRAPH_DB_PATH") {
            self.graph_store.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("SKUE_API_BASE") {
            self.prompts.local_api_base = Some(v);
        }
    }

    fn validate(&self) -> crate::error::Result<()> {
        if !self.general.processed_videos_path.contains(VIDEO_ID_TOKEN) {
            return Err(crate::error::SkueError::Config(format!(
                "processed_videos_path must contain the '{}' marker",
                VIDEO_ID_TOKEN
            )));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SkueError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skue")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Per-video data directory; its presence is the ingestion ledger.
    pub fn media_dir(&self, video_id: &str) -> PathBuf {
        Self::expand_path(
            &self
                .general
                .processed_videos_path
                .replace(VIDEO_ID_TOKEN, video_id),
        )
    }

    /// Get the expanded topic registry path.
    pub fn topic_overview_path(&self) -> PathBuf {
        Self::expand_path(&self.general.topic_overview_path)
    }

    /// Get the expanded vector store database path.
    pub fn vector_db_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }

    /// Get the expanded graph store database path.
    pub fn graph_db_path(&self) -> PathBuf {
        Self::expand_path(&self.graph_store.sqlite_path)
    }

    /// API base for LLM calls when running with local models.
    pub fn local_api_base(&self) -> Option<&str> {
        self.prompts.local_api_base.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pipeline_contract() {
        let s = Settings::default();
        assert_eq!(s.chunking.chunk_max_length, 550);
        assert_eq!(s.chunking.chunk_overlap_length, 50);
        assert_eq!(s.frames.seconds_between_frames, 120);
        assert!((s.frames.max_limit_similarity - 0.85).abs() < f32::EPSILON);
        assert_eq!(s.rag.vectorstore_top_k, 25);
        assert_eq!(s.rag.reranking_top_k, 5);
    }

    #[test]
    fn test_media_dir_substitutes_video_id() {
        let s = Settings::default();
        let dir = s.media_dir("dQw4w9WgXcQ");
        assert!(dir.to_string_lossy().ends_with("media/dQw4w9WgXcQ"));
    }

    #[test]
    fn test_template_without_marker_rejected() {
        let mut s = Settings::default();
        s.general.processed_videos_path = "/data/media".to_string();
        assert!(s.validate().is_err());
    }
}
