//! Error types for Skue.

use thiserror::Error;

/// Library-level error type for Skue operations.
#[derive(Error, Debug)]
pub enum SkueError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    UnsupportedUrl(String),

    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Video download failed: {0}")]
    DownloadFailed(String),

    #[error("Metadata fetch failed: {0}")]
    MetadataFailed(String),

    #[error("No transcript available: {0}")]
    TranscriptUnavailable(String),

    #[error("Video decode failed: {0}")]
    DecodeFailed(String),

    #[error("Entity extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Store write failed: {0}")]
    StoreWriteFailed(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Graph store error: {0}")]
    GraphStore(String),

    #[error("RAG error: {0}")]
    Rag(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),
}

impl SkueError {
    /// Map this error onto the status code reported by the ingestion and
    /// query surfaces.
    pub fn status_code(&self) -> u16 {
        match self {
            SkueError::InvalidInput(_) => 400,
            SkueError::UnsupportedUrl(_) => 415,
            SkueError::MissingConfiguration(_)
            | SkueError::UpstreamUnavailable(_)
            | SkueError::Config(_) => 424,
            _ => 500,
        }
    }
}

/// Result type alias for Skue operations.
pub type Result<T> = std::result::Result<T, SkueError>;
