//! Skue - YouTube Video Knowledge Base and RAG
//!
//! A CLI tool and HTTP service that ingests YouTube videos into a multimodal
//! knowledge base and answers questions about their content.
//!
//! The name "Skue" comes from the Norwegian word for "behold" or "watch."
//!
//! # Overview
//!
//! Skue allows you to:
//! - Ingest YouTube videos and playlists: transcript, frames, topics
//! - Build per-topic vector collections and an entity/relationship graph
//! - Ask questions and stream AI-generated answers grounded in the content
//! - Route questions to the right knowledge base and prompt template
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management and prompt templates
//! - `media` - YouTube media adapter (download, metadata, transcripts)
//! - `frames` - Frame extraction, perceptual dedup, vision captions
//! - `transcript` - Timestamped transcript refinement
//! - `chunking` - Time-anchored chunking strategies
//! - `embedding` - Embedding generation
//! - `topics` - Topic induction and the topic registry
//! - `vector_store` - Per-topic vector collections
//! - `graph` - Entity/relationship extraction and graph storage
//! - `rag` - Routing, retrieval, reranking, and answer generation
//! - `orchestrator` - Ingestion pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use skue::config::Settings;
//! use skue::orchestrator::{IngestOptions, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let outcome = orchestrator
//!         .ingest("https://www.youtube.com/watch?v=dQw4w9WgXcQ", IngestOptions::default())
//!         .await;
//!     println!("{}: {}", outcome.status_code, outcome.message);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod frames;
pub mod graph;
pub mod media;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod topics;
pub mod transcript;
pub mod vector_store;

pub use error::{Result, SkueError};
