//! CLI module for Skue.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Skue - YouTube Video Knowledge Base and RAG
///
/// Ingests YouTube videos into a multimodal knowledge base (transcript
/// chunks, frames, topics, entity graph) and answers questions about them.
/// The name "Skue" comes from the Norwegian word for "behold" or "watch."
#[derive(Parser, Debug)]
#[command(name = "skue")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Skue and verify system requirements
    Init,

    /// Check system requirements and configuration
    Doctor,

    /// Ingest a YouTube video or playlist into the knowledge base
    Analyze {
        /// YouTube video or playlist URL
        url: String,

        /// Maximum chunk length in characters
        #[arg(long, default_value = "550")]
        chunk_max_length: usize,

        /// Characters of overlap between consecutive chunks
        #[arg(long, default_value = "50")]
        chunk_overlap_length: usize,

        /// Wall-clock seconds between sampled frames
        #[arg(long, default_value = "120")]
        seconds_between_frames: u32,

        /// Similarity threshold above which frames are dropped (0.1-1.0)
        #[arg(long, default_value = "0.85")]
        max_limit_similarity: f32,

        /// Use a local OpenAI-compatible server for LLM calls
        #[arg(long)]
        local_model: bool,

        /// Use LLM-directed chunking instead of sentence merging
        #[arg(long)]
        detailed_chunking: bool,

        /// Embedding model override
        #[arg(long)]
        embedding_model: Option<String>,
    },

    /// Ask a question and get a grounded answer with sources
    Ask {
        /// The question to ask
        question: String,

        /// Generation model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Knowledge base (topic collection) to search
        #[arg(short, long)]
        knowledge_base: Option<String>,

        /// Store to retrieve from: vector, graph, or all
        #[arg(short, long, default_value = "vector")]
        database: String,

        /// Select the knowledge base by LLM classification
        #[arg(long)]
        logical_routing: bool,

        /// Select the prompt template by embedding similarity
        #[arg(long)]
        semantic_routing: bool,
    },

    /// Start an interactive chat session
    Chat {
        /// Generation model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Select the knowledge base by LLM classification
        #[arg(long)]
        logical_routing: bool,

        /// Select the prompt template by embedding similarity
        #[arg(long)]
        semantic_routing: bool,
    },

    /// Search for relevant transcript chunks
    Search {
        /// Search query
        query: String,

        /// Knowledge base (topic collection) to search
        #[arg(short, long)]
        knowledge_base: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// List ingested videos and their topics
    List,

    /// List available model ids from the configured provider
    Models,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
