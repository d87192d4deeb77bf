//! Configuration module for Skue.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{
    CaptionPrompts, ChunkingPrompts, GraphPrompts, Prompts, RagPrompts, RefinePrompts,
    RouterPrompts, TopicPrompts,
};
pub use settings::{
    ChunkingSettings, EmbeddingSettings, FrameSettings, GeneralSettings, GraphStoreSettings,
    MediaSettings, PromptSettings, RagSettings, RefinerSettings, RouterSettings, Settings,
    TopicSettings, VectorStoreSettings, VIDEO_ID_TOKEN,
};
