//! Ingestion pipeline orchestrator.
//!
//! Validates inputs, sequences the per-video phases (download, metadata,
//! frames, transcript, topic, chunking, embedding, stores), skips already
//! processed ids, and surfaces structured `(status_code, message)` outcomes.

use crate::chunking::{create_chunker, Chunk, ChunkingConfig, ChunkingStrategy};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, SkueError};
use crate::frames::{
    dedup_frames, extract_frames, write_descriptions_csv, ClipVisualEmbedder, FrameDescriber,
    FrameDescription,
};
use crate::graph::{GraphExtractor, GraphStore, MentionAttrs, SqliteGraphStore};
use crate::media::{classify, extract_video_id, MediaAdapter, UrlKind, VideoMetadata};
use crate::topics::{TopicInducer, TopicRegistry};
use crate::transcript::{to_marked_text, TranscriptRefiner};
use crate::vector_store::{write_chunks_csv, Document, SqliteVectorStore, VectorStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Options of one ingestion request.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub chunk_max_length: usize,
    pub chunk_overlap_length: usize,
    pub seconds_between_frames: u32,
    pub max_limit_similarity: f32,
    pub local_model: bool,
    pub enabled_detailed_chunking: bool,
    /// Override of the configured embedding model.
    pub embedding_model: Option<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunk_max_length: 550,
            chunk_overlap_length: 50,
            seconds_between_frames: 120,
            max_limit_similarity: 0.85,
            local_model: false,
            enabled_detailed_chunking: false,
            embedding_model: None,
        }
    }
}

/// Structured pipeline outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub status_code: u16,
    pub message: String,
}

impl IngestOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            message: message.into(),
        }
    }

    fn from_error(e: &SkueError) -> Self {
        Self {
            status_code: e.status_code(),
            message: e.to_string(),
        }
    }
}

/// Validate the request parameters, fail-fast with distinct messages.
pub fn validate_options(options: &IngestOptions) -> Result<()> {
    if options.chunk_max_length < 1 {
        return Err(SkueError::InvalidInput(
            "The chunk_max_length parameter must be at least 1!".to_string(),
        ));
    }
    if options.chunk_overlap_length < 1 {
        return Err(SkueError::InvalidInput(
            "The chunk_overlap_length parameter must be at least 1!".to_string(),
        ));
    }
    if options.chunk_max_length < options.chunk_overlap_length {
        return Err(SkueError::InvalidInput(
            "The chunk_max_length parameter cannot be below the chunk_overlap_length parameter!"
                .to_string(),
        ));
    }
    if options.seconds_between_frames < 1 {
        return Err(SkueError::InvalidInput(
            "The seconds_between_frames parameter must be at least 1!".to_string(),
        ));
    }
    if !(0.1..=1.0).contains(&options.max_limit_similarity) {
        return Err(SkueError::InvalidInput(
            "The max_limit_similarity parameter must be between 0.1 and 1.0!".to_string(),
        ));
    }
    Ok(())
}

/// On-disk layout of one video's artifacts. The presence of `root` is the
/// ingestion ledger.
struct VideoPaths {
    root: PathBuf,
    video_dir: PathBuf,
    frames_dir: PathBuf,
    frames_description_csv: PathBuf,
    transcript_txt: PathBuf,
    chunks_csv: PathBuf,
}

impl VideoPaths {
    fn new(root: PathBuf, video_id: &str) -> Self {
        Self {
            video_dir: root.join("video"),
            frames_dir: root.join("frames"),
            frames_description_csv: root.join("frames_description").join("frame_descriptions.csv"),
            transcript_txt: root.join("transcripts").join(format!("{}.txt", video_id)),
            chunks_csv: root
                .join("transcripts_chunks")
                .join(format!("{}.csv", video_id)),
            root,
        }
    }
}

/// The main orchestrator for the Skue ingestion pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    adapter: MediaAdapter,
    vector_store: Arc<SqliteVectorStore>,
    graph_store: Arc<SqliteGraphStore>,
    llm_preflight: bool,
}

impl Orchestrator {
    /// Create a new orchestrator with default components.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let adapter = MediaAdapter::with_defaults(
            &settings.media.fallback_api_base,
            &settings.media.transcript_language,
        );

        let vector_store = Arc::new(SqliteVectorStore::new(&settings.vector_db_path())?);
        let graph_store = Arc::new(SqliteGraphStore::new(&settings.graph_db_path())?);

        Ok(Self {
            settings,
            prompts,
            adapter,
            vector_store,
            graph_store,
            llm_preflight: true,
        })
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        adapter: MediaAdapter,
        vector_store: Arc<SqliteVectorStore>,
        graph_store: Arc<SqliteGraphStore>,
    ) -> Self {
        Self {
            settings,
            prompts,
            adapter,
            vector_store,
            graph_store,
            llm_preflight: true,
        }
    }

    /// Disable the LLM reachability preflight (used by tests).
    pub fn skip_llm_preflight(mut self) -> Self {
        self.llm_preflight = false;
        self
    }

    /// Get a reference to the vector store (as trait object).
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone() as Arc<dyn VectorStore>
    }

    /// Get a reference to the graph store (as trait object).
    pub fn graph_store(&self) -> Arc<dyn GraphStore> {
        self.graph_store.clone() as Arc<dyn GraphStore>
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the prompts.
    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    /// API base for LLM calls under the given options.
    fn api_base(&self, options: &IngestOptions) -> Option<String> {
        if options.local_model {
            self.settings.local_api_base().map(|s| s.to_string())
        } else {
            None
        }
    }

    /// Ingest a video or playlist URL.
    #[instrument(skip(self, options), fields(url = %url))]
    pub async fn ingest(&self, url: &str, options: IngestOptions) -> IngestOutcome {
        if let Err(e) = validate_options(&options) {
            return IngestOutcome::from_error(&e);
        }

        if let Err(e) = self.check_credentials(&options) {
            return IngestOutcome::from_error(&e);
        }

        let kind = classify(url);
        match kind {
            UrlKind::Shorts => {
                return IngestOutcome::from_error(&SkueError::UnsupportedUrl(
                    "The URL is a shorts video. Only regular videos and playlists are supported."
                        .to_string(),
                ));
            }
            UrlKind::Channel => {
                return IngestOutcome::from_error(&SkueError::UnsupportedUrl(
                    "The URL is a channel. Only regular videos and playlists are supported."
                        .to_string(),
                ));
            }
            UrlKind::Other => {
                return IngestOutcome::from_error(&SkueError::InvalidInput(format!(
                    "The URL is not a YouTube video or playlist: {}",
                    url
                )));
            }
            UrlKind::SingleVideo | UrlKind::Playlist => {}
        }

        if let Err(e) = self.check_llm_reachable(&options).await {
            return IngestOutcome::from_error(&e);
        }

        let urls = match kind {
            UrlKind::Playlist => {
                match self
                    .adapter
                    .list_playlist_videos(url, self.settings.media.playlist_limit)
                    .await
                {
                    Ok(urls) if urls.is_empty() => {
                        return IngestOutcome {
                            status_code: 500,
                            message: "The playlist contains no videos.".to_string(),
                        };
                    }
                    Ok(urls) => urls,
                    Err(e) => return IngestOutcome::from_error(&e),
                }
            }
            _ => vec![url.to_string()],
        };

        let single = urls.len() == 1 && kind == UrlKind::SingleVideo;
        let mut reports: Vec<String> = Vec::new();
        let mut first_error: Option<SkueError> = None;
        let mut any_success = false;
        let mut all_skipped = true;

        for (i, video_url) in urls.iter().enumerate() {
            match self.ingest_video(video_url, &options).await {
                Ok(VideoResult { title, skipped, .. }) => {
                    any_success = true;
                    if !skipped {
                        all_skipped = false;
                    }
                    if skipped {
                        reports.push(format!("{}. {} (already processed)", i + 1, title));
                    } else {
                        reports.push(format!("{}. {}", i + 1, title));
                    }
                }
                Err(e) => {
                    all_skipped = false;
                    error!("Video {} failed: {}", video_url, e);
                    reports.push(format!("{}. {}: failed ({})", i + 1, video_url, e));
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if single {
            return match (any_success, all_skipped, first_error) {
                (true, true, _) => IngestOutcome::ok("YouTube content was already processed."),
                (true, false, _) => {
                    // Strip the list numbering for the single-video message.
                    let title = reports
                        .first()
                        .map(|r| r.splitn(2, ". ").nth(1).unwrap_or(r).to_string())
                        .unwrap_or_default();
                    IngestOutcome::ok(title)
                }
                (false, _, Some(e)) => IngestOutcome::from_error(&e),
                (false, _, None) => IngestOutcome::ok(String::new()),
            };
        }

        // Playlist report: per-video statuses are recorded and the run
        // continues past recoverable per-video failures.
        match (any_success, first_error) {
            (false, Some(e)) => IngestOutcome::from_error(&e),
            _ => IngestOutcome::ok(reports.join("\n")),
        }
    }

    /// Check that LLM credentials are configured (424 when missing).
    fn check_credentials(&self, options: &IngestOptions) -> Result<()> {
        if options.local_model {
            if self.settings.local_api_base().is_none() {
                return Err(SkueError::MissingConfiguration(
                    "local_model is set but no local API base is configured \
                     (set SKUE_API_BASE or prompts.local_api_base)"
                        .to_string(),
                ));
            }
            return Ok(());
        }

        match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(()),
            _ => Err(SkueError::MissingConfiguration(
                "OPENAI_API_KEY is not set and local_model is disabled".to_string(),
            )),
        }
    }

    /// Check that the LLM endpoint answers at all (424 when unreachable).
    async fn check_llm_reachable(&self, options: &IngestOptions) -> Result<()> {
        if !self.llm_preflight {
            return Ok(());
        }

        let base = self
            .api_base(options)
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let url = format!("{}/models", base.trim_end_matches('/'));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        // Any HTTP response counts as reachable; only transport failures
        // mean the provider is down.
        match client.get(&url).send().await {
            Ok(_) => Ok(()),
            Err(e) => Err(SkueError::UpstreamUnavailable(format!(
                "LLM endpoint {} is unreachable: {}",
                url, e
            ))),
        }
    }

    /// Ingest a single video URL. Errors abort this video only; its partial
    /// artifacts are removed so the ledger stays consistent.
    #[instrument(skip(self, options), fields(url = %video_url))]
    async fn ingest_video(&self, video_url: &str, options: &IngestOptions) -> Result<VideoResult> {
        let video_id = extract_video_id(video_url)?;
        let media_dir = self.settings.media_dir(&video_id);

        if media_dir.exists() {
            info!("Video {} already processed, skipping", video_id);
            return Ok(VideoResult {
                title: video_id.clone(),
                video_id,
                skipped: true,
            });
        }

        let paths = VideoPaths::new(media_dir, &video_id);

        match self.run_phases(&video_id, &paths, options).await {
            Ok(title) => Ok(VideoResult {
                video_id,
                title,
                skipped: false,
            }),
            Err(e) => {
                // A failed video must not leave a ledger entry behind.
                if paths.root.exists() {
                    if let Err(cleanup) = std::fs::remove_dir_all(&paths.root) {
                        warn!("Failed to clean up {:?}: {}", paths.root, cleanup);
                    }
                }
                Err(e)
            }
        }
    }

    /// The per-video phase sequence.
    async fn run_phases(
        &self,
        video_id: &str,
        paths: &VideoPaths,
        options: &IngestOptions,
    ) -> Result<String> {
        let api_base = self.api_base(options);
        let api_base_ref = api_base.as_deref();

        // Download (with provider fallback)
        info!("Downloading video {}", video_id);
        let video_path = self
            .adapter
            .download_video(video_id, &paths.video_dir)
            .await?;

        // Metadata (with provider fallback)
        info!("Fetching metadata for {}", video_id);
        let metadata = self.adapter.fetch_metadata(video_id).await?;
        info!("Title: {}", metadata.title);

        // Frames: extract, dedup, caption
        info!("Extracting frames");
        let frames = extract_frames(
            &video_path,
            &paths.frames_dir,
            options.seconds_between_frames,
        )
        .await?;

        let frames = if frames.len() > 1 {
            let visual = ClipVisualEmbedder::new()?;
            dedup_frames(frames, &visual, options.max_limit_similarity)?
        } else {
            frames
        };

        let mut describer = FrameDescriber::new(
            &self.settings.frames.caption_model,
            self.prompts.clone(),
            api_base_ref,
            self.settings.frames.requests_per_pause,
            self.settings.frames.pause_seconds,
        );
        let descriptions = describer.describe_frames(video_id, &frames).await?;
        write_descriptions_csv(&descriptions, &paths.frames_description_csv)?;

        // Transcript: fetch, refine, persist
        info!("Fetching transcript");
        let items = self.adapter.fetch_transcript(video_id).await?;
        let marked = to_marked_text(&items);

        let mut refiner = TranscriptRefiner::new(
            &self.settings.refiner.model,
            self.settings.refiner.max_segment_length,
            self.prompts.clone(),
            api_base_ref,
            self.settings.refiner.requests_per_pause,
            self.settings.refiner.pause_seconds,
        );
        let refined = refiner.refine(&marked).await?;

        if let Some(parent) = paths.transcript_txt.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&paths.transcript_txt, &refined)?;

        // Topic induction
        info!("Inducing topic");
        let mut registry = TopicRegistry::load(&self.settings.topic_overview_path())?;
        let inducer = TopicInducer::new(
            &self.settings.topics.model,
            self.settings.topics.preview_chars,
            self.prompts.clone(),
            api_base_ref,
        );
        let topic = inducer
            .induce(&metadata.title, &refined, &registry.labels())
            .await?;
        registry.append(video_id, &topic)?;

        // Chunking
        info!("Chunking transcript");
        let strategy = if options.enabled_detailed_chunking {
            ChunkingStrategy::LlmDirected
        } else {
            ChunkingStrategy::SentenceMerge
        };

        let mut chunker = create_chunker(
            strategy,
            self.prompts.clone(),
            &self.settings.chunking.model,
            self.settings.chunking.max_input_length_llm,
            api_base_ref,
            self.settings.chunking.requests_per_pause,
            self.settings.chunking.pause_seconds,
        );

        let config = ChunkingConfig {
            chunk_max_length: options.chunk_max_length,
            chunk_overlap_length: options.chunk_overlap_length,
        };
        let chunks = chunker.chunk(&refined, &config).await?;
        info!("Created {} chunks", chunks.len());

        // Embedding
        let embedding_model = options
            .embedding_model
            .clone()
            .unwrap_or_else(|| self.settings.embedding.model.clone());
        let embedder = OpenAIEmbedder::with_config(
            &embedding_model,
            self.settings.embedding.dimensions as usize,
            api_base_ref,
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        // Vector store write (replace-by-id idempotence)
        let documents: Vec<Document> = chunks
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (chunk, embedding))| {
                Document::from_chunk(chunk, i, &metadata, &topic, embedding)
            })
            .collect();

        self.vector_store.delete_by_video_id(video_id).await?;
        self.vector_store
            .upsert_batch(&documents)
            .await
            .map_err(|e| SkueError::StoreWriteFailed(e.to_string()))?;
        write_chunks_csv(&documents, &paths.chunks_csv)?;

        // Graph write
        info!("Writing entity graph");
        self.write_graph(&chunks, &metadata, &descriptions, options)
            .await?;

        Ok(metadata.title)
    }

    /// Graph phases: extraction, upsert, frame attachment, pruning.
    async fn write_graph(
        &self,
        chunks: &[Chunk],
        metadata: &VideoMetadata,
        descriptions: &[FrameDescription],
        options: &IngestOptions,
    ) -> Result<()> {
        let api_base = self.api_base(options);

        let mut extractor = GraphExtractor::new(
            &self.settings.graph_store.extraction_model,
            self.prompts.clone(),
            api_base.as_deref(),
            self.settings.graph_store.requests_per_pause,
            self.settings.graph_store.pause_seconds,
        );

        for chunk in chunks {
            let extracted = extractor.extract_chunk(&chunk.text).await?;
            let mention = MentionAttrs::from_chunk(chunk, metadata);

            for node in &extracted.nodes {
                self.graph_store
                    .merge_mention(node, mention.clone())
                    .await
                    .map_err(|e| SkueError::StoreWriteFailed(e.to_string()))?;
            }

            for rel in &extracted.relationships {
                self.graph_store
                    .merge_relationship(&rel.source, &rel.rel_type, &rel.target)
                    .await
                    .map_err(|e| SkueError::StoreWriteFailed(e.to_string()))?;
            }
        }

        for description in descriptions {
            let attached = self
                .graph_store
                .attach_frame(
                    &metadata.id,
                    description.time_in_s,
                    &description.file_name,
                    &description.description,
                )
                .await?;
            if !attached {
                warn!(
                    "No graph mention found for frame {} of {}",
                    description.file_name, metadata.id
                );
            }
        }

        self.graph_store.prune_isolated().await?;
        Ok(())
    }
}

/// Result of ingesting one video.
#[derive(Debug)]
struct VideoResult {
    #[allow(dead_code)]
    video_id: String,
    title: String,
    skipped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{InvidiousProvider, YtDlpProvider};
    use std::sync::Mutex;

    /// Serializes tests that read or mutate process environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn test_orchestrator(data_dir: &std::path::Path) -> Orchestrator {
        let mut settings = Settings::default();
        settings.general.processed_videos_path = data_dir
            .join("media")
            .join("_video_id_")
            .to_string_lossy()
            .to_string();
        settings.general.topic_overview_path = data_dir
            .join("topic_overview.csv")
            .to_string_lossy()
            .to_string();

        let adapter = MediaAdapter::new(
            Box::new(YtDlpProvider::new()),
            Box::new(InvidiousProvider::new("http://127.0.0.1:1")),
            "en",
        );

        Orchestrator::with_components(
            settings,
            Prompts::default(),
            adapter,
            Arc::new(SqliteVectorStore::in_memory().unwrap()),
            Arc::new(SqliteGraphStore::in_memory().unwrap()),
        )
        .skip_llm_preflight()
    }

    #[test]
    fn test_validate_rejects_overlap_above_max() {
        let options = IngestOptions {
            chunk_max_length: 100,
            chunk_overlap_length: 150,
            ..Default::default()
        };

        let err = validate_options(&options).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains(
            "chunk_max_length parameter cannot be below the chunk_overlap_length parameter!"
        ));
    }

    #[test]
    fn test_validate_boundary_values() {
        let equal = IngestOptions {
            chunk_max_length: 50,
            chunk_overlap_length: 50,
            ..Default::default()
        };
        assert!(validate_options(&equal).is_ok());

        let zero_interval = IngestOptions {
            seconds_between_frames: 0,
            ..Default::default()
        };
        assert_eq!(
            validate_options(&zero_interval).unwrap_err().status_code(),
            400
        );

        let low_similarity = IngestOptions {
            max_limit_similarity: 0.05,
            ..Default::default()
        };
        assert_eq!(
            validate_options(&low_similarity).unwrap_err().status_code(),
            400
        );
    }

    #[tokio::test]
    async fn test_shorts_url_is_rejected_with_415() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("OPENAI_API_KEY", "test-key");
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());

        let outcome = orchestrator
            .ingest("https://youtube.com/shorts/abc", IngestOptions::default())
            .await;

        assert_eq!(outcome.status_code, 415);
        assert!(outcome.message.starts_with("The URL is a shorts video."));
    }

    #[tokio::test]
    async fn test_channel_url_is_rejected_with_415() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("OPENAI_API_KEY", "test-key");
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());

        let outcome = orchestrator
            .ingest("https://youtube.com/@somecreator", IngestOptions::default())
            .await;

        assert_eq!(outcome.status_code, 415);
    }

    #[tokio::test]
    async fn test_invalid_parameters_reported_before_url() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());

        let options = IngestOptions {
            chunk_max_length: 100,
            chunk_overlap_length: 150,
            ..Default::default()
        };

        let outcome = orchestrator
            .ingest("https://youtube.com/shorts/abc", options)
            .await;

        assert_eq!(outcome.status_code, 400);
    }

    #[tokio::test]
    async fn test_already_processed_video_is_skipped() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("OPENAI_API_KEY", "test-key");
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());

        // Seed the ledger: the media directory exists.
        std::fs::create_dir_all(dir.path().join("media").join("VIDEOID00AB")).unwrap();

        let outcome = orchestrator
            .ingest(
                "https://www.youtube.com/watch?v=VIDEOID00AB",
                IngestOptions::default(),
            )
            .await;

        assert_eq!(outcome.status_code, 200);
        assert_eq!(outcome.message, "YouTube content was already processed.");
    }

    #[tokio::test]
    async fn test_missing_credentials_yield_424() {
        let _guard = ENV_LOCK.lock().unwrap();
        let previous = std::env::var("OPENAI_API_KEY").ok();
        std::env::remove_var("OPENAI_API_KEY");

        let dir = tempfile::tempdir().unwrap();
        let orchestrator = test_orchestrator(dir.path());

        let outcome = orchestrator
            .ingest(
                "https://www.youtube.com/watch?v=VIDEOID00AB",
                IngestOptions::default(),
            )
            .await;

        assert_eq!(outcome.status_code, 424);

        if let Some(key) = previous {
            std::env::set_var("OPENAI_API_KEY", key);
        }
    }
}
