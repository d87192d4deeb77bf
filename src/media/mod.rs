//! Media adapter for YouTube content.
//!
//! Classifies URLs, extracts video ids, and fetches video files, metadata,
//! playlists, and timed transcripts through a two-tier provider fallback.

mod captions;
mod invidious;
mod ytdlp;

pub use captions::fetch_timed_transcript;
pub use invidious::InvidiousProvider;
pub use ytdlp::YtDlpProvider;

use crate::error::{Result, SkueError};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

/// Kind of YouTube URL, decided by substring tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlKind {
    SingleVideo,
    Playlist,
    Shorts,
    Channel,
    Other,
}

impl std::fmt::Display for UrlKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlKind::SingleVideo => write!(f, "single_video"),
            UrlKind::Playlist => write!(f, "playlist"),
            UrlKind::Shorts => write!(f, "shorts"),
            UrlKind::Channel => write!(f, "channel"),
            UrlKind::Other => write!(f, "other"),
        }
    }
}

/// Classify a YouTube URL by its shape.
pub fn classify(url: &str) -> UrlKind {
    if url.contains("/shorts/") {
        UrlKind::Shorts
    } else if url.contains("playlist") && url.contains("list=") {
        UrlKind::Playlist
    } else if url.contains("/channel/") || url.contains("/user/") || url.contains("/@") {
        UrlKind::Channel
    } else if url.contains("watch?v=") || url.contains("youtu.be/") || url.contains("/embed/") {
        UrlKind::SingleVideo
    } else {
        UrlKind::Other
    }
}

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            (?:
                (?:https?://)?
                (?:www\.)?
                (?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/)
                ([a-zA-Z0-9_-]{11})
            )
            |
            ^([a-zA-Z0-9_-]{11})$
        ",
        )
        .expect("Invalid regex")
    })
}

/// Extract the 11-character video id from a URL or bare id.
pub fn extract_video_id(input: &str) -> Result<String> {
    let caps = video_id_regex()
        .captures(input.trim())
        .ok_or_else(|| SkueError::InvalidInput(format!("No video id found in URL: {}", input)))?;

    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| SkueError::InvalidInput(format!("No video id found in URL: {}", input)))
}

/// Canonical watch URL for a video id.
pub fn canonical_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Metadata of a single video, captured on first download and immutable after.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// 11-character video id.
    pub id: String,
    pub title: String,
    pub description: String,
    /// Upload date as YYYYMMDD.
    pub upload_date: String,
    pub duration_seconds: f64,
    pub uploader: String,
    pub uploader_url: String,
    pub thumbnail_url: String,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub view_count: u64,
    pub like_count: u64,
    pub age_limit: u32,
}

/// A single timed transcript item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptItem {
    /// Start offset in seconds.
    pub start_seconds: f64,
    pub text: String,
}

/// Trait for media providers. Each provider covers the full capability set
/// so the adapter can fall back wholesale.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Provider name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Download the video file into `dest_dir`, returning the file path.
    async fn download_video(&self, video_id: &str, dest_dir: &Path) -> Result<PathBuf>;

    /// Fetch the full metadata record for a video.
    async fn fetch_metadata(&self, video_id: &str) -> Result<VideoMetadata>;

    /// List the video URLs of a playlist, in order.
    async fn list_playlist(&self, url: &str, limit: usize) -> Result<Vec<String>>;
}

/// Two-tier media adapter: tries the primary provider, falls back to the
/// secondary, and reports a failure only when both fail.
pub struct MediaAdapter {
    primary: Box<dyn MediaProvider>,
    secondary: Box<dyn MediaProvider>,
    transcript_language: String,
}

impl MediaAdapter {
    pub fn new(
        primary: Box<dyn MediaProvider>,
        secondary: Box<dyn MediaProvider>,
        transcript_language: &str,
    ) -> Self {
        Self {
            primary,
            secondary,
            transcript_language: transcript_language.to_string(),
        }
    }

    /// Adapter with the default provider pair (yt-dlp, then Invidious).
    pub fn with_defaults(fallback_api_base: &str, transcript_language: &str) -> Self {
        Self::new(
            Box::new(YtDlpProvider::new()),
            Box::new(InvidiousProvider::new(fallback_api_base)),
            transcript_language,
        )
    }

    /// Download a video with fallback; `DownloadFailed` only if both providers fail.
    pub async fn download_video(&self, video_id: &str, dest_dir: &Path) -> Result<PathBuf> {
        match self.primary.download_video(video_id, dest_dir).await {
            Ok(path) => Ok(path),
            Err(e) => {
                warn!(
                    "Primary provider {} failed to download {}: {}",
                    self.primary.name(),
                    video_id,
                    e
                );
                self.secondary
                    .download_video(video_id, dest_dir)
                    .await
                    .map_err(|e2| {
                        SkueError::DownloadFailed(format!(
                            "{}: {}; {}: {}",
                            self.primary.name(),
                            e,
                            self.secondary.name(),
                            e2
                        ))
                    })
            }
        }
    }

    /// Fetch metadata with fallback; `MetadataFailed` only if both providers fail.
    pub async fn fetch_metadata(&self, video_id: &str) -> Result<VideoMetadata> {
        match self.primary.fetch_metadata(video_id).await {
            Ok(meta) => Ok(meta),
            Err(e) => {
                warn!(
                    "Primary provider {} failed to fetch metadata for {}: {}",
                    self.primary.name(),
                    video_id,
                    e
                );
                self.secondary.fetch_metadata(video_id).await.map_err(|e2| {
                    SkueError::MetadataFailed(format!(
                        "{}: {}; {}: {}",
                        self.primary.name(),
                        e,
                        self.secondary.name(),
                        e2
                    ))
                })
            }
        }
    }

    /// List the videos of a playlist, with fallback.
    pub async fn list_playlist_videos(&self, url: &str, limit: usize) -> Result<Vec<String>> {
        match self.primary.list_playlist(url, limit).await {
            Ok(urls) => Ok(urls),
            Err(e) => {
                warn!(
                    "Primary provider {} failed to list playlist: {}",
                    self.primary.name(),
                    e
                );
                self.secondary.list_playlist(url, limit).await
            }
        }
    }

    /// Fetch the timed transcript in the configured language.
    pub async fn fetch_transcript(&self, video_id: &str) -> Result<Vec<TranscriptItem>> {
        fetch_timed_transcript(video_id, &self.transcript_language).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            UrlKind::SingleVideo
        );
        assert_eq!(
            classify("https://youtube.com/playlist?list=PLtest"),
            UrlKind::Playlist
        );
        assert_eq!(classify("https://youtube.com/shorts/abc"), UrlKind::Shorts);
        assert_eq!(
            classify("https://youtube.com/channel/UCabc"),
            UrlKind::Channel
        );
        assert_eq!(classify("https://youtube.com/@someone"), UrlKind::Channel);
        assert_eq!(classify("https://example.com/video"), UrlKind::Other);
    }

    #[test]
    fn test_extract_video_id() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(extract_video_id("dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");

        assert!(extract_video_id("not-a-video-id").is_err());
        assert!(extract_video_id("").is_err());
    }

    #[test]
    fn test_extract_round_trips_canonical_url() {
        for id in ["dQw4w9WgXcQ", "AAAAAAAAAAA", "a-b_c-d_e-f", "0123456789_"] {
            assert_eq!(extract_video_id(&canonical_url(id)).unwrap(), id);
        }
    }
}
