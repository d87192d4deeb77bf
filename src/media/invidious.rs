//! Secondary media provider backed by an Invidious-compatible API.

use super::{canonical_url, MediaProvider, VideoMetadata};
use crate::error::{Result, SkueError};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};
use url::Url;

/// HTTP provider against an Invidious instance. Used when yt-dlp fails.
pub struct InvidiousProvider {
    client: reqwest::Client,
    api_base: String,
}

impl InvidiousProvider {
    pub fn new(api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn video_json(&self, video_id: &str) -> Result<serde_json::Value> {
        let url = format!("{}/api/v1/videos/{}", self.api_base, video_id);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(SkueError::MetadataFailed(format!(
                "Invidious returned {} for video {}",
                response.status(),
                video_id
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl MediaProvider for InvidiousProvider {
    fn name(&self) -> &'static str {
        "invidious"
    }

    #[instrument(skip(self, dest_dir), fields(video_id = %video_id))]
    async fn download_video(&self, video_id: &str, dest_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dest_dir)?;

        let json = self.video_json(video_id).await?;

        let stream_url = json["formatStreams"]
            .as_array()
            .and_then(|streams| streams.last())
            .and_then(|s| s["url"].as_str())
            .ok_or_else(|| {
                SkueError::DownloadFailed(format!("No muxed stream available for {}", video_id))
            })?;

        let target = dest_dir.join(format!("{}.mp4", video_id));

        let response = self.client.get(stream_url).send().await?;
        if !response.status().is_success() {
            return Err(SkueError::DownloadFailed(format!(
                "Stream fetch returned {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(&target, &bytes).await?;

        debug!("Downloaded {} bytes via Invidious", bytes.len());
        Ok(target)
    }

    #[instrument(skip(self), fields(video_id = %video_id))]
    async fn fetch_metadata(&self, video_id: &str) -> Result<VideoMetadata> {
        let json = self.video_json(video_id).await?;

        let upload_date = json["published"]
            .as_i64()
            .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single())
            .map(|dt| dt.format("%Y%m%d").to_string())
            .unwrap_or_default();

        let thumbnail_url = json["videoThumbnails"]
            .as_array()
            .and_then(|thumbs| thumbs.first())
            .and_then(|t| t["url"].as_str())
            .unwrap_or_default()
            .to_string();

        let tags = json["keywords"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        let categories = json["genre"]
            .as_str()
            .map(|g| vec![g.to_string()])
            .unwrap_or_default();

        Ok(VideoMetadata {
            id: video_id.to_string(),
            title: json["title"].as_str().unwrap_or("Unknown Title").to_string(),
            description: json["description"].as_str().unwrap_or_default().to_string(),
            upload_date,
            duration_seconds: json["lengthSeconds"].as_f64().unwrap_or(0.0),
            uploader: json["author"].as_str().unwrap_or_default().to_string(),
            uploader_url: json["authorUrl"]
                .as_str()
                .map(|p| format!("https://www.youtube.com{}", p))
                .unwrap_or_default(),
            thumbnail_url,
            tags,
            categories,
            view_count: json["viewCount"].as_u64().unwrap_or(0),
            like_count: json["likeCount"].as_u64().unwrap_or(0),
            age_limit: if json["ageRestricted"].as_bool().unwrap_or(false) {
                18
            } else {
                0
            },
        })
    }

    #[instrument(skip(self))]
    async fn list_playlist(&self, url: &str, limit: usize) -> Result<Vec<String>> {
        let parsed = Url::parse(url)
            .map_err(|e| SkueError::InvalidInput(format!("Invalid playlist URL: {}", e)))?;

        let playlist_id = parsed
            .query_pairs()
            .find(|(k, _)| k == "list")
            .map(|(_, v)| v.to_string())
            .ok_or_else(|| {
                SkueError::InvalidInput("Playlist URL has no 'list' parameter".to_string())
            })?;

        let api_url = format!("{}/api/v1/playlists/{}", self.api_base, playlist_id);
        let response = self.client.get(&api_url).send().await?;

        if !response.status().is_success() {
            return Err(SkueError::MetadataFailed(format!(
                "Invidious returned {} for playlist {}",
                response.status(),
                playlist_id
            )));
        }

        let json: serde_json::Value = response.json().await?;

        let urls: Vec<String> = json["videos"]
            .as_array()
            .map(|videos| {
                videos
                    .iter()
                    .take(limit)
                    .filter_map(|v| v["videoId"].as_str())
                    .map(canonical_url)
                    .collect()
            })
            .unwrap_or_default();

        Ok(urls)
    }
}
