//! Primary media provider backed by yt-dlp.

use super::{canonical_url, extract_video_id, MediaProvider, VideoMetadata};
use crate::error::{Result, SkueError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// yt-dlp subprocess provider.
pub struct YtDlpProvider;

impl YtDlpProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for YtDlpProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a subprocess spawn error onto the provider error space.
fn spawn_error(e: std::io::Error) -> SkueError {
    if e.kind() == std::io::ErrorKind::NotFound {
        SkueError::ToolNotFound("yt-dlp".to_string())
    } else {
        SkueError::ToolFailed(format!("yt-dlp execution failed: {}", e))
    }
}

/// Locate the downloaded video file by id prefix.
fn find_video_file(dir: &Path, video_id: &str) -> Result<PathBuf> {
    for ext in &["mp4", "webm", "mkv"] {
        let candidate = dir.join(format!("{}.{}", video_id, ext));
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| SkueError::DownloadFailed(format!("Cannot read directory: {}", e)))?;

    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().starts_with(video_id) {
            return Ok(entry.path());
        }
    }

    Err(SkueError::DownloadFailed(
        "Video file not found after download".into(),
    ))
}

#[async_trait]
impl MediaProvider for YtDlpProvider {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    #[instrument(skip(self, dest_dir), fields(video_id = %video_id))]
    async fn download_video(&self, video_id: &str, dest_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dest_dir)?;

        if let Ok(existing) = find_video_file(dest_dir, video_id) {
            info!("Using cached video file");
            return Ok(existing);
        }

        let template = dest_dir.join(format!("{}.%(ext)s", video_id));

        let output = Command::new("yt-dlp")
            .arg("--format")
            .arg("mp4/bestvideo+bestaudio/best")
            .arg("--output")
            .arg(template.to_str().unwrap_or_default())
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .arg(canonical_url(video_id))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(spawn_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SkueError::DownloadFailed(format!(
                "yt-dlp failed: {}",
                stderr
            )));
        }

        find_video_file(dest_dir, video_id)
    }

    #[instrument(skip(self), fields(video_id = %video_id))]
    async fn fetch_metadata(&self, video_id: &str) -> Result<VideoMetadata> {
        let output = Command::new("yt-dlp")
            .args([
                "--dump-json",
                "--no-download",
                "--no-warnings",
                &canonical_url(video_id),
            ])
            .output()
            .await
            .map_err(spawn_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SkueError::MetadataFailed(format!(
                "Video {} not found or unavailable: {}",
                video_id, stderr
            )));
        }

        let json: serde_json::Value = serde_json::from_str(&String::from_utf8_lossy(&output.stdout))
            .map_err(|e| SkueError::MetadataFailed(format!("Failed to parse yt-dlp output: {}", e)))?;

        let string_list = |key: &str| -> Vec<String> {
            json[key]
                .as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str().map(|s| s.to_string()))
                        .collect()
                })
                .unwrap_or_default()
        };

        Ok(VideoMetadata {
            id: video_id.to_string(),
            title: json["title"].as_str().unwrap_or("Unknown Title").to_string(),
            description: json["description"].as_str().unwrap_or_default().to_string(),
            upload_date: json["upload_date"].as_str().unwrap_or_default().to_string(),
            duration_seconds: json["duration"].as_f64().unwrap_or(0.0),
            uploader: json["uploader"]
                .as_str()
                .or_else(|| json["channel"].as_str())
                .unwrap_or_default()
                .to_string(),
            uploader_url: json["uploader_url"]
                .as_str()
                .or_else(|| json["channel_url"].as_str())
                .unwrap_or_default()
                .to_string(),
            thumbnail_url: json["thumbnail"].as_str().unwrap_or_default().to_string(),
            tags: string_list("tags"),
            categories: string_list("categories"),
            view_count: json["view_count"].as_u64().unwrap_or(0),
            like_count: json["like_count"].as_u64().unwrap_or(0),
            age_limit: json["age_limit"].as_u64().unwrap_or(0) as u32,
        })
    }

    #[instrument(skip(self))]
    async fn list_playlist(&self, url: &str, limit: usize) -> Result<Vec<String>> {
        let output = Command::new("yt-dlp")
            .args([
                "--dump-json",
                "--no-download",
                "--no-warnings",
                "--flat-playlist",
                "--playlist-end",
                &limit.to_string(),
                url,
            ])
            .output()
            .await
            .map_err(spawn_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SkueError::MetadataFailed(format!(
                "Failed to list playlist: {}",
                stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut urls = Vec::new();

        for line in stdout.lines() {
            if line.trim().is_empty() {
                continue;
            }

            if let Ok(json) = serde_json::from_str::<serde_json::Value>(line) {
                let id = json["id"]
                    .as_str()
                    .map(|s| s.to_string())
                    .or_else(|| json["url"].as_str().and_then(|u| extract_video_id(u).ok()));

                if let Some(video_id) = id {
                    urls.push(canonical_url(&video_id));
                }
            }
        }

        debug!("Playlist yielded {} videos", urls.len());
        Ok(urls)
    }
}
