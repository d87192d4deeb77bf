//! Timed transcript acquisition from YouTube captions.
//!
//! Downloads auto-generated or authored captions in json3 format via yt-dlp
//! and parses them into `(start_seconds, text)` items.

use super::{canonical_url, TranscriptItem};
use crate::error::{Result, SkueError};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Fetch the timed transcript for a video in the requested language.
///
/// Returns `TranscriptUnavailable` when the source offers no captions in
/// that language.
#[instrument]
pub async fn fetch_timed_transcript(video_id: &str, language: &str) -> Result<Vec<TranscriptItem>> {
    let temp_dir = tempfile::tempdir()?;
    let template = temp_dir.path().join("%(id)s.%(ext)s");

    let output = Command::new("yt-dlp")
        .arg("--skip-download")
        .arg("--write-subs")
        .arg("--write-auto-subs")
        .arg("--sub-langs")
        .arg(language)
        .arg("--sub-format")
        .arg("json3")
        .arg("--output")
        .arg(template.to_str().unwrap_or_default())
        .arg("--quiet")
        .arg("--no-warnings")
        .arg(canonical_url(video_id))
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SkueError::ToolNotFound("yt-dlp".to_string())
            } else {
                SkueError::ToolFailed(format!("yt-dlp execution failed: {}", e))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SkueError::TranscriptUnavailable(format!(
            "yt-dlp subtitle fetch failed for {}: {}",
            video_id, stderr
        )));
    }

    let caption_path = find_caption_file(temp_dir.path(), video_id, language)?;
    let content = std::fs::read_to_string(&caption_path)?;

    let items = parse_json3(&content)?;
    if items.is_empty() {
        return Err(SkueError::TranscriptUnavailable(format!(
            "Empty transcript for {} in language {}",
            video_id, language
        )));
    }

    debug!("Fetched {} transcript items", items.len());
    Ok(items)
}

fn find_caption_file(dir: &Path, video_id: &str, language: &str) -> Result<std::path::PathBuf> {
    let exact = dir.join(format!("{}.{}.json3", video_id, language));
    if exact.exists() {
        return Ok(exact);
    }

    // yt-dlp may qualify the language tag (e.g. en-orig)
    let entries = std::fs::read_dir(dir)?;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(video_id) && name.ends_with(".json3") {
            return Ok(entry.path());
        }
    }

    Err(SkueError::TranscriptUnavailable(format!(
        "No {} captions available for {}",
        language, video_id
    )))
}

/// Parse the json3 caption format into timed items.
fn parse_json3(content: &str) -> Result<Vec<TranscriptItem>> {
    let json: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| SkueError::TranscriptUnavailable(format!("Invalid caption JSON: {}", e)))?;

    let mut items = Vec::new();

    if let Some(events) = json["events"].as_array() {
        for event in events {
            let start_ms = match event["tStartMs"].as_f64() {
                Some(ms) => ms,
                None => continue,
            };

            let text: String = event["segs"]
                .as_array()
                .map(|segs| {
                    segs.iter()
                        .filter_map(|s| s["utf8"].as_str())
                        .collect::<Vec<_>>()
                        .concat()
                })
                .unwrap_or_default();

            let text = text.replace('\n', " ").trim().to_string();
            if text.is_empty() {
                continue;
            }

            items.push(TranscriptItem {
                start_seconds: start_ms / 1000.0,
                text,
            });
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json3() {
        let content = r#"{
            "events": [
                {"tStartMs": 0, "segs": [{"utf8": "Hello "}, {"utf8": "world"}]},
                {"tStartMs": 1520, "segs": [{"utf8": "\n"}]},
                {"tStartMs": 2000, "segs": [{"utf8": "second line"}]}
            ]
        }"#;

        let items = parse_json3(content).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].start_seconds, 0.0);
        assert_eq!(items[0].text, "Hello world");
        assert_eq!(items[1].start_seconds, 2.0);
        assert_eq!(items[1].text, "second line");
    }

    #[test]
    fn test_parse_json3_no_events() {
        let items = parse_json3("{}").unwrap();
        assert!(items.is_empty());
    }
}
