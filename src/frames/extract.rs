//! Frame extraction from downloaded video files.
//!
//! Samples one frame per wall-clock interval in a single decode pass: frame
//! `k` is written iff `k mod interval_in_frames == 0`.

use super::Frame;
use crate::error::{Result, SkueError};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Query the video stream's frame rate using ffprobe.
pub async fn probe_fps(video_path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .arg("-v")
        .arg("quiet")
        .arg("-print_format")
        .arg("json")
        .arg("-show_streams")
        .arg("-select_streams")
        .arg("v:0")
        .arg(video_path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SkueError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => {
            return Err(SkueError::DecodeFailed(format!("ffprobe failed: {}", e)));
        }
    };

    if !output.status.success() {
        return Err(SkueError::DecodeFailed(
            "ffprobe could not open the video container".into(),
        ));
    }

    let parsed: serde_json::Value = serde_json::from_str(&String::from_utf8_lossy(&output.stdout))
        .map_err(|_| SkueError::DecodeFailed("Invalid ffprobe output".into()))?;

    let rate = parsed["streams"][0]["r_frame_rate"]
        .as_str()
        .ok_or_else(|| SkueError::DecodeFailed("No video stream found".into()))?;

    parse_frame_rate(rate)
        .ok_or_else(|| SkueError::DecodeFailed(format!("Unparseable frame rate: {}", rate)))
}

/// Parse an ffprobe rational frame rate like `30000/1001`.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                None
            } else {
                Some(num / den)
            }
        }
        None => rate.trim().parse().ok(),
    }
}

/// Extract frames at the given wall-clock interval.
///
/// Decodes the video exactly once, keeping every `interval_in_frames`-th
/// frame, and persists each survivor as `frame<idx>_<ms>.jpg`.
#[instrument(skip(video_path, frames_dir), fields(video = %video_path.display()))]
pub async fn extract_frames(
    video_path: &Path,
    frames_dir: &Path,
    interval_in_sec: u32,
) -> Result<Vec<Frame>> {
    std::fs::create_dir_all(frames_dir)?;

    let fps = probe_fps(video_path).await?;
    let interval_in_frames = ((fps * interval_in_sec as f64).round() as u64).max(1);
    debug!(
        "fps = {:.3}, sampling every {} frames",
        fps, interval_in_frames
    );

    let filter = format!("select=not(mod(n\\,{}))", interval_in_frames);
    let pattern = frames_dir.join("sample_%06d.jpg");

    let result = Command::new("ffmpeg")
        .arg("-i")
        .arg(video_path)
        .arg("-vf")
        .arg(&filter)
        .arg("-vsync")
        .arg("vfr")
        .arg("-q:v")
        .arg("2")
        .arg("-y")
        .arg("-loglevel")
        .arg("error")
        .arg(&pattern)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SkueError::ToolNotFound("ffmpeg".into()));
        }
        Err(e) => {
            return Err(SkueError::DecodeFailed(format!("ffmpeg failed: {}", e)));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SkueError::DecodeFailed(format!(
            "ffmpeg could not decode the video: {}",
            stderr
        )));
    }

    // Rename the sequentially numbered outputs so each file name carries
    // the original frame index and its timestamp in milliseconds.
    let mut sample_files: Vec<_> = std::fs::read_dir(frames_dir)?
        .flatten()
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("sample_")
        })
        .map(|e| e.path())
        .collect();
    sample_files.sort();

    let mut frames = Vec::with_capacity(sample_files.len());

    for (k, sample_path) in sample_files.into_iter().enumerate() {
        let index = k as u64 * interval_in_frames;
        let time_in_s = index as f64 / fps;
        let time_ms = (time_in_s * 1000.0).round() as u64;

        let final_path = frames_dir.join(Frame::file_name(index, time_ms));
        std::fs::rename(&sample_path, &final_path)?;

        frames.push(Frame {
            index,
            time_in_s,
            path: final_path,
        });
    }

    info!("Extracted {} frames", frames.len());
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("30/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }
}
