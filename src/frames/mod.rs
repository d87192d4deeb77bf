//! Frame sampling, perceptual dedup, and vision captioning.

mod dedup;
mod describe;
mod extract;

pub use dedup::{dedup_frames, rescale_cosine, ClipVisualEmbedder, VisualEmbedder};
pub use describe::{write_descriptions_csv, FrameDescriber, FrameDescription};
pub use extract::{extract_frames, probe_fps};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A sampled still frame persisted on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Index of the frame in the decoded stream.
    pub index: u64,
    /// Wall-clock decode time in seconds.
    pub time_in_s: f64,
    /// Path of the persisted JPEG.
    pub path: PathBuf,
}

impl Frame {
    /// File name encoding both the frame index and the decode-time
    /// timestamp in milliseconds.
    pub fn file_name(index: u64, time_ms: u64) -> String {
        format!("frame{}_{}.jpg", index, time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_file_name() {
        assert_eq!(Frame::file_name(0, 0), "frame0_0.jpg");
        assert_eq!(Frame::file_name(3600, 120000), "frame3600_120000.jpg");
    }
}
