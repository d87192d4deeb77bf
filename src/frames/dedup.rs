//! Perceptual dedup of adjacent frames.
//!
//! Keeps a running reference frame and drops any frame whose visual
//! similarity to the reference reaches the configured threshold.

use super::Frame;
use crate::embedding::cosine_similarity;
use crate::error::{Result, SkueError};
use fastembed::{ImageEmbedding, ImageEmbeddingModel, ImageInitOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Trait for visual feature extraction over image files.
pub trait VisualEmbedder: Send + Sync {
    /// Embed the images at the given paths, in order.
    fn embed_files(&self, paths: &[PathBuf]) -> Result<Vec<Vec<f32>>>;
}

/// CLIP-based visual embedder.
pub struct ClipVisualEmbedder {
    model: Mutex<ImageEmbedding>,
}

impl ClipVisualEmbedder {
    /// Initialize the CLIP model (downloads weights on first use).
    pub fn new() -> Result<Self> {
        let model = ImageEmbedding::try_new(ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32))
            .map_err(|e| SkueError::ExtractionFailed(format!("CLIP init failed: {}", e)))?;
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl VisualEmbedder for ClipVisualEmbedder {
    fn embed_files(&self, paths: &[PathBuf]) -> Result<Vec<Vec<f32>>> {
        self.model
            .lock()
            .map_err(|e| {
                SkueError::ExtractionFailed(format!("Visual embedder lock poisoned: {}", e))
            })?
            .embed(paths.to_vec(), None)
            .map_err(|e| SkueError::ExtractionFailed(format!("Visual embedding failed: {}", e)))
    }
}

/// Linearly map a raw cosine value from [-1, 1] onto [0, 1], so 0 means
/// opposite and 1 means identical. The similarity threshold applies to
/// this rescaled value.
pub fn rescale_cosine(raw: f32) -> f32 {
    (raw + 1.0) / 2.0
}

/// Drop near-duplicate frames against a running reference.
///
/// Frames must be sorted by index. A frame survives iff its rescaled
/// similarity to the last retained frame is below `max_limit_similarity`;
/// dropped frames are deleted from disk.
pub fn dedup_frames(
    frames: Vec<Frame>,
    embedder: &dyn VisualEmbedder,
    max_limit_similarity: f32,
) -> Result<Vec<Frame>> {
    if frames.len() <= 1 {
        return Ok(frames);
    }

    let paths: Vec<PathBuf> = frames.iter().map(|f| f.path.clone()).collect();
    let embeddings = embedder.embed_files(&paths)?;

    if embeddings.len() != frames.len() {
        return Err(SkueError::ExtractionFailed(format!(
            "Embedded {} frames but expected {}",
            embeddings.len(),
            frames.len()
        )));
    }

    let mut retained = Vec::with_capacity(frames.len());
    let mut reference_index = 0usize;

    for (i, frame) in frames.into_iter().enumerate() {
        if i == 0 {
            retained.push(frame);
            continue;
        }

        let similarity = rescale_cosine(cosine_similarity(
            &embeddings[reference_index],
            &embeddings[i],
        ));

        if similarity < max_limit_similarity {
            debug!(
                "Keeping frame {} (similarity {:.3} to reference)",
                frame.index, similarity
            );
            reference_index = i;
            retained.push(frame);
        } else {
            debug!(
                "Dropping frame {} (similarity {:.3} to reference)",
                frame.index, similarity
            );
            if let Err(e) = std::fs::remove_file(&frame.path) {
                warn!("Failed to delete duplicate frame {:?}: {}", frame.path, e);
            }
        }
    }

    info!("Retained {} frames after dedup", retained.len());
    Ok(retained)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Embedder returning fixed vectors keyed by file stem.
    struct StubEmbedder {
        vectors: Vec<Vec<f32>>,
    }

    impl VisualEmbedder for StubEmbedder {
        fn embed_files(&self, _paths: &[PathBuf]) -> Result<Vec<Vec<f32>>> {
            Ok(self.vectors.clone())
        }
    }

    fn frame(index: u64) -> Frame {
        Frame {
            index,
            time_in_s: index as f64,
            path: std::env::temp_dir().join(format!("skue-test-missing-{}.jpg", index)),
        }
    }

    #[test]
    fn test_rescale_cosine() {
        assert_eq!(rescale_cosine(1.0), 1.0);
        assert_eq!(rescale_cosine(-1.0), 0.0);
        assert_eq!(rescale_cosine(0.0), 0.5);
    }

    #[test]
    fn test_single_frame_is_noop() {
        let embedder = StubEmbedder { vectors: vec![] };
        let frames = vec![frame(0)];
        let kept = dedup_frames(frames.clone(), &embedder, 0.85).unwrap();
        assert_eq!(kept, frames);
    }

    #[test]
    fn test_near_duplicates_are_dropped() {
        // Frames 0 and 1 are identical; frame 2 is orthogonal.
        let embedder = StubEmbedder {
            vectors: vec![
                vec![1.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 1.0],
            ],
        };

        let kept = dedup_frames(vec![frame(0), frame(1), frame(2)], &embedder, 0.85).unwrap();
        let indices: Vec<u64> = kept.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_reference_advances_to_last_retained() {
        // 0 -> 1 dissimilar (keep 1, reference moves), 1 -> 2 identical (drop 2).
        let embedder = StubEmbedder {
            vectors: vec![
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![0.0, 1.0],
            ],
        };

        let kept = dedup_frames(vec![frame(0), frame(1), frame(2)], &embedder, 0.85).unwrap();
        let indices: Vec<u64> = kept.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_retained_successors_stay_below_threshold() {
        let embedder = StubEmbedder {
            vectors: vec![
                vec![1.0, 0.0],
                vec![0.9, 0.1],
                vec![0.0, 1.0],
            ],
        };

        let threshold = 0.85;
        let kept = dedup_frames(vec![frame(0), frame(1), frame(2)], &embedder, threshold).unwrap();

        // frame 1 is ~0.99 similar to frame 0 after rescaling, so only the
        // orthogonal frame survives next to the reference.
        let indices: Vec<u64> = kept.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }
}
