// src/pose_bridge.rs - Recorded-pose adapter standing in for a model runtime
use std::future::Future;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{EstimationError, OverlayError};
use crate::pose::{PoseEstimate, PoseSource};
use crate::video::VideoFrame;

/// Replays pose lists captured from a real detector.
///
/// The file is a JSON array with one entry per sample, each entry being the
/// detector's pose list for that frame:
///
/// ```json
/// [
///   [{ "score": 0.9, "keypoints": [{ "name": "left_hip", "x": 100, "y": 200, "score": 0.9 }] }],
///   []
/// ]
/// ```
///
/// Samples are handed out in order and wrap around at the end.
#[derive(Debug, Clone)]
pub struct ReplayPoseSource {
    samples: Vec<Vec<PoseEstimate>>,
    cursor: usize,
}

impl ReplayPoseSource {
    pub fn from_samples(samples: Vec<Vec<PoseEstimate>>) -> Result<Self, OverlayError> {
        if samples.is_empty() {
            return Err(OverlayError::PoseSourceUnavailable(
                "pose recording has no samples".to_string(),
            ));
        }
        Ok(Self { samples, cursor: 0 })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, OverlayError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OverlayError::PoseSourceUnavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        let samples: Vec<Vec<PoseEstimate>> = serde_json::from_str(&content).map_err(|e| {
            OverlayError::PoseSourceUnavailable(format!("invalid pose recording {}: {e}", path.display()))
        })?;
        let source = Self::from_samples(samples)?;
        info!(path = %path.display(), samples = source.len(), "loaded pose recording");
        Ok(source)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn next_sample(&mut self, frame: &VideoFrame) -> Result<Vec<PoseEstimate>, EstimationError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(EstimationError::BadFrame { width, height });
        }
        let sample = self.samples[self.cursor].clone();
        debug!(cursor = self.cursor, poses = sample.len(), "replayed pose sample");
        self.cursor = (self.cursor + 1) % self.samples.len();
        Ok(sample)
    }
}

impl PoseSource for ReplayPoseSource {
    fn estimate(
        &mut self,
        frame: &VideoFrame,
    ) -> impl Future<Output = Result<Vec<PoseEstimate>, EstimationError>> + Send {
        std::future::ready(self.next_sample(frame))
    }
}
