// src/anchor.rs - Hip-derived anchor region
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::pose::{BodyPart, PoseEstimate};

/// Overlay width as a fraction of the hip span.
const WIDTH_PER_HIP_SPAN: f64 = 0.8;
/// Overlay height as a multiple of its width.
const HEIGHT_PER_WIDTH: f64 = 1.2;
/// Downward shift from the hip line, as a fraction of the hip span.
const DROP_PER_HIP_SPAN: f64 = 1.0 / 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorThresholds {
    /// A pose must score strictly above this to be used.
    pub min_pose_score: f64,
    /// Each hip must score strictly above this.
    pub min_keypoint_score: f64,
}

impl Default for AnchorThresholds {
    fn default() -> Self {
        Self {
            min_pose_score: 0.5,
            min_keypoint_score: 0.2,
        }
    }
}

/// Where the overlay goes, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorRegion {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl AnchorRegion {
    pub fn center(&self) -> Point2<f64> {
        Point2::new(self.center_x, self.center_y)
    }

    pub fn min(&self) -> Point2<f64> {
        Point2::new(
            self.center_x - self.width / 2.0,
            self.center_y - self.height / 2.0,
        )
    }

    pub fn max(&self) -> Point2<f64> {
        Point2::new(
            self.center_x + self.width / 2.0,
            self.center_y + self.height / 2.0,
        )
    }

    /// Zero (or negative, or NaN) area.
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Picks the best pose and derives the anchor from its hips.
///
/// Returns `None` when there is nothing usable: no poses, a best pose at or
/// below `min_pose_score`, or a hip that is missing or at or below
/// `min_keypoint_score`. Ties on pose score go to the earlier pose.
pub fn resolve_anchor(poses: &[PoseEstimate], thresholds: &AnchorThresholds) -> Option<AnchorRegion> {
    let best = poses
        .iter()
        .reduce(|best, pose| if pose.score > best.score { pose } else { best })?;

    if !(best.score > thresholds.min_pose_score) {
        return None;
    }

    let left = best.keypoint(BodyPart::LeftHip)?;
    let right = best.keypoint(BodyPart::RightHip)?;
    if !(left.score > thresholds.min_keypoint_score && right.score > thresholds.min_keypoint_score) {
        return None;
    }

    let midpoint = nalgebra::center(&left.position(), &right.position());
    let hip_span = (left.x - right.x).abs();
    let width = hip_span * WIDTH_PER_HIP_SPAN;

    Some(AnchorRegion {
        center_x: midpoint.x,
        center_y: midpoint.y + hip_span * DROP_PER_HIP_SPAN,
        width,
        height: width * HEIGHT_PER_WIDTH,
    })
}
