// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop the overlay from starting at all.
///
/// Everything that can go wrong once the render loop is running is contained
/// inside the loop; only these cross the library boundary.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("failed to open camera {index}: {reason}")]
    CameraUnavailable { index: u32, reason: String },

    #[error("camera stream ended before the first frame")]
    StreamEnded,

    #[error("cannot read image {path}: {source}")]
    ImageUnreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot create a {width}x{height} drawing surface")]
    InvalidSurface { width: u32, height: u32 },

    #[error("pose source unavailable: {0}")]
    PoseSourceUnavailable(String),
}

/// A single pose-estimation call failed. Never fatal.
#[derive(Debug, Error)]
pub enum EstimationError {
    #[error("frame of {width}x{height} rejected by pose source")]
    BadFrame { width: u32, height: u32 },

    #[error("estimation failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid color {0:?}, expected #rgb, #rrggbb or #rrggbbaa")]
    Color(String),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
