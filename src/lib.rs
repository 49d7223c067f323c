// src/lib.rs - Pose-anchored overlay pipeline
//
// A video stream feeds a throttled pose source; the best pose's hips give an
// anchor region; a template is drawn there on every display frame.

pub mod anchor;
pub mod config;
pub mod error;
pub mod logging;
pub mod pose;
pub mod pose_bridge;
pub mod render;
pub mod render_loop;
pub mod sampler;
pub mod surface;
pub mod template;
pub mod video;

pub use anchor::{resolve_anchor, AnchorRegion, AnchorThresholds};
pub use config::OverlayConfig;
pub use error::{ConfigError, EstimationError, OverlayError};
pub use pose::{BodyPart, Keypoint, PoseEstimate, PoseSource};
pub use pose_bridge::ReplayPoseSource;
pub use render::{OverlayRenderer, OverlayStyle, TextureConfig};
pub use render_loop::{LoopHandle, LoopState, RenderLoop, TickOutcome};
pub use sampler::{SampleGuard, ThrottledSampler};
pub use surface::{DrawingSurface, OverlayFrame, PixmapSurface};
pub use template::TemplateKind;
pub use video::{CameraFeed, StillStream, StreamStatus, VideoFrame, VideoStream};
