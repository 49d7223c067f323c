// src/config.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::anchor::AnchorThresholds;
use crate::error::ConfigError;
use crate::render::{OverlayStyle, TextureConfig};
use crate::template::TemplateKind;

const CONFIG_FILE_NAME: &str = "config.json";
/// Above this a frame interval rounds toward nothing.
const MAX_REFRESH_HZ: f64 = 1000.0;

/// Everything the binary can be told from `config.json`. Missing fields fall
/// back to their defaults, so an empty object is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub log_level: LogLevel,
    pub camera: CameraConfig,
    pub sampling: SamplingConfig,
    pub anchor: AnchorThresholds,
    pub style: OverlayStyle,
    pub texture: TextureConfig,
    pub render: RenderConfig,
    pub pose_source: PoseSourceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogLevel(pub String);

impl Default for LogLevel {
    fn default() -> Self {
        Self("info".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Mirror frames horizontally, as a front-facing camera preview does.
    pub mirror: bool,
    /// Use a still image instead of the camera.
    pub still_image: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: 30,
            mirror: true,
            still_image: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub min_interval_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { min_interval_ms: 200 }
    }
}

impl SamplingConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Display refresh rate the render loop ticks at.
    pub refresh_hz: f64,
    /// Keep drawing the last accepted anchor when a sample yields none.
    pub retain_stale_anchor: bool,
    pub initial_template: TemplateKind,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            refresh_hz: 60.0,
            retain_stale_anchor: true,
            initial_template: TemplateKind::None,
        }
    }
}

impl RenderConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_hz)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseSourceConfig {
    /// JSON file of recorded pose lists, one list per sample.
    pub replay_path: Option<PathBuf>,
}

impl OverlayConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: OverlayConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// `<platform config dir>/pose_overlay/config.json`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "PoseOverlay", "pose_overlay")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// An explicit path must exist; the default location is optional.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let refresh_hz = self.render.refresh_hz;
        if !(refresh_hz > 0.0 && refresh_hz <= MAX_REFRESH_HZ) || self.render.frame_interval().is_zero() {
            return Err(ConfigError::Invalid {
                field: "render.refresh_hz",
                reason: format!("must lie in (0, {MAX_REFRESH_HZ}], got {refresh_hz}"),
            });
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid {
                field: "camera",
                reason: format!(
                    "resolution {}x{} has no pixels",
                    self.camera.width, self.camera.height
                ),
            });
        }
        for (field, width) in [
            ("style.line_width", self.style.line_width),
            ("style.texture_line_width", self.style.texture_line_width),
        ] {
            if !(width.is_finite() && width >= 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be a non-negative number, got {width}"),
                });
            }
        }
        if !(self.texture.jitter.is_finite() && self.texture.jitter >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "texture.jitter",
                reason: format!("must be a non-negative number, got {}", self.texture.jitter),
            });
        }
        for (field, value) in [
            ("anchor.min_pose_score", self.anchor.min_pose_score),
            ("anchor.min_keypoint_score", self.anchor.min_keypoint_score),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must lie in [0, 1], got {value}"),
                });
            }
        }
        Ok(())
    }
}
