// src/video.rs - Video stream collaborators: live camera feed and still images
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use image::{DynamicImage, RgbaImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::CameraConfig;
use crate::error::OverlayError;

/// One decoded RGBA frame, shared between the render loop and the viewer.
pub type VideoFrame = Arc<RgbaImage>;

/// Consecutive capture errors tolerated before the feed is declared ended.
const MAX_CAPTURE_FAILURES: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Opened, no frame delivered yet.
    Waiting,
    Playing,
    Paused,
    Ended,
}

impl StreamStatus {
    pub fn is_playing(self) -> bool {
        self == StreamStatus::Playing
    }
}

/// The video element the overlay sits on.
pub trait VideoStream {
    fn status(&self) -> StreamStatus;

    /// Native frame size; the drawing surface is sized from this once.
    fn dimensions(&self) -> (u32, u32);

    /// Latest frame, if one has arrived.
    fn current_frame(&self) -> Option<VideoFrame>;
}

impl<T: VideoStream + ?Sized> VideoStream for Box<T> {
    fn status(&self) -> StreamStatus {
        (**self).status()
    }

    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        (**self).current_frame()
    }
}

/// A single image presented as a stream that is always playing.
#[derive(Debug, Clone)]
pub struct StillStream {
    frame: VideoFrame,
    status: StreamStatus,
}

impl StillStream {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            frame: Arc::new(image),
            status: StreamStatus::Playing,
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, OverlayError> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|source| OverlayError::ImageUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), width = image.width(), height = image.height(), "opened still image");
        Ok(Self::new(image.to_rgba8()))
    }

    pub fn set_status(&mut self, status: StreamStatus) {
        self.status = status;
    }
}

impl VideoStream for StillStream {
    fn status(&self) -> StreamStatus {
        self.status
    }

    fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        Some(Arc::clone(&self.frame))
    }
}

#[derive(Debug, Clone)]
pub struct FeedState {
    pub frame: Option<VideoFrame>,
    pub status: StreamStatus,
}

impl FeedState {
    fn waiting() -> Self {
        Self {
            frame: None,
            status: StreamStatus::Waiting,
        }
    }
}

/// Live camera capture on a dedicated thread.
///
/// The thread owns the camera and publishes the newest frame on a `watch`
/// channel; any number of `FeedStream`s read it without blocking capture.
pub struct CameraFeed {
    state: watch::Receiver<FeedState>,
    dimensions: (u32, u32),
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CameraFeed {
    /// Opens the camera and blocks until it either streams or fails.
    pub fn open(config: &CameraConfig) -> Result<Self, OverlayError> {
        let (state_tx, state_rx) = watch::channel(FeedState::waiting());
        let (ready_tx, ready_rx) = mpsc::channel();
        let paused = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));

        let settings = config.clone();
        let worker_paused = Arc::clone(&paused);
        let worker_shutdown = Arc::clone(&shutdown);
        let index = config.index;
        let worker = std::thread::Builder::new()
            .name("camera-feed".to_string())
            .spawn(move || capture_loop(settings, state_tx, ready_tx, worker_paused, worker_shutdown))
            .map_err(|e| OverlayError::CameraUnavailable {
                index,
                reason: e.to_string(),
            })?;

        let dimensions = ready_rx.recv().map_err(|_| OverlayError::CameraUnavailable {
            index,
            reason: "capture thread exited during startup".to_string(),
        })??;

        info!(index, width = dimensions.0, height = dimensions.1, "camera stream open");
        Ok(Self {
            state: state_rx,
            dimensions,
            paused,
            shutdown,
            worker: Some(worker),
        })
    }

    pub fn stream(&self) -> FeedStream {
        FeedStream {
            state: self.state.clone(),
            dimensions: self.dimensions,
        }
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }
}

impl Drop for CameraFeed {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("camera thread panicked");
            }
        }
    }
}

/// Read side of a `CameraFeed`.
#[derive(Debug, Clone)]
pub struct FeedStream {
    state: watch::Receiver<FeedState>,
    dimensions: (u32, u32),
}

impl VideoStream for FeedStream {
    fn status(&self) -> StreamStatus {
        self.state.borrow().status
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        self.state.borrow().frame.clone()
    }
}

fn open_camera(config: &CameraConfig) -> Result<Camera, OverlayError> {
    let unavailable = |reason: String| OverlayError::CameraUnavailable {
        index: config.index,
        reason,
    };

    let format = CameraFormat::new(
        Resolution::new(config.width, config.height),
        FrameFormat::MJPEG,
        config.fps,
    );
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

    debug!(index = config.index, "creating camera");
    let mut camera = Camera::new(CameraIndex::Index(config.index), requested)
        .map_err(|e| unavailable(e.to_string()))?;
    camera.open_stream().map_err(|e| unavailable(e.to_string()))?;
    Ok(camera)
}

fn capture_frame(camera: &mut Camera, mirror: bool) -> anyhow::Result<RgbaImage> {
    let buffer = camera.frame()?;
    let decoded = buffer.decode_image::<RgbFormat>()?;
    let (width, height) = (decoded.width(), decoded.height());
    let decoded = image::RgbImage::from_raw(width, height, decoded.into_raw())
        .ok_or_else(|| anyhow::anyhow!("decoded frame buffer does not match its dimensions"))?;
    let rgba = DynamicImage::ImageRgb8(decoded).to_rgba8();
    Ok(if mirror {
        image::imageops::flip_horizontal(&rgba)
    } else {
        rgba
    })
}

fn capture_loop(
    config: CameraConfig,
    state: watch::Sender<FeedState>,
    ready: mpsc::Sender<Result<(u32, u32), OverlayError>>,
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
) {
    let mut camera = match open_camera(&config) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let resolution = camera.resolution();
    if ready.send(Ok((resolution.width(), resolution.height()))).is_err() {
        return;
    }

    let mut failures = 0;
    while !shutdown.load(Ordering::Relaxed) {
        if paused.load(Ordering::Relaxed) {
            state.send_modify(|s| s.status = StreamStatus::Paused);
            std::thread::sleep(Duration::from_millis(10));
            continue;
        }

        match capture_frame(&mut camera, config.mirror) {
            Ok(frame) => {
                failures = 0;
                state.send_replace(FeedState {
                    frame: Some(Arc::new(frame)),
                    status: StreamStatus::Playing,
                });
            }
            Err(e) => {
                failures += 1;
                warn!(error = %e, failures, "camera capture failed");
                if failures >= MAX_CAPTURE_FAILURES {
                    break;
                }
            }
        }
    }

    state.send_modify(|s| s.status = StreamStatus::Ended);
    if let Err(e) = camera.stop_stream() {
        warn!(error = %e, "failed to stop camera stream");
    }
    info!("camera feed stopped");
}
