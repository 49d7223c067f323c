// src/main.rs
mod app;
mod ui;

use std::path::PathBuf;

use anyhow::Context;
use eframe::egui;
use tokio::sync::watch;
use tracing::{error, info};

use pose_overlay::logging::init_tracing;
use pose_overlay::{
    CameraFeed, OverlayConfig, OverlayError, PixmapSurface, RenderLoop, ReplayPoseSource, StillStream,
    VideoStream,
};

use app::{OverlayViewerApp, ViewerParts};

/// Where frames come from: the configured still image, else the camera.
enum Input {
    Camera(CameraFeed),
    Still(StillStream),
}

impl Input {
    fn open(config: &OverlayConfig) -> Result<Self, OverlayError> {
        match &config.camera.still_image {
            Some(path) => StillStream::open(path).map(Input::Still),
            None => CameraFeed::open(&config.camera).map(Input::Camera),
        }
    }

    fn stream(&self) -> Box<dyn VideoStream + Send> {
        match self {
            Input::Camera(feed) => Box::new(feed.stream()),
            Input::Still(still) => Box::new(still.clone()),
        }
    }

    fn into_camera(self) -> Option<CameraFeed> {
        match self {
            Input::Camera(feed) => Some(feed),
            Input::Still(_) => None,
        }
    }
}

fn open_pose_source(config: &OverlayConfig) -> Result<ReplayPoseSource, OverlayError> {
    match &config.pose_source.replay_path {
        Some(path) => ReplayPoseSource::load(path),
        None => Err(OverlayError::PoseSourceUnavailable(
            "no pose source configured (set pose_source.replay_path)".to_string(),
        )),
    }
}

fn report_error(err: &anyhow::Error) {
    let message = format!("{err:#}");
    error!(error = %message, "pose overlay stopped with an error");
    rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Error)
        .set_title("Pose Overlay")
        .set_description(message.as_str())
        .set_buttons(rfd::MessageButtons::Ok)
        .show();
}

fn run(config: OverlayConfig) -> anyhow::Result<()> {
    // Acquisition: any failure here ends the program before the loop starts.
    let input = Input::open(&config).context("failed to open video input")?;
    let source = open_pose_source(&config).context("failed to open pose source")?;
    let loop_stream = input.stream();
    let (width, height) = loop_stream.dimensions();
    let (overlay_tx, overlay_rx) = watch::channel(None);
    let surface = PixmapSurface::new(width, height)
        .context("failed to create overlay surface")?
        .with_publisher(overlay_tx);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("overlay-runtime")
        .build()
        .context("failed to start async runtime")?;

    let (template_tx, template_rx) = watch::channel(config.render.initial_template);
    let mut render_loop = RenderLoop::new(loop_stream, source, surface, template_rx, &config);
    let loop_handle = render_loop.handle();
    let frame_interval = config.render.frame_interval();

    loop_handle.start();
    let task = runtime.spawn(async move { render_loop.run(frame_interval).await });

    let parts = ViewerParts {
        stream: input.stream(),
        camera: input.into_camera(),
        overlay: overlay_rx,
        template: template_tx,
        loop_handle: loop_handle.clone(),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 800.0])
            .with_min_inner_size([480.0, 400.0]),
        centered: true,
        ..Default::default()
    };

    info!(width, height, "starting viewer");
    let result = eframe::run_native(
        "Pose Overlay",
        options,
        Box::new(move |cc| Box::new(OverlayViewerApp::new(cc, parts))),
    );

    loop_handle.shutdown();
    if let Err(e) = runtime.block_on(task) {
        error!(error = %e, "render loop task failed");
    }

    result.map_err(|e| anyhow::anyhow!("viewer failed: {e}"))
}

fn main() -> anyhow::Result<()> {
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let config = OverlayConfig::discover(explicit.as_deref());

    let level = config.as_ref().map(|c| c.log_level.clone()).unwrap_or_default();
    init_tracing(&level);

    let result = config
        .context("failed to load configuration")
        .and_then(|config| {
            info!(?config, "configuration loaded");
            run(config)
        });
    if let Err(e) = &result {
        report_error(e);
    }
    result
}
