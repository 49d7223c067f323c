// src/bin/camera_probe.rs - Lists cameras and checks the configured one streams
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;

use pose_overlay::logging::init_tracing;
use pose_overlay::{CameraFeed, OverlayConfig, OverlayError, StreamStatus, VideoStream};

const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> anyhow::Result<()> {
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let config = OverlayConfig::discover(explicit.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.log_level);

    println!("=== Cameras ===");
    match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
        Ok(cameras) => {
            println!("Found {} camera(s):", cameras.len());
            for (i, camera) in cameras.iter().enumerate() {
                println!("  [{}] {}", i, camera.human_name());
            }
        }
        Err(e) => println!("Failed to query cameras: {}", e),
    }

    println!("\nOpening camera {}...", config.camera.index);
    let feed = match CameraFeed::open(&config.camera) {
        Ok(feed) => feed,
        Err(e) => {
            println!("✗ {}", e);
            println!("\nPossible causes:");
            println!("1. Camera is being used by another app");
            println!("2. Camera permissions not granted");
            println!("3. No camera connected");
            return Err(e.into());
        }
    };

    let stream = feed.stream();
    let (width, height) = stream.dimensions();
    println!("✓ Stream opened at {}x{}", width, height);

    let started = Instant::now();
    while started.elapsed() < FIRST_FRAME_TIMEOUT {
        if stream.current_frame().is_some() {
            println!("✓ Frame captured after {:?}", started.elapsed());
            return Ok(());
        }
        if stream.status() == StreamStatus::Ended {
            return Err(OverlayError::StreamEnded.into());
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    anyhow::bail!("no frame within {:?} (status: {:?})", FIRST_FRAME_TIMEOUT, stream.status())
}
