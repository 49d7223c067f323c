// src/render_loop.rs - Per-display-frame driver: sample, anchor, clear, draw
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::anchor::{resolve_anchor, AnchorRegion, AnchorThresholds};
use crate::config::OverlayConfig;
use crate::pose::PoseSource;
use crate::render::OverlayRenderer;
use crate::sampler::ThrottledSampler;
use crate::surface::DrawingSurface;
use crate::template::TemplateKind;
use crate::video::VideoStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Stopped,
    Running,
    /// Terminal: `run` returns and the loop cannot be started again.
    ShutDown,
}

/// Start/stop control shared between the loop and whoever drives it.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    state: Arc<watch::Sender<LoopState>>,
    source_ready: Arc<watch::Sender<bool>>,
}

impl Default for LoopHandle {
    fn default() -> Self {
        let (state, _) = watch::channel(LoopState::Stopped);
        let (source_ready, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
            source_ready: Arc::new(source_ready),
        }
    }
}

impl LoopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves a stopped loop to running; a parked `run` resumes ticking.
    pub fn start(&self) {
        self.transition(LoopState::Running);
    }

    pub fn stop(&self) {
        self.transition(LoopState::Stopped);
    }

    pub fn shutdown(&self) {
        self.transition(LoopState::ShutDown);
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Whether the pose source reported ready on the latest running tick.
    pub fn is_source_ready(&self) -> bool {
        *self.source_ready.borrow()
    }

    fn set_source_ready(&self, ready: bool) {
        let changed = self.source_ready.send_if_modified(|current| {
            if *current == ready {
                return false;
            }
            *current = ready;
            true
        });
        if changed {
            info!(ready, "pose source readiness changed");
        }
    }

    fn transition(&self, next: LoopState) {
        let changed = self.state.send_if_modified(|state| {
            if *state == next || *state == LoopState::ShutDown {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            info!(state = ?next, "render loop state changed");
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The loop is stopped; nothing was drawn and no further tick follows
    /// until it is started again.
    Halted,
    /// Stream not playing or pose source still loading; surface untouched.
    NotReady,
    /// Surface was cleared and presented.
    Drawn {
        /// A pose sample was taken this tick.
        sampled: bool,
        /// An overlay was rendered on top of the cleared surface.
        overlay: bool,
    },
}

impl TickOutcome {
    pub fn reschedules(self) -> bool {
        self != TickOutcome::Halted
    }
}

/// Ties a video stream, a pose source and a drawing surface together.
///
/// Ticks run one at a time. The pose source is awaited inside the tick, so
/// the next tick cannot start before the current estimate returns; the
/// sampler's in-flight guard records the same thing explicitly and is
/// released even if the tick is dropped mid-estimate.
pub struct RenderLoop<V, P, D, R = StdRng> {
    stream: V,
    source: P,
    surface: D,
    sampler: ThrottledSampler,
    renderer: OverlayRenderer,
    thresholds: AnchorThresholds,
    retain_stale_anchor: bool,
    anchor: Option<AnchorRegion>,
    template: watch::Receiver<TemplateKind>,
    handle: LoopHandle,
    rng: R,
}

impl<V, P, D> RenderLoop<V, P, D, StdRng>
where
    V: VideoStream,
    P: PoseSource,
    D: DrawingSurface,
{
    pub fn new(
        stream: V,
        source: P,
        surface: D,
        template: watch::Receiver<TemplateKind>,
        config: &OverlayConfig,
    ) -> Self {
        Self {
            stream,
            source,
            surface,
            sampler: ThrottledSampler::new(config.sampling.min_interval()),
            renderer: OverlayRenderer::new(config.style, config.texture),
            thresholds: config.anchor,
            retain_stale_anchor: config.render.retain_stale_anchor,
            anchor: None,
            template,
            handle: LoopHandle::new(),
            rng: StdRng::from_entropy(),
        }
    }
}

impl<V, P, D, R> RenderLoop<V, P, D, R>
where
    V: VideoStream,
    P: PoseSource,
    D: DrawingSurface,
    R: Rng,
{
    /// Swaps the texture's random source, e.g. for a seeded one.
    pub fn with_rng<R2: Rng>(self, rng: R2) -> RenderLoop<V, P, D, R2> {
        RenderLoop {
            stream: self.stream,
            source: self.source,
            surface: self.surface,
            sampler: self.sampler,
            renderer: self.renderer,
            thresholds: self.thresholds,
            retain_stale_anchor: self.retain_stale_anchor,
            anchor: self.anchor,
            template: self.template,
            handle: self.handle,
            rng,
        }
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    pub fn start(&self) {
        self.handle.start();
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn anchor(&self) -> Option<&AnchorRegion> {
        self.anchor.as_ref()
    }

    pub fn sampler(&self) -> &ThrottledSampler {
        &self.sampler
    }

    pub fn surface(&self) -> &D {
        &self.surface
    }

    pub fn into_parts(self) -> (V, P, D) {
        (self.stream, self.source, self.surface)
    }

    pub async fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.handle.is_running() {
            return TickOutcome::Halted;
        }

        // Copy out so the channel is never borrowed across the estimate.
        let template = *self.template.borrow_and_update();

        let source_ready = self.source.is_ready();
        self.handle.set_source_ready(source_ready);
        let frame = match self.stream.current_frame() {
            Some(frame) if self.stream.status().is_playing() && source_ready => frame,
            _ => return TickOutcome::NotReady,
        };

        let sample = self.sampler.begin(now);
        let sampled = sample.is_some();
        if let Some(guard) = sample {
            let poses = match self.source.estimate(&frame).await {
                Ok(poses) => poses,
                Err(e) => {
                    warn!(error = %e, "pose estimation failed");
                    Vec::new()
                }
            };
            drop(guard);

            if !self.handle.is_running() {
                debug!("discarding pose sample that finished after stop");
                return TickOutcome::Halted;
            }

            match resolve_anchor(&poses, &self.thresholds) {
                Some(anchor) => {
                    debug!(poses = poses.len(), ?anchor, "anchor updated");
                    self.anchor = Some(anchor);
                }
                None if self.retain_stale_anchor => {
                    debug!(poses = poses.len(), "no anchor in sample");
                }
                None => {
                    debug!(poses = poses.len(), "no anchor in sample, clearing");
                    self.anchor = None;
                }
            }
        }

        self.surface.clear();
        let overlay = match &self.anchor {
            Some(anchor) if template != TemplateKind::None => {
                self.renderer.render(&mut self.surface, anchor, template, &mut self.rng);
                true
            }
            _ => false,
        };
        self.surface.present();

        TickOutcome::Drawn { sampled, overlay }
    }

    /// Ticks at `frame_interval` while running, parks while stopped and
    /// returns once the loop is shut down.
    ///
    /// A tick that overruns its slot is not made up for; the next one waits
    /// for the following slot.
    pub async fn run(&mut self, frame_interval: Duration) {
        let mut states = self.handle.subscribe();
        loop {
            let state = states
                .wait_for(|state| *state != LoopState::Stopped)
                .await
                .map(|state| *state);
            match state {
                Ok(LoopState::Running) => {}
                _ => break,
            }

            let mut interval = tokio::time::interval(frame_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(
                interval_ms = frame_interval.as_secs_f64() * 1000.0,
                min_sample_interval_ms = self.sampler.min_interval().as_millis() as u64,
                "render loop running"
            );
            loop {
                let now = interval.tick().await.into_std();
                if !self.tick(now).await.reschedules() {
                    break;
                }
            }
            debug!("render loop parked");
        }
        info!("render loop shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EstimationError;
    use crate::pose::{Keypoint, PoseEstimate};
    use crate::render::tests::RecordingSurface;
    use crate::video::{StillStream, StreamStatus, VideoFrame};
    use image::RgbaImage;
    use std::collections::VecDeque;
    use std::future::Future;

    /// Hands out scripted results; empty list once the script runs out.
    #[derive(Default)]
    struct ScriptedSource {
        script: VecDeque<Result<Vec<PoseEstimate>, EstimationError>>,
        calls: usize,
        loading: bool,
        stop_on_call: Option<LoopHandle>,
        // The first call never resolves.
        hang_first: bool,
    }

    impl ScriptedSource {
        fn new(script: impl IntoIterator<Item = Result<Vec<PoseEstimate>, EstimationError>>) -> Self {
            Self {
                script: script.into_iter().collect(),
                ..Default::default()
            }
        }
    }

    impl PoseSource for ScriptedSource {
        fn is_ready(&self) -> bool {
            !self.loading
        }

        fn estimate(
            &mut self,
            _frame: &VideoFrame,
        ) -> impl Future<Output = Result<Vec<PoseEstimate>, EstimationError>> + Send {
            self.calls += 1;
            if let Some(handle) = &self.stop_on_call {
                handle.stop();
            }
            let hang = self.hang_first && self.calls == 1;
            let result = self.script.pop_front().unwrap_or(Ok(Vec::new()));
            async move {
                if hang {
                    std::future::pending::<()>().await;
                }
                result
            }
        }
    }

    fn hips(score: f64) -> Vec<PoseEstimate> {
        vec![PoseEstimate::new(
            score,
            vec![
                Keypoint::new("left_hip", 100.0, 200.0, 0.9),
                Keypoint::new("right_hip", 140.0, 200.0, 0.9),
            ],
        )]
    }

    fn make_loop(
        source: ScriptedSource,
        template: TemplateKind,
        config: &OverlayConfig,
    ) -> (
        RenderLoop<StillStream, ScriptedSource, RecordingSurface, StdRng>,
        watch::Sender<TemplateKind>,
    ) {
        let (tx, rx) = watch::channel(template);
        let stream = StillStream::new(RgbaImage::new(640, 480));
        let render_loop = RenderLoop::new(stream, source, RecordingSurface::default(), rx, config)
            .with_rng(StdRng::seed_from_u64(11));
        (render_loop, tx)
    }

    fn ms(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    #[tokio::test]
    async fn test_stopped_loop_is_a_noop() {
        let (mut render_loop, _tx) = make_loop(ScriptedSource::new([Ok(hips(0.9))]), TemplateKind::Star, &OverlayConfig::default());
        assert_eq!(render_loop.handle().state(), LoopState::Stopped);
        assert_eq!(render_loop.tick(Instant::now()).await, TickOutcome::Halted);
        assert!(!TickOutcome::Halted.reschedules());
        let (_, source, surface) = render_loop.into_parts();
        assert_eq!(source.calls, 0);
        assert_eq!(surface.clears, 0);
    }

    #[tokio::test]
    async fn test_throttle_samples_at_0_and_210() {
        let (mut render_loop, _tx) = make_loop(ScriptedSource::default(), TemplateKind::Star, &OverlayConfig::default());
        render_loop.start();
        let base = Instant::now();
        let mut sampled_at = Vec::new();
        for t in [0, 50, 120, 210] {
            if let TickOutcome::Drawn { sampled: true, .. } = render_loop.tick(ms(base, t)).await {
                sampled_at.push(t);
            }
        }
        assert_eq!(sampled_at, vec![0, 210]);
        let (_, source, surface) = render_loop.into_parts();
        assert_eq!(source.calls, 2);
        assert_eq!(surface.clears, 4);
        assert_eq!(surface.presents, 4);
    }

    #[tokio::test]
    async fn test_star_scenario() {
        let (mut render_loop, _tx) = make_loop(ScriptedSource::new([Ok(hips(0.9))]), TemplateKind::Star, &OverlayConfig::default());
        render_loop.start();
        let outcome = render_loop.tick(Instant::now()).await;
        assert_eq!(outcome, TickOutcome::Drawn { sampled: true, overlay: true });

        let anchor = *render_loop.anchor().unwrap();
        assert!((anchor.center_x - 120.0).abs() < 1e-9);
        assert!((anchor.center_y - 213.333).abs() < 1e-3);
        assert!((anchor.width - 32.0).abs() < 1e-9);
        assert!((anchor.height - 38.4).abs() < 1e-9);

        let surface = render_loop.surface();
        assert_eq!(surface.fills.len(), 1);
        assert_eq!(surface.fills[0].vertices().len(), 10);
        assert_eq!(surface.strokes.len(), 50);
    }

    #[tokio::test]
    async fn test_empty_pose_list_clears_and_draws_nothing() {
        let (mut render_loop, _tx) = make_loop(ScriptedSource::new([Ok(Vec::new())]), TemplateKind::Star, &OverlayConfig::default());
        render_loop.start();
        let outcome = render_loop.tick(Instant::now()).await;
        assert_eq!(outcome, TickOutcome::Drawn { sampled: true, overlay: false });
        assert!(outcome.reschedules());
        assert!(render_loop.anchor().is_none());
        let surface = render_loop.surface();
        assert_eq!(surface.clears, 1);
        assert!(surface.fills.is_empty());
        assert!(surface.strokes.is_empty());
    }

    #[tokio::test]
    async fn test_estimation_failure_counts_as_no_poses() {
        let source = ScriptedSource::new([Err(EstimationError::Failed("gpu lost".into())), Ok(hips(0.9))]);
        let (mut render_loop, _tx) = make_loop(source, TemplateKind::Full, &OverlayConfig::default());
        render_loop.start();
        let base = Instant::now();

        let first = render_loop.tick(base).await;
        assert_eq!(first, TickOutcome::Drawn { sampled: true, overlay: false });
        assert!(!render_loop.sampler().is_in_flight());

        // the failed sample still counts toward the throttle
        assert_eq!(render_loop.sampler().last_sample(), Some(base));
        let between = render_loop.tick(ms(base, 50)).await;
        assert_eq!(between, TickOutcome::Drawn { sampled: false, overlay: false });

        let second = render_loop.tick(ms(base, 200)).await;
        assert_eq!(second, TickOutcome::Drawn { sampled: true, overlay: true });
        let (_, source, _) = render_loop.into_parts();
        assert_eq!(source.calls, 2);
    }

    #[tokio::test]
    async fn test_cancelled_tick_releases_sampler() {
        let mut source = ScriptedSource::new([Ok(hips(0.9)), Ok(hips(0.9))]);
        source.hang_first = true;
        let (mut render_loop, _tx) = make_loop(source, TemplateKind::Heart, &OverlayConfig::default());
        render_loop.start();
        let base = Instant::now();

        let cancelled = tokio::time::timeout(Duration::from_millis(20), render_loop.tick(base)).await;
        assert!(cancelled.is_err());
        assert!(!render_loop.sampler().is_in_flight());
        assert_eq!(render_loop.sampler().last_sample(), Some(base));

        let next = render_loop.tick(ms(base, 1000)).await;
        assert_eq!(next, TickOutcome::Drawn { sampled: true, overlay: true });
        let later = render_loop.tick(ms(base, 2000)).await;
        assert_eq!(later, TickOutcome::Drawn { sampled: true, overlay: true });
        let (_, source, _) = render_loop.into_parts();
        assert_eq!(source.calls, 3);
    }

    #[tokio::test]
    async fn test_stale_anchor_kept_between_and_after_samples() {
        let source = ScriptedSource::new([Ok(hips(0.9)), Ok(hips(0.3))]);
        let (mut render_loop, _tx) = make_loop(source, TemplateKind::Full, &OverlayConfig::default());
        render_loop.start();
        let base = Instant::now();

        render_loop.tick(base).await;
        // not due: previous anchor redrawn
        let between = render_loop.tick(ms(base, 16)).await;
        assert_eq!(between, TickOutcome::Drawn { sampled: false, overlay: true });
        // low-confidence sample leaves the old anchor in place
        let after = render_loop.tick(ms(base, 250)).await;
        assert_eq!(after, TickOutcome::Drawn { sampled: true, overlay: true });
        assert!(render_loop.anchor().is_some());
    }

    #[tokio::test]
    async fn test_stale_anchor_dropped_when_not_retained() {
        let mut config = OverlayConfig::default();
        config.render.retain_stale_anchor = false;
        let source = ScriptedSource::new([Ok(hips(0.9)), Ok(hips(0.3))]);
        let (mut render_loop, _tx) = make_loop(source, TemplateKind::Full, &config);
        render_loop.start();
        let base = Instant::now();

        render_loop.tick(base).await;
        let after = render_loop.tick(ms(base, 250)).await;
        assert_eq!(after, TickOutcome::Drawn { sampled: true, overlay: false });
        assert!(render_loop.anchor().is_none());
    }

    #[tokio::test]
    async fn test_paused_stream_is_not_ready() {
        let (tx, rx) = watch::channel(TemplateKind::Star);
        let mut stream = StillStream::new(RgbaImage::new(8, 8));
        stream.set_status(StreamStatus::Paused);
        let source = ScriptedSource::new([Ok(hips(0.9))]);
        let mut render_loop = RenderLoop::new(stream, source, RecordingSurface::default(), rx, &OverlayConfig::default());
        render_loop.start();

        assert_eq!(render_loop.tick(Instant::now()).await, TickOutcome::NotReady);
        assert!(TickOutcome::NotReady.reschedules());
        drop(tx);
        let (_, source, surface) = render_loop.into_parts();
        assert_eq!(source.calls, 0);
        assert_eq!(surface.clears, 0);
    }

    #[tokio::test]
    async fn test_loading_source_is_not_ready() {
        let mut source = ScriptedSource::new([Ok(hips(0.9))]);
        source.loading = true;
        let (mut render_loop, _tx) = make_loop(source, TemplateKind::Star, &OverlayConfig::default());
        render_loop.start();
        assert_eq!(render_loop.tick(Instant::now()).await, TickOutcome::NotReady);
        assert!(render_loop.sampler().last_sample().is_none());
        assert!(!render_loop.handle().is_source_ready());

        render_loop.source.loading = false;
        let ready = render_loop.tick(Instant::now()).await;
        assert_eq!(ready, TickOutcome::Drawn { sampled: true, overlay: true });
        assert!(render_loop.handle().is_source_ready());
    }

    #[tokio::test]
    async fn test_stop_during_estimate_discards_result() {
        let mut source = ScriptedSource::new([Ok(hips(0.9))]);
        let (mut render_loop, _tx) = {
            let (tx, rx) = watch::channel(TemplateKind::Star);
            let stream = StillStream::new(RgbaImage::new(640, 480));
            let handle = LoopHandle::new();
            source.stop_on_call = Some(handle.clone());
            let mut render_loop = RenderLoop::new(stream, source, RecordingSurface::default(), rx, &OverlayConfig::default());
            render_loop.handle = handle;
            (render_loop, tx)
        };
        render_loop.start();

        assert_eq!(render_loop.tick(Instant::now()).await, TickOutcome::Halted);
        assert!(render_loop.anchor().is_none());
        assert!(!render_loop.sampler().is_in_flight());
        assert_eq!(render_loop.surface().clears, 0);
        assert_eq!(render_loop.handle().state(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn test_template_change_applies_next_tick() {
        let (mut render_loop, tx) = make_loop(ScriptedSource::new([Ok(hips(0.9))]), TemplateKind::None, &OverlayConfig::default());
        render_loop.start();
        let base = Instant::now();

        let first = render_loop.tick(base).await;
        assert_eq!(first, TickOutcome::Drawn { sampled: true, overlay: false });

        tx.send_replace(TemplateKind::Triangle);
        let second = render_loop.tick(ms(base, 16)).await;
        assert_eq!(second, TickOutcome::Drawn { sampled: false, overlay: true });
        assert_eq!(render_loop.surface().fills[0].vertices().len(), 3);
    }

    #[test]
    fn test_handle_transitions() {
        let handle = LoopHandle::new();
        let mut rx = handle.subscribe();
        assert!(!handle.is_running());
        handle.start();
        assert!(handle.is_running());
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        handle.start();
        assert!(!rx.has_changed().unwrap());
        handle.stop();
        assert_eq!(*rx.borrow_and_update(), LoopState::Stopped);
    }

    #[test]
    fn test_shutdown_is_terminal() {
        let handle = LoopHandle::new();
        handle.start();
        handle.shutdown();
        assert_eq!(handle.state(), LoopState::ShutDown);
        handle.start();
        handle.stop();
        assert_eq!(handle.state(), LoopState::ShutDown);
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_run_parks_while_stopped_and_exits_on_shutdown() {
        let (mut render_loop, _tx) = make_loop(ScriptedSource::new([Ok(hips(0.9))]), TemplateKind::Star, &OverlayConfig::default());
        let handle = render_loop.handle();
        let driver = async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            handle.shutdown();
        };
        tokio::time::timeout(
            Duration::from_secs(2),
            async { tokio::join!(render_loop.run(Duration::from_millis(5)), driver) },
        )
        .await
        .expect("run did not return after shutdown");

        let (_, source, surface) = render_loop.into_parts();
        assert_eq!(source.calls, 0);
        assert_eq!(surface.clears, 0);
    }
}
