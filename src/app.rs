// src/app.rs - Viewer window: video, overlay and template picker
use eframe::egui;
use tokio::sync::watch;
use tracing::info;

use pose_overlay::{CameraFeed, LoopHandle, OverlayFrame, StreamStatus, TemplateKind, VideoStream};

use crate::ui::{Theme, VideoWidget};

/// Everything the viewer needs from the running pipeline.
pub struct ViewerParts {
    /// The viewer's own view of the video the loop is drawing on.
    pub stream: Box<dyn VideoStream + Send>,
    /// Held so the capture thread lives as long as the window.
    pub camera: Option<CameraFeed>,
    pub overlay: watch::Receiver<Option<OverlayFrame>>,
    pub template: watch::Sender<TemplateKind>,
    pub loop_handle: LoopHandle,
}

pub struct OverlayViewerApp {
    parts: ViewerParts,
    selected: TemplateKind,
    paused: bool,
    video: VideoWidget,
    theme: Theme,
    show_about: bool,
}

impl OverlayViewerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, parts: ViewerParts) -> Self {
        let theme = Theme::default();
        cc.egui_ctx.set_visuals(crate::ui::create_visuals(&theme));
        let selected = *parts.template.borrow();
        Self {
            parts,
            selected,
            paused: false,
            video: VideoWidget::new(),
            theme,
            show_about: false,
        }
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(10.0);
            egui::menu::bar(ui, |ui| {
                ui.heading("Pose Overlay");
                ui.separator();

                let previous = self.selected;
                egui::ComboBox::from_label("Template")
                    .selected_text(self.selected.label())
                    .show_ui(ui, |ui| {
                        for kind in TemplateKind::ALL {
                            ui.selectable_value(&mut self.selected, kind, kind.label());
                        }
                    });
                if self.selected != previous {
                    info!(template = %self.selected, "template selected");
                    self.parts.template.send_replace(self.selected);
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("ℹ About").clicked() {
                        self.show_about = !self.show_about;
                    }
                });
            });
            ui.add_space(10.0);
        });
    }

    fn render_control_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                if let Some(camera) = &self.parts.camera {
                    let label = if self.paused { "▶ Resume" } else { "⏸ Pause" };
                    if ui.add_sized([100.0, 28.0], egui::Button::new(label)).clicked() {
                        self.paused = !self.paused;
                        camera.set_paused(self.paused);
                    }
                    ui.separator();
                }

                let (text, color) = if self.parts.loop_handle.is_running() {
                    ("● Tracking", self.theme.success)
                } else {
                    ("● Stopped", self.theme.error)
                };
                ui.label(egui::RichText::new(text).color(color));

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let (w, h) = self.parts.stream.dimensions();
                    let status = self.parts.stream.status();
                    let source_ready = self.parts.loop_handle.is_source_ready();
                    let color = if status.is_playing() && !source_ready {
                        self.theme.warning
                    } else {
                        self.theme.text_secondary
                    };
                    ui.label(
                        egui::RichText::new(format!("{} · {w}×{h}", status_label(status, source_ready))).color(color),
                    );
                });
            });
            ui.add_space(6.0);
        });
    }

    fn render_about_window(&mut self, ctx: &egui::Context) {
        egui::Window::new("About")
            .open(&mut self.show_about)
            .resizable(false)
            .default_size([360.0, 200.0])
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading("Pose Overlay");
                    ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                    ui.add_space(12.0);
                    ui.label("Draws a template over the hip region");
                    ui.label("of the most confident detected pose.");
                });
            });
    }
}

/// Stream state first; a live stream whose pose source is still loading
/// shows that instead of "Live".
fn status_label(status: StreamStatus, source_ready: bool) -> &'static str {
    match status {
        StreamStatus::Waiting => "Starting camera",
        StreamStatus::Playing if !source_ready => "Loading pose model",
        StreamStatus::Playing => "Live",
        StreamStatus::Paused => "Paused",
        StreamStatus::Ended => "Stream ended",
    }
}

impl eframe::App for OverlayViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(frame) = self.parts.stream.current_frame() {
            self.video.update_frame(ctx, &frame);
        }
        let overlay = self.parts.overlay.borrow_and_update().clone();
        if let Some(overlay) = overlay {
            self.video.update_overlay(ctx, &overlay);
        }

        self.render_header(ctx);
        self.render_control_panel(ctx);
        if self.show_about {
            self.render_about_window(ctx);
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(self.theme.background))
            .show(ctx, |ui| self.video.show(ui, &self.theme));

        ctx.request_repaint();
    }
}
