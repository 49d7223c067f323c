// src/ui.rs - Viewer theme and the layered video widget
use std::sync::Arc;

use eframe::egui::{self, Color32, Pos2, Rect, Vec2};

use pose_overlay::{OverlayFrame, VideoFrame};

#[derive(Debug, Clone)]
pub struct Theme {
    pub background: Color32,
    pub surface: Color32,
    pub widget: Color32,
    pub widget_hovered: Color32,
    pub accent: Color32,
    pub error: Color32,
    pub success: Color32,
    pub warning: Color32,
    pub text_secondary: Color32,
    pub rounding: f32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color32::from_rgb(20, 20, 25),
            surface: Color32::from_rgb(30, 30, 35),
            widget: Color32::from_rgb(45, 45, 52),
            widget_hovered: Color32::from_rgb(55, 55, 65),
            accent: Color32::from_rgb(70, 130, 240),
            error: Color32::from_rgb(244, 67, 54),
            success: Color32::from_rgb(76, 175, 80),
            warning: Color32::from_rgb(255, 179, 0),
            text_secondary: Color32::from_rgb(200, 200, 200),
            rounding: 8.0,
        }
    }
}

/// Dark egui visuals painted with `theme`'s palette.
pub fn create_visuals(theme: &Theme) -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();
    let rounding = egui::Rounding::same(theme.rounding);

    visuals.panel_fill = theme.background;
    visuals.window_fill = theme.surface;
    visuals.selection.bg_fill = theme.accent;
    visuals.error_fg_color = theme.error;
    visuals.warn_fg_color = theme.warning;

    let widgets = &mut visuals.widgets;
    for (state, fill) in [
        (&mut widgets.noninteractive, theme.surface),
        (&mut widgets.inactive, theme.widget),
        (&mut widgets.hovered, theme.widget_hovered),
        (&mut widgets.active, theme.accent),
    ] {
        state.bg_fill = fill;
        state.rounding = rounding;
    }

    visuals.window_rounding = egui::Rounding::same(theme.rounding * 1.5);
    visuals.menu_rounding = rounding;
    visuals
}

/// Camera frame with the overlay composited on top, both letterboxed into
/// the available space at the frame's aspect ratio.
pub struct VideoWidget {
    frame: Option<egui::TextureHandle>,
    overlay: Option<egui::TextureHandle>,
    // Last uploaded sources; re-upload only when the Arc changes.
    frame_source: Option<VideoFrame>,
    overlay_source: Option<OverlayFrame>,
    aspect_ratio: f32,
}

impl Default for VideoWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoWidget {
    pub fn new() -> Self {
        Self {
            frame: None,
            overlay: None,
            frame_source: None,
            overlay_source: None,
            aspect_ratio: 4.0 / 3.0,
        }
    }

    pub fn update_frame(&mut self, ctx: &egui::Context, frame: &VideoFrame) {
        if self.frame_source.as_ref().is_some_and(|last| Arc::ptr_eq(last, frame)) {
            return;
        }
        let size = [frame.width() as usize, frame.height() as usize];
        let image = egui::ColorImage::from_rgba_unmultiplied(size, frame.as_raw());
        upload(ctx, &mut self.frame, "video_frame", image);

        if frame.height() > 0 {
            self.aspect_ratio = frame.width() as f32 / frame.height() as f32;
        }
        self.frame_source = Some(Arc::clone(frame));
    }

    pub fn update_overlay(&mut self, ctx: &egui::Context, overlay: &OverlayFrame) {
        if self.overlay_source.as_ref().is_some_and(|last| Arc::ptr_eq(last, overlay)) {
            return;
        }
        let size = [overlay.width() as usize, overlay.height() as usize];
        // tiny-skia stores premultiplied RGBA, same as egui's texture format
        let image = egui::ColorImage::from_rgba_premultiplied(size, overlay.data());
        upload(ctx, &mut self.overlay, "overlay_frame", image);
        self.overlay_source = Some(Arc::clone(overlay));
    }

    pub fn show(&self, ui: &mut egui::Ui, theme: &Theme) {
        let available = ui.available_rect_before_wrap();
        let rect = fit_rect(available, self.aspect_ratio);
        ui.allocate_rect(available, egui::Sense::hover());

        let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
        let Some(frame) = &self.frame else {
            ui.painter().rect_filled(rect, egui::Rounding::same(4.0), theme.surface);
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No Video Signal",
                egui::FontId::proportional(16.0),
                theme.text_secondary,
            );
            return;
        };

        ui.painter().image(frame.id(), rect, uv, Color32::WHITE);
        if let Some(overlay) = &self.overlay {
            ui.painter().image(overlay.id(), rect, uv, Color32::WHITE);
        }
    }
}

fn upload(ctx: &egui::Context, slot: &mut Option<egui::TextureHandle>, name: &str, image: egui::ColorImage) {
    match slot {
        Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
        None => *slot = Some(ctx.load_texture(name, image, egui::TextureOptions::LINEAR)),
    }
}

/// Largest rect with `aspect_ratio` that fits in `available`, centred.
fn fit_rect(available: Rect, aspect_ratio: f32) -> Rect {
    if available.height() <= 0.0 || aspect_ratio <= 0.0 {
        return available;
    }
    let size = if available.width() / available.height() > aspect_ratio {
        Vec2::new(available.height() * aspect_ratio, available.height())
    } else {
        Vec2::new(available.width(), available.width() / aspect_ratio)
    };
    Rect::from_center_size(available.center(), size)
}
