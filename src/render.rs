// src/render.rs - Template renderer with the randomized texture pass
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::anchor::AnchorRegion;
use crate::surface::{DrawStyle, DrawingSurface, OverlayPath, Rgba};
use crate::template::{PaintMode, TemplateKind};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub fill: Rgba,
    pub stroke: Rgba,
    pub line_width: f32,
    pub texture: Rgba,
    pub texture_line_width: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            fill: Rgba::BLACK,
            stroke: Rgba::BLACK,
            line_width: 2.0,
            texture: Rgba::BLACK.with_alpha(0.6),
            texture_line_width: 1.0,
        }
    }
}

impl OverlayStyle {
    fn shape(&self) -> DrawStyle {
        DrawStyle {
            fill: self.fill,
            stroke: self.stroke,
            line_width: self.line_width,
        }
    }

    fn texture(&self) -> DrawStyle {
        DrawStyle {
            fill: self.texture,
            stroke: self.texture,
            line_width: self.texture_line_width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureConfig {
    /// Short strokes scattered over the region per frame.
    pub strokes: usize,
    /// Max offset of a stroke's end from its start, per axis.
    pub jitter: f64,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            strokes: 50,
            jitter: 5.0,
        }
    }
}

/// Draws a template and its texture at an anchor. Holds no per-frame state.
#[derive(Debug, Clone, Default)]
pub struct OverlayRenderer {
    style: OverlayStyle,
    texture: TextureConfig,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle, texture: TextureConfig) -> Self {
        Self { style, texture }
    }

    /// Draws onto `surface` without clearing it first.
    pub fn render<S, R>(&self, surface: &mut S, region: &AnchorRegion, template: TemplateKind, rng: &mut R)
    where
        S: DrawingSurface + ?Sized,
        R: Rng + ?Sized,
    {
        let Some(outline) = template.outline(region) else {
            return;
        };

        surface.set_style(self.style.shape());
        match outline.mode {
            PaintMode::Fill => surface.fill_path(&outline.path),
            PaintMode::Stroke => surface.stroke_path(&outline.path),
        }

        self.draw_texture(surface, region, rng);
    }

    fn draw_texture<S, R>(&self, surface: &mut S, region: &AnchorRegion, rng: &mut R)
    where
        S: DrawingSurface + ?Sized,
        R: Rng + ?Sized,
    {
        surface.set_style(self.style.texture());
        let jitter = self.texture.jitter * 2.0;
        for _ in 0..self.texture.strokes {
            // `gen::<f64>() - 0.5` rather than `gen_range`, which panics on the
            // empty range of a zero-width region.
            let x = region.center_x + (rng.gen::<f64>() - 0.5) * region.width;
            let y = region.center_y + (rng.gen::<f64>() - 0.5) * region.height;
            let dx = (rng.gen::<f64>() - 0.5) * jitter;
            let dy = (rng.gen::<f64>() - 0.5) * jitter;

            let mut stroke = OverlayPath::new();
            stroke.move_to(x, y).line_to(x + dx, y + dy);
            surface.stroke_path(&stroke);
        }
    }
}
