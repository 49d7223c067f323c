// src/surface.rs - 2D drawing surface abstraction and its tiny-skia backend
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use nalgebra::Point2;
use resvg::tiny_skia::{self, BlendMode, Color, FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{ConfigError, OverlayError};

/// Straight (non-premultiplied) RGBA color, written as `#rgb`, `#rrggbb` or
/// `#rrggbbaa` in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Same color with a fractional alpha, like CSS `rgba(r, g, b, alpha)`.
    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..self
        }
    }
}

impl FromStr for Rgba {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Color(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        // from_str_radix alone would take a sign
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).map_err(|_| invalid());
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        match hex.len() {
            3 => Ok(Rgba::new(nibble(0)? * 17, nibble(1)? * 17, nibble(2)? * 17, 255)),
            6 => Ok(Rgba::new(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Ok(Rgba::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Rgba {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgba> for String {
    fn from(color: Rgba) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Fill color, stroke color and stroke width applied to subsequent draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawStyle {
    pub fill: Rgba,
    pub stroke: Rgba,
    pub line_width: f32,
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self {
            fill: Rgba::BLACK,
            stroke: Rgba::BLACK,
            line_width: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point2<f64>),
    LineTo(Point2<f64>),
    CubicTo {
        ctrl1: Point2<f64>,
        ctrl2: Point2<f64>,
        to: Point2<f64>,
    },
    Close,
}

/// Backend-neutral vector path in frame pixels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayPath {
    commands: Vec<PathCommand>,
}

impl OverlayPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Axis-aligned rectangle from its top-left corner.
    pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Self {
        let mut path = Self::new();
        path.move_to(x, y)
            .line_to(x + width, y)
            .line_to(x + width, y + height)
            .line_to(x, y + height)
            .close();
        path
    }

    /// Closed polygon through `points`.
    pub fn polygon(points: impl IntoIterator<Item = Point2<f64>>) -> Self {
        let mut path = Self::new();
        for (i, p) in points.into_iter().enumerate() {
            if i == 0 {
                path.move_to(p.x, p.y);
            } else {
                path.line_to(p.x, p.y);
            }
        }
        path.close();
        path
    }

    pub fn move_to(&mut self, x: f64, y: f64) -> &mut Self {
        self.commands.push(PathCommand::MoveTo(Point2::new(x, y)));
        self
    }

    pub fn line_to(&mut self, x: f64, y: f64) -> &mut Self {
        self.commands.push(PathCommand::LineTo(Point2::new(x, y)));
        self
    }

    pub fn cubic_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x: f64, y: f64) -> &mut Self {
        self.commands.push(PathCommand::CubicTo {
            ctrl1: Point2::new(x1, y1),
            ctrl2: Point2::new(x2, y2),
            to: Point2::new(x, y),
        });
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.commands.push(PathCommand::Close);
        self
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Every on-curve point, in order.
    pub fn vertices(&self) -> Vec<Point2<f64>> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                PathCommand::MoveTo(p) | PathCommand::LineTo(p) => Some(*p),
                PathCommand::CubicTo { to, .. } => Some(*to),
                PathCommand::Close => None,
            })
            .collect()
    }

    fn to_skia(&self) -> Option<tiny_skia::Path> {
        if self.is_empty() {
            return None;
        }
        let mut pb = PathBuilder::new();
        for cmd in &self.commands {
            match *cmd {
                PathCommand::MoveTo(p) => pb.move_to(p.x as f32, p.y as f32),
                PathCommand::LineTo(p) => pb.line_to(p.x as f32, p.y as f32),
                PathCommand::CubicTo { ctrl1, ctrl2, to } => pb.cubic_to(
                    ctrl1.x as f32,
                    ctrl1.y as f32,
                    ctrl2.x as f32,
                    ctrl2.y as f32,
                    to.x as f32,
                    to.y as f32,
                ),
                PathCommand::Close => pb.close(),
            }
        }
        // None for empty, single-point or non-finite paths.
        pb.finish()
    }
}

/// Pixel rectangle for `clear_rect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A 2D canvas the overlay is drawn on.
///
/// Draw calls use whatever style was last set. Drawing degenerate geometry is
/// a no-op, never an error.
pub trait DrawingSurface {
    /// Native size in pixels.
    fn size(&self) -> (u32, u32);

    /// Resets the rectangle to fully transparent.
    fn clear_rect(&mut self, rect: SurfaceRect);

    fn set_style(&mut self, style: DrawStyle);

    fn fill_path(&mut self, path: &OverlayPath);

    fn stroke_path(&mut self, path: &OverlayPath);

    /// Hands the finished frame to whoever displays it.
    fn present(&mut self) {}

    fn clear(&mut self) {
        let (width, height) = self.size();
        self.clear_rect(SurfaceRect {
            x: 0,
            y: 0,
            width,
            height,
        });
    }
}

/// A presented overlay frame, premultiplied RGBA8.
pub type OverlayFrame = Arc<Pixmap>;

/// tiny-skia pixmap backend.
pub struct PixmapSurface {
    pixmap: Pixmap,
    style: DrawStyle,
    publisher: Option<watch::Sender<Option<OverlayFrame>>>,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, OverlayError> {
        let pixmap = Pixmap::new(width, height).ok_or(OverlayError::InvalidSurface { width, height })?;
        Ok(Self {
            pixmap,
            style: DrawStyle::default(),
            publisher: None,
        })
    }

    /// Publishes a copy of the pixmap on every `present`.
    pub fn with_publisher(mut self, publisher: watch::Sender<Option<OverlayFrame>>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Number of pixels that are not fully transparent.
    pub fn painted_pixels(&self) -> usize {
        self.pixmap.pixels().iter().filter(|px| px.alpha() > 0).count()
    }

    fn paint(color: Rgba) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        paint.anti_alias = true;
        paint
    }
}

impl DrawingSurface for PixmapSurface {
    fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }

    fn clear_rect(&mut self, rect: SurfaceRect) {
        let (width, height) = self.size();
        if rect.x == 0 && rect.y == 0 && rect.width >= width && rect.height >= height {
            self.pixmap.fill(Color::TRANSPARENT);
            return;
        }
        let Some(area) = tiny_skia::Rect::from_xywh(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
        ) else {
            return;
        };
        let mut paint = Paint::default();
        paint.blend_mode = BlendMode::Clear;
        self.pixmap.fill_rect(area, &paint, Transform::identity(), None);
    }

    fn set_style(&mut self, style: DrawStyle) {
        self.style = style;
    }

    fn fill_path(&mut self, path: &OverlayPath) {
        if let Some(path) = path.to_skia() {
            let paint = Self::paint(self.style.fill);
            self.pixmap
                .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    fn stroke_path(&mut self, path: &OverlayPath) {
        if !(self.style.line_width > 0.0) {
            return;
        }
        if let Some(path) = path.to_skia() {
            let paint = Self::paint(self.style.stroke);
            let stroke = Stroke {
                width: self.style.line_width,
                ..Stroke::default()
            };
            self.pixmap
                .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }

    fn present(&mut self) {
        if let Some(publisher) = &self.publisher {
            // Nobody watching is fine; the frame is just dropped.
            publisher.send_replace(Some(Arc::new(self.pixmap.clone())));
        }
    }
}
