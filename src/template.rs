// src/template.rs - Overlay templates and their shapes
use std::f64::consts::PI;
use std::fmt;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::anchor::AnchorRegion;
use crate::surface::OverlayPath;

/// The overlay shapes a user can pick from.
///
/// Unknown identifiers map to `None`, which draws nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TemplateKind {
    #[default]
    None,
    Full,
    Brazilian,
    LandingStrip,
    Triangle,
    Heart,
    Lightning,
    Star,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 8] = [
        Self::None,
        Self::Full,
        Self::Brazilian,
        Self::LandingStrip,
        Self::Triangle,
        Self::Heart,
        Self::Lightning,
        Self::Star,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Full => "full",
            Self::Brazilian => "brazilian",
            Self::LandingStrip => "landing-strip",
            Self::Triangle => "triangle",
            Self::Heart => "heart",
            Self::Lightning => "lightning",
            Self::Star => "star",
        }
    }

    /// Human-readable label for pickers.
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Full => "Full",
            Self::Brazilian => "Brazilian",
            Self::LandingStrip => "Landing strip",
            Self::Triangle => "Triangle",
            Self::Heart => "Heart",
            Self::Lightning => "Lightning",
            Self::Star => "Star",
        }
    }

    /// Lenient parse: anything unrecognised is `None`.
    pub fn from_id(id: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == id)
            .unwrap_or(Self::None)
    }

    /// The shape for this template at `region`, or `None` for the empty
    /// template.
    pub fn outline(self, region: &AnchorRegion) -> Option<Outline> {
        let (x, y) = (region.center_x, region.center_y);
        let (w, h) = (region.width, region.height);
        let outline = match self {
            Self::None => return None,
            Self::Full => Outline::filled(OverlayPath::rect(x - w / 2.0, y - h / 2.0, w, h)),
            Self::Brazilian => Outline::filled(OverlayPath::rect(x - w / 8.0, y - h / 2.0, w / 4.0, h)),
            Self::LandingStrip => Outline::filled(OverlayPath::rect(x - w / 4.0, y - h / 2.0, w / 2.0, h)),
            Self::Triangle => Outline::filled(OverlayPath::polygon([
                Point2::new(x, y - h / 2.0),
                Point2::new(x - w / 2.0, y + h / 2.0),
                Point2::new(x + w / 2.0, y + h / 2.0),
            ])),
            Self::Heart => Outline::filled(heart(x, y, w, h)),
            Self::Lightning => Outline::stroked(lightning(x, y, w, h)),
            Self::Star => Outline::filled(star(x, y, w)),
        };
        Some(outline)
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl From<&str> for TemplateKind {
    fn from(id: &str) -> Self {
        Self::from_id(id)
    }
}

impl From<String> for TemplateKind {
    fn from(id: String) -> Self {
        Self::from_id(&id)
    }
}

impl From<TemplateKind> for String {
    fn from(kind: TemplateKind) -> Self {
        kind.id().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintMode {
    Fill,
    Stroke,
}

/// A template shape plus how it is painted.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub path: OverlayPath,
    pub mode: PaintMode,
}

impl Outline {
    fn filled(path: OverlayPath) -> Self {
        Self {
            path,
            mode: PaintMode::Fill,
        }
    }

    fn stroked(path: OverlayPath) -> Self {
        Self {
            path,
            mode: PaintMode::Stroke,
        }
    }
}

/// Two cubics leaving and re-joining (x, y + h/4): one bulging up, one down.
fn heart(x: f64, y: f64, w: f64, h: f64) -> OverlayPath {
    let mut path = OverlayPath::new();
    path.move_to(x, y + h / 4.0)
        .cubic_to(x + w / 2.0, y - h / 2.0, x - w / 2.0, y - h / 2.0, x, y + h / 4.0)
        .cubic_to(x - w / 2.0, y + h / 2.0, x + w / 2.0, y + h / 2.0, x, y + h / 4.0)
        .close();
    path
}

/// Zig-zag bolt from the top-left to the bottom-right corner and back,
/// ending on its starting vertex.
fn lightning(x: f64, y: f64, w: f64, h: f64) -> OverlayPath {
    let mut path = OverlayPath::new();
    path.move_to(x - w / 2.0, y - h / 2.0)
        .line_to(x, y)
        .line_to(x - w / 4.0, y + h / 4.0)
        .line_to(x + w / 2.0, y + h / 2.0)
        .line_to(x, y + h / 4.0)
        .line_to(x + w / 4.0, y)
        .line_to(x - w / 2.0, y - h / 2.0);
    path
}

const STAR_POINTS: usize = 5;

/// Five-pointed star, first point straight up, inner radius half the outer.
fn star(x: f64, y: f64, w: f64) -> OverlayPath {
    let outer = w / 2.0;
    let inner = outer / 2.0;
    OverlayPath::polygon((0..STAR_POINTS * 2).map(|i| {
        let radius = if i % 2 == 0 { outer } else { inner };
        let angle = i as f64 * PI / STAR_POINTS as f64 - PI / 2.0;
        Point2::new(x + radius * angle.cos(), y + radius * angle.sin())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> AnchorRegion {
        AnchorRegion {
            center_x: 120.0,
            center_y: 200.0,
            width: 32.0,
            height: 38.4,
        }
    }

    fn close(a: Point2<f64>, b: Point2<f64>) -> bool {
        (a - b).norm() < 1e-9
    }

    #[test]
    fn test_ids_round_trip() {
        for kind in TemplateKind::ALL {
            assert_eq!(TemplateKind::from_id(kind.id()), kind);
            assert_eq!(kind.to_string(), kind.id());
        }
    }

    #[test]
    fn test_unknown_id_is_none() {
        assert_eq!(TemplateKind::from("bikini"), TemplateKind::None);
        assert_eq!(TemplateKind::from(""), TemplateKind::None);
        assert_eq!(TemplateKind::from("Star"), TemplateKind::None);
    }

    #[test]
    fn test_serde_uses_ids() {
        let json = serde_json::to_string(&TemplateKind::LandingStrip).unwrap();
        assert_eq!(json, "\"landing-strip\"");
        let kind: TemplateKind = serde_json::from_str("\"heart\"").unwrap();
        assert_eq!(kind, TemplateKind::Heart);
    }

    #[test]
    fn test_none_has_no_outline() {
        assert!(TemplateKind::None.outline(&region()).is_none());
    }

    #[test]
    fn test_strip_widths() {
        let full = TemplateKind::Full.outline(&region()).unwrap().path.vertices();
        let brazilian = TemplateKind::Brazilian.outline(&region()).unwrap().path.vertices();
        let strip = TemplateKind::LandingStrip.outline(&region()).unwrap().path.vertices();
        let width = |v: &[Point2<f64>]| v[1].x - v[0].x;
        assert!((width(&full) - 32.0).abs() < 1e-9);
        assert!((width(&brazilian) - 8.0).abs() < 1e-9);
        assert!((width(&strip) - 16.0).abs() < 1e-9);
        // all centred and full height
        for v in [&full, &brazilian, &strip] {
            assert!(((v[0].x + v[1].x) / 2.0 - 120.0).abs() < 1e-9);
            assert!((v[2].y - v[0].y - 38.4).abs() < 1e-9);
        }
    }

    #[test]
    fn test_triangle_apex_and_base() {
        let v = TemplateKind::Triangle.outline(&region()).unwrap().path.vertices();
        assert_eq!(v.len(), 3);
        assert!(close(v[0], Point2::new(120.0, 180.8)));
        assert!(close(v[1], Point2::new(104.0, 219.2)));
        assert!(close(v[2], Point2::new(136.0, 219.2)));
    }

    #[test]
    fn test_star_has_ten_alternating_vertices() {
        let outline = TemplateKind::Star.outline(&region()).unwrap();
        assert_eq!(outline.mode, PaintMode::Fill);
        let v = outline.path.vertices();
        assert_eq!(v.len(), 10);
        let center = Point2::new(120.0, 200.0);
        assert!(close(v[0], Point2::new(120.0, 184.0)));
        for (i, p) in v.iter().enumerate() {
            let expected = if i % 2 == 0 { 16.0 } else { 8.0 };
            assert!(((p - center).norm() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_lightning_is_closed_stroke() {
        let outline = TemplateKind::Lightning.outline(&region()).unwrap();
        assert_eq!(outline.mode, PaintMode::Stroke);
        let v = outline.path.vertices();
        assert_eq!(v.len(), 7);
        assert_eq!(v[0], v[6]);
    }

    #[test]
    fn test_heart_is_two_cubics() {
        let outline = TemplateKind::Heart.outline(&region()).unwrap();
        assert_eq!(outline.mode, PaintMode::Fill);
        let cubics = outline
            .path
            .commands()
            .iter()
            .filter(|cmd| matches!(cmd, crate::surface::PathCommand::CubicTo { .. }))
            .count();
        assert_eq!(cubics, 2);
    }
}
