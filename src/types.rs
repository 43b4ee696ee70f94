//! Core value types: points, colors, bounding boxes and affine transforms.

use std::fmt;
use std::str::FromStr;

use glam::{DAffine2, DMat2, DVec2};
use thiserror::Error;

/// A point in user, NDC or device space, depending on context
pub type Point = DVec2;

/// 48-bit RGB color, 16 bits per channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(0xffff, 0xffff, 0xffff);

    pub const fn new(red: u16, green: u16, blue: u16) -> Self {
        Color { red, green, blue }
    }

    /// Widen 8-bit channels so that 0xff maps to 0xffff.
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Color::new(r as u16 * 0x101, g as u16 * 0x101, b as u16 * 0x101)
    }

    pub fn to_rgb8(self) -> [u8; 3] {
        [
            (self.red >> 8) as u8,
            (self.green >> 8) as u8,
            (self.blue >> 8) as u8,
        ]
    }

    /// Luminance-weighted gray with the same brightness.
    pub fn grayscale(self) -> Color {
        let gray = 0.212671 * f64::from(self.red)
            + 0.715160 * f64::from(self.green)
            + 0.072169 * f64::from(self.blue);
        let gray = gray.round().clamp(0.0, 65535.0) as u16;
        Color::new(gray, gray, gray)
    }

    /// Move each channel toward white by `amount` (0 = unchanged, 1 = white).
    pub fn desaturate(self, amount: f64) -> Color {
        let mix = |c: u16| {
            let c = c as f64 / 65535.0;
            let c = c + amount * (1.0 - c);
            (c * 65535.0).round().clamp(0.0, 65535.0) as u16
        };
        Color::new(mix(self.red), mix(self.green), mix(self.blue))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.to_rgb8();
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

/// A color string that is neither a known name nor `#rrggbb`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown color name: {0}")]
pub struct UnknownColor(pub String);

// Subset of the X11 color database; lookups ignore case and spaces.
const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("gray", [190, 190, 190]),
    ("grey", [190, 190, 190]),
    ("darkgray", [169, 169, 169]),
    ("darkgrey", [169, 169, 169]),
    ("lightgray", [211, 211, 211]),
    ("lightgrey", [211, 211, 211]),
    ("dimgray", [105, 105, 105]),
    ("orange", [255, 165, 0]),
    ("darkorange", [255, 140, 0]),
    ("brown", [165, 42, 42]),
    ("pink", [255, 192, 203]),
    ("purple", [160, 32, 240]),
    ("violet", [238, 130, 238]),
    ("navy", [0, 0, 128]),
    ("navyblue", [0, 0, 128]),
    ("darkblue", [0, 0, 139]),
    ("lightblue", [173, 216, 230]),
    ("skyblue", [135, 206, 235]),
    ("steelblue", [70, 130, 180]),
    ("darkgreen", [0, 100, 0]),
    ("forestgreen", [34, 139, 34]),
    ("lightgreen", [144, 238, 144]),
    ("darkred", [139, 0, 0]),
    ("maroon", [176, 48, 96]),
    ("gold", [255, 215, 0]),
    ("beige", [245, 245, 220]),
    ("ivory", [255, 255, 240]),
    ("khaki", [240, 230, 140]),
    ("salmon", [250, 128, 114]),
    ("tan", [210, 180, 140]),
    ("turquoise", [64, 224, 208]),
    ("coral", [255, 127, 80]),
];

impl FromStr for Color {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(hex) = trimmed.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| UnknownColor(s.to_string()));
        }
        let key: String = trimmed
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, [r, g, b])| Color::from_rgb8(*r, *g, *b))
            .ok_or_else(|| UnknownColor(s.to_string()))
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::from_rgb8(channel(0)?, channel(2)?, channel(4)?))
}

/// Axis-aligned bounding box. The empty box is inverted so the first
/// expansion snaps it to the point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl Default for BBox {
    fn default() -> Self {
        Self::new()
    }
}

impl BBox {
    /// Create an empty bounding box (will expand on first point)
    pub fn new() -> Self {
        BBox {
            min: DVec2::splat(f64::MAX),
            max: DVec2::splat(-f64::MAX),
        }
    }

    /// Check if the bbox is empty (never expanded)
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Expand to include a point
    pub fn expand_point(&mut self, p: Point) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// True if `other` lies entirely inside this box.
    pub fn contains(&self, other: &BBox) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
    }
}

// Relative tolerance when deciding whether a map is uniform.
const UNIFORM_FUZZ: f64 = 0.0000001;

/// The current user frame -> device frame map, plus the properties of it
/// that backends care about when choosing primitive representations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// User frame -> normalized device coordinates
    pub user_to_ndc: DAffine2,
    /// Composite user frame -> device frame map
    pub user_to_device: DAffine2,
    /// The composite map sends horizontal lines to horizontal lines (and vertical to vertical)
    pub axes_preserved: bool,
    /// The composite map is a similarity (circles stay circles)
    pub uniform: bool,
    /// The map, seen on the physical display, involves no reflection
    pub nonreflection: bool,
}

impl Transform {
    /// Compose `user_to_ndc` with the device's fixed NDC map and classify the result.
    pub fn new(user_to_ndc: DAffine2, ndc_to_device: DAffine2, flipped_y: bool) -> Self {
        let user_to_device = ndc_to_device * user_to_ndc;
        let t = user_to_device.to_cols_array();

        let axes_preserved = t[1] == 0.0 && t[2] == 0.0;

        let is_zero = |v: f64| {
            v.abs() < UNIFORM_FUZZ * (t[0] * t[0]).max(t[1] * t[1])
                && v.abs() < UNIFORM_FUZZ * (t[2] * t[2]).max(t[3] * t[3])
        };
        let uniform = is_zero(t[0] * t[0] + t[1] * t[1] - t[2] * t[2] - t[3] * t[3])
            && is_zero(t[0] * t[2] + t[1] * t[3]);

        let det = t[0] * t[3] - t[1] * t[2];
        let sign = if flipped_y { -1.0 } else { 1.0 };
        let nonreflection = sign * det >= 0.0;

        Transform {
            user_to_ndc,
            user_to_device,
            axes_preserved,
            uniform,
            nonreflection,
        }
    }

    pub fn to_device(&self, p: Point) -> Point {
        self.user_to_device.transform_point2(p)
    }

    pub fn to_device_vector(&self, v: DVec2) -> DVec2 {
        self.user_to_device.transform_vector2(v)
    }

    /// Smallest singular value of the linear part of the user -> device map.
    pub fn min_device_scale(&self) -> f64 {
        singular_values(self.user_to_device.matrix2).0
    }
}

/// (min, max) singular values of a 2x2 matrix.
pub fn singular_values(m: DMat2) -> (f64, f64) {
    let (a, b) = (m.x_axis.x, m.x_axis.y);
    let (c, d) = (m.y_axis.x, m.y_axis.y);
    // eigenvalues of M^T M
    let p = a * a + b * b;
    let q = a * c + b * d;
    let r = c * c + d * d;
    let mean = 0.5 * (p + r);
    let spread = (0.25 * (p - r) * (p - r) + q * q).sqrt();
    ((mean - spread).max(0.0).sqrt(), (mean + spread).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::dvec2;

    // ==================== Color tests ====================

    #[test]
    fn color_names_ignore_case_and_spaces() {
        assert_eq!("Light Blue".parse::<Color>(), Ok(Color::from_rgb8(173, 216, 230)));
        assert_eq!("WHITE".parse::<Color>(), Ok(Color::WHITE));
    }

    #[test]
    fn color_hex_round_trips_through_display() {
        let c: Color = "#1a2b3c".parse().unwrap();
        assert_eq!(c.to_rgb8(), [0x1a, 0x2b, 0x3c]);
        assert_eq!(c.to_string(), "#1a2b3c");
    }

    #[test]
    fn color_rejects_garbage() {
        assert!("#12345".parse::<Color>().is_err());
        assert!("nosuchcolor".parse::<Color>().is_err());
    }

    #[test]
    fn grayscale_keeps_black_and_white() {
        assert_eq!(Color::BLACK.grayscale(), Color::BLACK);
        assert_eq!(Color::WHITE.grayscale(), Color::WHITE);
        let green = Color::new(0, 0xffff, 0).grayscale();
        assert_eq!(green.red, 46868);
        assert_eq!(green.red, green.blue);
    }

    #[test]
    fn desaturate_moves_toward_white() {
        assert_eq!(Color::BLACK.desaturate(0.0), Color::BLACK);
        assert_eq!(Color::BLACK.desaturate(1.0), Color::WHITE);
        let half = Color::BLACK.desaturate(0.5);
        assert_eq!(half.red, 32768);
    }

    // ==================== BBox tests ====================

    #[test]
    fn bbox_starts_empty() {
        let b = BBox::new();
        assert!(b.is_empty());
        assert_eq!(b.min.x, f64::MAX);
        assert_eq!(b.max.x, -f64::MAX);
    }

    #[test]
    fn bbox_expands() {
        let mut b = BBox::new();
        b.expand_point(dvec2(1.0, 2.0));
        b.expand_point(dvec2(-1.0, 5.0));
        assert!(!b.is_empty());
        assert_eq!(b.width(), 2.0);
        assert_eq!(b.height(), 3.0);
    }

    #[test]
    fn bbox_containment() {
        let mut outer = BBox::new();
        outer.expand_point(dvec2(0.0, 0.0));
        outer.expand_point(dvec2(10.0, 10.0));
        let mut inner = BBox::new();
        inner.expand_point(dvec2(2.0, 2.0));
        inner.expand_point(dvec2(3.0, 3.0));
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(!outer.contains(&BBox::new()));
    }

    // ==================== Transform tests ====================

    #[test]
    fn identity_is_axis_preserving_and_uniform() {
        let t = Transform::new(DAffine2::IDENTITY, DAffine2::IDENTITY, false);
        assert!(t.axes_preserved);
        assert!(t.uniform);
        assert!(t.nonreflection);
    }

    #[test]
    fn rotation_is_uniform_but_not_axis_preserving() {
        let rot = DAffine2::from_angle(0.3);
        let t = Transform::new(rot, DAffine2::IDENTITY, false);
        assert!(!t.axes_preserved);
        assert!(t.uniform);
    }

    #[test]
    fn anisotropic_scale_is_not_uniform() {
        let s = DAffine2::from_scale(dvec2(2.0, 1.0));
        let t = Transform::new(s, DAffine2::IDENTITY, false);
        assert!(t.axes_preserved);
        assert!(!t.uniform);
    }

    #[test]
    fn flipped_device_cancels_reflection() {
        let flip = DAffine2::from_scale(dvec2(1.0, -1.0));
        let t = Transform::new(DAffine2::IDENTITY, flip, true);
        assert!(t.nonreflection);
        let t = Transform::new(DAffine2::IDENTITY, flip, false);
        assert!(!t.nonreflection);
    }

    #[test]
    fn singular_values_of_scale() {
        let (lo, hi) = singular_values(DMat2::from_diagonal(dvec2(3.0, 0.5)));
        assert!((lo - 0.5).abs() < 1e-12);
        assert!((hi - 3.0).abs() < 1e-12);
    }
}
