//! The contract between the device pipeline and an output format.
//!
//! A [`Backend`] implements only the hooks that matter for its output model;
//! every hook has a default that does nothing and succeeds. The device owns
//! all drawing state and hands backends a read-only view of it, plus the
//! page buffer and output sink, through a [`Surface`].
//!
//! Backends describe themselves with [`Capabilities`]: what the user may
//! query through `have_cap`, which output model drives page handling, and
//! under which transforms each kind of curve or closed shape may be sent
//! as a single primitive instead of being decomposed.

mod meta;
mod null;
mod pnm;
mod svg;
mod tek;

use std::io;

use enum_dispatch::enum_dispatch;
use glam::{DAffine2, DVec2};

use crate::errors::{PlotError, Result};
use crate::page::{OutputModel, PageBuffer};
use crate::params::ResolvedParams;
use crate::registry::{self, SharedSink};
use crate::render::{DrawingState, Path, defaults};
use crate::types::Transform;

pub use meta::MetaBackend;
pub use null::NullBackend;
pub use pnm::PnmBackend;
pub use svg::SvgBackend;
pub use tek::TekBackend;

/// Answer to a capability query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Unsupported,
    Supported,
    /// Depends on the output device, which can't be known in advance
    Maybe,
}

/// Transforms under which a backend accepts a curve or closed shape as one
/// primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingPolicy {
    /// Never; always decompose
    None,
    /// Under any affine transform
    Any,
    /// Only if the transform maps horizontal to horizontal and vertical to vertical
    AxesPreserved,
    /// Only if the transform is a similarity
    Uniform,
}

impl ScalingPolicy {
    pub fn allows(self, transform: &Transform) -> bool {
        match self {
            ScalingPolicy::None => false,
            ScalingPolicy::Any => true,
            ScalingPolicy::AxesPreserved => transform.axes_preserved,
            ScalingPolicy::Uniform => transform.uniform,
        }
    }
}

/// Kind of coordinates a device draws in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCoords {
    Real,
    /// Integer addresses, as on a vector terminal
    Integer,
    /// Pixels scan-converted with integer stepping; zero-width lines are
    /// drawn one pixel wide
    IntegerRaster,
}

/// What a backend can do, fixed after `initialize`
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    /// Name used by [`AnyBackend::from_name`]
    pub type_name: &'static str,
    pub output_model: OutputModel,
    /// Device y coordinates grow downward
    pub flipped_y: bool,
    pub device_coords: DeviceCoords,
    pub default_font: &'static str,

    pub have_wide_lines: Capability,
    pub have_dash_array: Capability,
    pub have_solid_fill: Capability,
    pub have_odd_winding_fill: Capability,
    pub have_nonzero_winding_fill: Capability,
    pub have_settable_bg: Capability,
    pub have_ps_fonts: Capability,
    pub have_pcl_fonts: Capability,
    pub have_stick_fonts: Capability,
    pub have_extra_stick_fonts: Capability,

    /// `paint_text` honors horizontal justification itself
    pub have_horizontal_justification: bool,
    /// `paint_text` honors vertical justification itself
    pub have_vertical_justification: bool,

    /// Curves may share a simple path with other segments
    pub have_mixed_paths: bool,
    pub arc_scaling: ScalingPolicy,
    pub ellarc_scaling: ScalingPolicy,
    pub quad_scaling: ScalingPolicy,
    pub cubic_scaling: ScalingPolicy,
    pub box_scaling: ScalingPolicy,
    pub circle_scaling: ScalingPolicy,
    pub ellipse_scaling: ScalingPolicy,
}

impl Capabilities {
    /// The generic device: no output, everything decomposed.
    pub const GENERIC: Capabilities = Capabilities {
        type_name: "generic",
        output_model: OutputModel::NoOutput,
        flipped_y: false,
        device_coords: DeviceCoords::Real,
        default_font: crate::render::defaults::FONT_NAME,
        have_wide_lines: Capability::Supported,
        have_dash_array: Capability::Supported,
        have_solid_fill: Capability::Supported,
        have_odd_winding_fill: Capability::Supported,
        have_nonzero_winding_fill: Capability::Supported,
        have_settable_bg: Capability::Supported,
        have_ps_fonts: Capability::Supported,
        have_pcl_fonts: Capability::Supported,
        have_stick_fonts: Capability::Supported,
        have_extra_stick_fonts: Capability::Unsupported,
        have_horizontal_justification: false,
        have_vertical_justification: false,
        have_mixed_paths: false,
        arc_scaling: ScalingPolicy::None,
        ellarc_scaling: ScalingPolicy::None,
        quad_scaling: ScalingPolicy::None,
        cubic_scaling: ScalingPolicy::None,
        box_scaling: ScalingPolicy::None,
        circle_scaling: ScalingPolicy::None,
        ellipse_scaling: ScalingPolicy::None,
    };

    /// Look up a user-visible capability by (case-insensitive) name.
    pub fn query(&self, name: &str) -> Capability {
        let name = name.to_ascii_uppercase();
        match name.as_str() {
            "WIDE_LINES" => self.have_wide_lines,
            "SOLID_FILL" => self.have_solid_fill,
            "DASH_ARRAY" => self.have_dash_array,
            "EVEN_ODD_FILL" => self.have_odd_winding_fill,
            "NONZERO_WINDING_NUMBER_FILL" => self.have_nonzero_winding_fill,
            "SETTABLE_BACKGROUND" => self.have_settable_bg,
            "HERSHEY_FONTS" => Capability::Supported,
            "PS_FONTS" => self.have_ps_fonts,
            "PCL_FONTS" => self.have_pcl_fonts,
            "STICK_FONTS" => self.have_stick_fonts,
            "EXTRA_STICK_FONTS" => self.have_extra_stick_fonts,
            _ => Capability::Unsupported,
        }
    }
}

/// Metrics of a font a backend agreed to render, in user units
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    pub name: String,
    pub size: f64,
    pub ascent: f64,
    pub descent: f64,
    pub cap_height: f64,
}

/// Horizontal text justification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

impl HAlign {
    /// Fraction of the text width that lies left of the anchor.
    pub fn offset_fraction(self) -> f64 {
        match self {
            HAlign::Left => 0.0,
            HAlign::Center => 0.5,
            HAlign::Right => 1.0,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            HAlign::Left => 'l',
            HAlign::Center => 'c',
            HAlign::Right => 'r',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'l' => Some(HAlign::Left),
            'c' => Some(HAlign::Center),
            'r' => Some(HAlign::Right),
            _ => None,
        }
    }
}

/// Vertical text justification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Bottom,
    Baseline,
    Center,
    CapLine,
    Top,
}

impl VAlign {
    pub fn as_char(self) -> char {
        match self {
            VAlign::Bottom => 'b',
            VAlign::Baseline => 'x',
            VAlign::Center => 'c',
            VAlign::CapLine => 'C',
            VAlign::Top => 't',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'b' => Some(VAlign::Bottom),
            'x' => Some(VAlign::Baseline),
            'c' => Some(VAlign::Center),
            'C' => Some(VAlign::CapLine),
            't' => Some(VAlign::Top),
            _ => None,
        }
    }
}

/// What a backend sees of the device while a page is open
pub struct Surface<'a> {
    pub state: &'a DrawingState,
    /// Buffer for the current page, absent for custom output models
    pub page: Option<&'a mut PageBuffer>,
    pub sink: Option<&'a SharedSink>,
    pub page_number: u32,
    pub frame_number: u32,
}

impl Surface<'_> {
    /// Append to the page buffer, if there is one.
    pub fn write_page(&mut self, s: &str) {
        if let Some(page) = self.page.as_deref_mut() {
            page.write_str(s);
        }
    }

    /// Write straight to the output sink. Without a sink this does nothing.
    pub fn write_sink(&self, bytes: &[u8]) -> io::Result<()> {
        match self.sink {
            Some(sink) => registry::write_to(sink, bytes),
            None => Ok(()),
        }
    }

    pub fn flush_sink(&self) -> io::Result<()> {
        match self.sink {
            Some(sink) => registry::flush(sink),
            None => Ok(()),
        }
    }

    /// Grow the page bounding box by the device-space outline of `path`.
    pub fn expand_bbox(&mut self, path: &Path) {
        if let Some(page) = self.page.as_deref_mut() {
            for p in path.polyline() {
                page.expand_bbox(self.state.transform.to_device(p));
            }
        }
    }
}

/// Map the unit square onto a `width` x `height` raster whose y axis grows
/// downward, after turning it `rotation` degrees counterclockwise about its
/// center. With `pixel_centers`, integer device coordinates fall on pixel
/// centers.
pub(crate) fn raster_ndc_map(width: f64, height: f64, rotation: u32, pixel_centers: bool) -> DAffine2 {
    let shift = if pixel_centers { -0.5 } else { 0.0 };
    let flip = DAffine2::from_cols_array(&[width, 0.0, 0.0, -height, shift, height + shift]);
    let center = DVec2::splat(0.5);
    let turn = DAffine2::from_translation(center)
        * DAffine2::from_angle(f64::from(rotation).to_radians())
        * DAffine2::from_translation(-center);
    flip * turn
}

/// Metrics for a font drawn with stroke-font proportions.
pub(crate) fn stroke_font_metrics(name: &str, size: f64) -> FontMetrics {
    let scale = size / defaults::HERSHEY_EM;
    FontMetrics {
        name: name.to_string(),
        size,
        ascent: defaults::HERSHEY_ASCENT * scale,
        descent: defaults::HERSHEY_DESCENT * scale,
        cap_height: defaults::HERSHEY_CAPHEIGHT * scale,
    }
}

/// Width of a label in a font without a width table.
pub(crate) fn nominal_text_width(text: &str, size: f64) -> f64 {
    strip_escapes(text).chars().count() as f64 * defaults::NOMINAL_ADVANCE * size
}

/// Format a number with at most `decimals` decimal places, trailing zeros
/// trimmed and negative zero printed as `0`.
pub(crate) fn fmt_num(value: f64, decimals: usize) -> String {
    let s = format!("{value:.decimals$}");
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s.as_str()
    };
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Drop two-character `\xx` escapes from a label, keeping `\\` as
/// a literal backslash.
pub fn strip_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            Some(_) => {
                chars.next();
                chars.next();
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Hooks an output format provides to the device pipeline
#[enum_dispatch]
pub trait Backend {
    fn capabilities(&self) -> Capabilities {
        Capabilities::GENERIC
    }

    /// Map from normalized device coordinates (the unit square) to device
    /// coordinates. Only consulted after `initialize`.
    fn ndc_to_device(&self) -> DAffine2 {
        DAffine2::IDENTITY
    }

    /// Called once, when the device is constructed.
    fn initialize(&mut self, _params: &ResolvedParams) -> Result<()> {
        Ok(())
    }

    /// Called once, when the device is dropped.
    fn terminate(&mut self) -> Result<()> {
        Ok(())
    }

    fn begin_page(&mut self, _surface: &mut Surface<'_>) -> Result<()> {
        Ok(())
    }

    /// Reset any device state the backend tracks to its just-opened values.
    fn erase_page(&mut self, _surface: &mut Surface<'_>) -> Result<()> {
        Ok(())
    }

    /// Finish the page; buffered backends fill in header and trailer here.
    fn end_page(&mut self, _surface: &mut Surface<'_>) -> Result<()> {
        Ok(())
    }

    fn push_state(&mut self, _surface: &mut Surface<'_>) {}

    fn pop_state(&mut self, _surface: &mut Surface<'_>) {}

    /// Paint one simple path with the current attributes.
    fn paint_path(&mut self, _surface: &mut Surface<'_>, _path: &Path) -> Result<()> {
        Ok(())
    }

    /// Paint a compound path in one go. Returning false asks the device to
    /// fill and edge the simple paths one by one instead.
    fn paint_paths(&mut self, _surface: &mut Surface<'_>, _paths: &[Path]) -> Result<bool> {
        Ok(false)
    }

    /// False if segments already sent can't be retracted, so the path must
    /// not be merged with later ones.
    fn path_is_flushable(&self) -> bool {
        true
    }

    /// Paint the segments of `surface.state.path` from index `prev` on, for
    /// backends that draw as the path grows.
    fn maybe_prepaint_segments(&mut self, _surface: &mut Surface<'_>, _prev: usize) -> Result<()> {
        Ok(())
    }

    /// Draw marker `kind` of the given size in user units at the current
    /// position. Returning false makes the device build the marker from
    /// paths.
    fn paint_marker(&mut self, _surface: &mut Surface<'_>, _kind: i32, _size: f64) -> Result<bool> {
        Ok(false)
    }

    fn paint_point(&mut self, _surface: &mut Surface<'_>) -> Result<()> {
        Ok(())
    }

    /// Paint a label that may contain escapes; returns its width in user
    /// units.
    fn paint_text_with_escapes(
        &mut self,
        surface: &mut Surface<'_>,
        text: &str,
        h: HAlign,
        v: VAlign,
    ) -> Result<f64> {
        self.paint_text(surface, &strip_escapes(text), h, v)
    }

    /// Paint a plain label at the current position; returns its width in
    /// user units.
    fn paint_text(
        &mut self,
        _surface: &mut Surface<'_>,
        _text: &str,
        _h: HAlign,
        _v: VAlign,
    ) -> Result<f64> {
        Ok(0.0)
    }

    fn get_text_width(&mut self, _surface: &mut Surface<'_>, _text: &str) -> f64 {
        0.0
    }

    /// Offer a font the device doesn't know. `None` means the backend
    /// can't render it and the default font is used instead.
    fn retrieve_font(
        &mut self,
        _surface: &mut Surface<'_>,
        _name: &str,
        _size: f64,
    ) -> Option<FontMetrics> {
        None
    }

    /// Flush for custom output models, which do their own output.
    fn flush_output(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        surface.flush_sink().map_err(PlotError::from)
    }

    fn warning(&mut self, message: &str) {
        crate::log::warn!("{message}");
    }

    fn error(&mut self, message: &str) {
        crate::log::warn!("error: {message}");
    }
}

/// Any of the built-in backends
#[enum_dispatch(Backend)]
#[derive(Debug)]
pub enum AnyBackend {
    Null(NullBackend),
    Meta(MetaBackend),
    Svg(SvgBackend),
    Tek(TekBackend),
    Pnm(PnmBackend),
}

impl AnyBackend {
    pub const NAMES: [&'static str; 5] = ["generic", "meta", "svg", "tek", "pnm"];

    /// Select a built-in backend by type name.
    pub fn from_name(name: &str) -> Result<Self> {
        let backend = match name.to_ascii_lowercase().as_str() {
            "generic" | "null" => NullBackend::new().into(),
            "meta" => MetaBackend::new().into(),
            "svg" => SvgBackend::new().into(),
            "tek" => TekBackend::new().into(),
            "pnm" => PnmBackend::new().into(),
            _ => {
                return Err(PlotError::UnknownBackend {
                    name: name.to_string(),
                    suggestion: closest_name(name)
                        .map(|n| format!("did you mean `{n}`?"))
                        .or_else(|| Some(format!("known backends: {}", Self::NAMES.join(", ")))),
                });
            }
        };
        Ok(backend)
    }
}

fn closest_name(name: &str) -> Option<&'static str> {
    let name = name.to_ascii_lowercase();
    AnyBackend::NAMES
        .into_iter()
        .find(|known| known.starts_with(&name) || name.starts_with(known))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DAffine2;

    #[test]
    fn capability_names_are_case_insensitive() {
        let caps = Capabilities::GENERIC;
        assert_eq!(caps.query("wide_lines"), Capability::Supported);
        assert_eq!(caps.query("Hershey_Fonts"), Capability::Supported);
        assert_eq!(caps.query("EXTRA_STICK_FONTS"), Capability::Unsupported);
        assert_eq!(caps.query("TELEPATHY"), Capability::Unsupported);
    }

    #[test]
    fn scaling_policies_follow_the_transform() {
        let rotated = Transform::new(DAffine2::from_angle(0.3), DAffine2::IDENTITY, false);
        let stretched = Transform::new(
            DAffine2::from_scale(glam::dvec2(2.0, 1.0)),
            DAffine2::IDENTITY,
            false,
        );
        assert!(ScalingPolicy::Any.allows(&rotated));
        assert!(!ScalingPolicy::None.allows(&rotated));
        assert!(ScalingPolicy::Uniform.allows(&rotated));
        assert!(!ScalingPolicy::AxesPreserved.allows(&rotated));
        assert!(ScalingPolicy::AxesPreserved.allows(&stretched));
        assert!(!ScalingPolicy::Uniform.allows(&stretched));
    }

    #[test]
    fn numbers_are_trimmed() {
        assert_eq!(fmt_num(1.5, 4), "1.5");
        assert_eq!(fmt_num(2.0, 4), "2");
        assert_eq!(fmt_num(-0.00001, 4), "0");
        assert_eq!(fmt_num(1.0 / 3.0, 2), "0.33");
        assert_eq!(fmt_num(-12.3456, 2), "-12.35");
    }

    #[test]
    fn raster_map_flips_and_turns() {
        let map = raster_ndc_map(100.0, 50.0, 0, false);
        assert_eq!(map.transform_point2(glam::dvec2(0.0, 0.0)), glam::dvec2(0.0, 50.0));
        assert_eq!(map.transform_point2(glam::dvec2(1.0, 1.0)), glam::dvec2(100.0, 0.0));

        let centers = raster_ndc_map(10.0, 10.0, 0, true);
        assert_eq!(centers.transform_point2(glam::dvec2(0.0, 0.0)), glam::dvec2(-0.5, 9.5));

        // a quarter turn takes the lower left corner to the lower right
        let turned = raster_ndc_map(10.0, 10.0, 90, false);
        let p = turned.transform_point2(glam::dvec2(0.0, 0.0));
        assert!((p - glam::dvec2(10.0, 10.0)).length() < 1e-9);
    }

    #[test]
    fn escapes_are_stripped() {
        assert_eq!(strip_escapes(r"x\sp2\ep"), "x2");
        assert_eq!(strip_escapes(r"a\\b"), r"a\b");
        assert_eq!(strip_escapes("plain"), "plain");
        assert_eq!(strip_escapes("end\\"), "end\\");
    }

    #[test]
    fn backends_by_name() {
        for name in AnyBackend::NAMES {
            let backend = AnyBackend::from_name(name).unwrap();
            assert_eq!(backend.capabilities().type_name, name);
        }
        let err = AnyBackend::from_name("sv").unwrap_err();
        assert!(matches!(
            err,
            PlotError::UnknownBackend { suggestion: Some(ref s), .. } if s.contains("svg")
        ));
    }
}
