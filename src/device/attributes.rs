//! Attribute setters: line style, fill, color, fonts and the user frame.
//!
//! Setters that change how a path is painted flush the pending path first,
//! so one path is always painted with one set of attributes. Out-of-range
//! values fall back to defaults rather than failing.

use glam::{DAffine2, DVec2};

use super::Device;
use crate::backend::{Backend, Capability, DeviceCoords, stroke_font_metrics};
use crate::errors::{PlotError, Result};
use crate::render::{CapType, FillRule, JoinType, LineType, defaults};
use crate::types::{Color, singular_values};

fn is_stroke_font(name: &str) -> bool {
    name.get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("hershey"))
}

/// Fill color for a fill level: 1 is the base color, 0xffff is white.
fn desaturated(base: Color, fill_type: i32) -> Color {
    if fill_type == 0 {
        return base;
    }
    base.desaturate(f64::from(fill_type - 1) / f64::from(0xfffe))
}

impl<B: Backend> Device<B> {
    // ------------------------------------------------------------------
    // Lines
    // ------------------------------------------------------------------

    /// Select a named line type, or `"disconnected"`. Unknown names give a
    /// solid line. Cancels any dash array.
    pub fn line_mod(&mut self, name: &str) -> Result<()> {
        self.run("line_mod", |d| {
            d.flush_path()?;
            let state = d.top_mut();
            if name == "disconnected" {
                state.points_are_connected = false;
                state.line_type = LineType::Solid;
            } else {
                state.points_are_connected = true;
                state.line_type = LineType::from_name(name).unwrap_or_default();
            }
            state.dash_array_in_effect = false;
            Ok(())
        })
    }

    /// Dash with alternating on/off lengths in user units, starting
    /// `offset` into the pattern. An empty array draws solid lines.
    pub fn line_dash(&mut self, dashes: &[f64], offset: f64) -> Result<()> {
        self.run("line_dash", |d| {
            if dashes.iter().any(|len| *len < 0.0) {
                return Err(PlotError::invalid_argument(
                    "line_dash",
                    "dash lengths must not be negative",
                ));
            }
            d.flush_path()?;
            let state = d.top_mut();
            state.dash_array = dashes.to_vec();
            state.dash_offset = offset;
            state.dash_array_in_effect = true;
            Ok(())
        })
    }

    pub fn cap_mod(&mut self, name: &str) -> Result<()> {
        self.run("cap_mod", |d| {
            d.flush_path()?;
            d.top_mut().cap_type = CapType::from_name(name).unwrap_or_default();
            Ok(())
        })
    }

    pub fn join_mod(&mut self, name: &str) -> Result<()> {
        self.run("join_mod", |d| {
            d.flush_path()?;
            d.top_mut().join_type = JoinType::from_name(name).unwrap_or_default();
            Ok(())
        })
    }

    /// Limits below 1 restore the default.
    pub fn miter_limit(&mut self, limit: f64) -> Result<()> {
        self.run("miter_limit", |d| {
            d.flush_path()?;
            d.top_mut().miter_limit = if limit < 1.0 { defaults::MITER_LIMIT } else { limit };
            Ok(())
        })
    }

    /// Line width in user units. A negative width selects the default,
    /// which follows later changes of the user frame.
    pub fn line_width(&mut self, width: f64) -> Result<()> {
        self.run("line_width", |d| d.apply_line_width(width))
    }

    pub(super) fn apply_line_width(&mut self, width: f64) -> Result<()> {
        self.flush_path()?;
        let state = self.top_mut();
        let width = if width < 0.0 {
            state.line_width_is_default = true;
            state.default_line_width
        } else {
            state.line_width_is_default = false;
            width
        };
        let device_width = state.transform.min_device_scale() * width;
        let mut quantized = device_width.round().clamp(0.0, f64::from(i32::MAX)) as i32;
        if quantized == 0 && device_width > 0.0 {
            quantized = 1;
        }
        state.line_width = width;
        state.device_line_width = device_width;
        state.quantized_device_line_width = quantized;
        self.linewidth_invoked = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Filling
    // ------------------------------------------------------------------

    /// The fill rule, by name. Unknown or unsupported rules give the
    /// device's default rule.
    pub fn fill_mod(&mut self, name: &str) -> Result<()> {
        self.run("fill_mod", |d| {
            d.flush_path()?;
            let default = if d.caps.have_odd_winding_fill == Capability::Unsupported {
                FillRule::NonzeroWinding
            } else {
                FillRule::EvenOdd
            };
            let rule = match FillRule::from_name(name) {
                Some(FillRule::EvenOdd) if d.caps.have_odd_winding_fill != Capability::Unsupported => {
                    FillRule::EvenOdd
                }
                Some(FillRule::NonzeroWinding)
                    if d.caps.have_nonzero_winding_fill != Capability::Unsupported =>
                {
                    FillRule::NonzeroWinding
                }
                _ => default,
            };
            d.top_mut().fill_rule = rule;
            Ok(())
        })
    }

    /// 0 leaves paths unfilled; 1 through 0xffff fill with the fill color
    /// desaturated toward white.
    pub fn fill_type(&mut self, level: i32) -> Result<()> {
        self.run("fill_type", |d| {
            d.flush_path()?;
            let level = if (0..=0xffff).contains(&level) { level } else { 0 };
            let state = d.top_mut();
            state.fill_type = level;
            state.fill_color = desaturated(state.fill_color_base, level);
            Ok(())
        })
    }

    /// 0 paints no edges.
    pub fn pen_type(&mut self, level: i32) -> Result<()> {
        self.run("pen_type", |d| {
            d.flush_path()?;
            d.top_mut().pen_type = if (0..=0xffff).contains(&level) { level } else { 1 };
            Ok(())
        })
    }

    /// Direction of closed shapes: 1 counterclockwise, -1 clockwise.
    pub fn orientation(&mut self, direction: i32) -> Result<()> {
        self.run("orientation", |d| {
            d.top_mut().orientation = if direction == -1 { -1 } else { 1 };
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Colors
    // ------------------------------------------------------------------

    pub fn pen_color(&mut self, color: Color) -> Result<()> {
        self.run("pen_color", |d| d.set_pen_color(color))
    }

    pub fn fill_color(&mut self, color: Color) -> Result<()> {
        self.run("fill_color", |d| d.set_fill_color(color))
    }

    /// Pen and fill color together.
    pub fn color(&mut self, color: Color) -> Result<()> {
        self.run("color", |d| {
            d.set_pen_color(color)?;
            d.set_fill_color(color)
        })
    }

    /// Background used by the next `erase`.
    pub fn bg_color(&mut self, color: Color) -> Result<()> {
        self.run("bg_color", |d| {
            d.set_bg_color(color);
            Ok(())
        })
    }

    pub fn pen_color_name(&mut self, name: &str) -> Result<()> {
        self.run("pen_color_name", |d| {
            let color = d.named_color(name, "black", Color::BLACK);
            d.set_pen_color(color)
        })
    }

    pub fn fill_color_name(&mut self, name: &str) -> Result<()> {
        self.run("fill_color_name", |d| {
            let color = d.named_color(name, "black", Color::BLACK);
            d.set_fill_color(color)
        })
    }

    pub fn color_name(&mut self, name: &str) -> Result<()> {
        self.run("color_name", |d| {
            let color = d.named_color(name, "black", Color::BLACK);
            d.set_pen_color(color)?;
            d.set_fill_color(color)
        })
    }

    pub fn bg_color_name(&mut self, name: &str) -> Result<()> {
        self.run("bg_color_name", |d| {
            let color = d.named_color(name, "white", Color::WHITE);
            d.set_bg_color(color);
            Ok(())
        })
    }

    pub(super) fn set_pen_color(&mut self, color: Color) -> Result<()> {
        self.flush_path()?;
        let color = self.device_color(color);
        self.top_mut().fg_color = color;
        Ok(())
    }

    pub(super) fn set_fill_color(&mut self, color: Color) -> Result<()> {
        self.flush_path()?;
        let base = self.device_color(color);
        let state = self.top_mut();
        state.fill_color_base = base;
        state.fill_color = desaturated(base, state.fill_type);
        Ok(())
    }

    fn set_bg_color(&mut self, color: Color) {
        let color = self.device_color(color);
        self.top_mut().bg_color = color;
    }

    /// Look up a color name, substituting `fallback` with a warning.
    fn named_color(&mut self, name: &str, fallback_name: &str, fallback: Color) -> Color {
        name.parse::<Color>().unwrap_or_else(|_| {
            self.backend.warning(&format!(
                "substituting \"{fallback_name}\" for undefined color \"{name}\""
            ));
            fallback
        })
    }

    // ------------------------------------------------------------------
    // Fonts
    // ------------------------------------------------------------------

    /// Select a font by name; an empty name selects the device default.
    /// Returns the size of the font actually used.
    pub fn font_name(&mut self, name: &str) -> Result<f64> {
        self.run("font_name", |d| {
            let name = if name.is_empty() { d.caps.default_font } else { name };
            d.top_mut().font_name = name.to_string();
            d.set_font();
            Ok(d.top().true_font_size)
        })
    }

    /// Font size in user units; negative selects the default.
    pub fn font_size(&mut self, size: f64) -> Result<f64> {
        self.run("font_size", |d| {
            let state = d.top_mut();
            if size < 0.0 {
                state.font_size = state.default_font_size;
                state.font_size_is_default = true;
            } else {
                state.font_size = size;
                state.font_size_is_default = false;
            }
            d.fontsize_invoked = true;
            d.set_font();
            Ok(d.top().true_font_size)
        })
    }

    /// Label angle in degrees counterclockwise.
    pub fn text_angle(&mut self, degrees: f64) -> Result<f64> {
        self.run("text_angle", |d| {
            d.top_mut().text_angle = degrees;
            d.set_font();
            Ok(d.top().true_font_size)
        })
    }

    /// Resolve the requested font to one the device can draw, and record
    /// its metrics. Stroke fonts are always available.
    pub(super) fn set_font(&mut self) {
        let (name, size) = (self.top().font_name.clone(), self.top().font_size);
        let metrics = if is_stroke_font(&name) {
            Some(stroke_font_metrics(&name, size))
        } else {
            let (backend, mut surface) = self.parts();
            backend.retrieve_font(&mut surface, &name, size)
        };
        let metrics = metrics.unwrap_or_else(|| {
            crate::log::debug!(font = %name, "font not available, using the default");
            stroke_font_metrics(self.caps.default_font, size)
        });
        let state = self.top_mut();
        state.true_font_name = metrics.name;
        state.true_font_size = metrics.size;
        state.font_ascent = metrics.ascent;
        state.font_descent = metrics.descent;
        state.font_cap_height = metrics.cap_height;
    }

    // ------------------------------------------------------------------
    // User frame
    // ------------------------------------------------------------------

    /// Replace the map from user coordinates to the normalized device
    /// square.
    pub fn set_matrix(&mut self, user_to_ndc: DAffine2) -> Result<()> {
        self.run("set_matrix", |d| d.apply_matrix(user_to_ndc))
    }

    /// Compose `m` before the current user frame map.
    pub fn concat(&mut self, m: DAffine2) -> Result<()> {
        self.run("concat", |d| {
            let current = d.top().transform.user_to_ndc;
            d.apply_matrix(current * m)
        })
    }

    pub fn translate(&mut self, tx: f64, ty: f64) -> Result<()> {
        self.concat(DAffine2::from_translation(DVec2::new(tx, ty)))
    }

    /// Rotate the user frame by `degrees` counterclockwise.
    pub fn rotate(&mut self, degrees: f64) -> Result<()> {
        self.concat(DAffine2::from_angle(degrees.to_radians()))
    }

    pub fn scale(&mut self, sx: f64, sy: f64) -> Result<()> {
        self.concat(DAffine2::from_scale(DVec2::new(sx, sy)))
    }

    /// Map the user rectangle (x0, y0)-(x1, y1) onto the unit square.
    pub fn space(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> Result<()> {
        self.space2(x0, y0, x1, y0, x0, y1)
    }

    /// Map the user parallelogram with corner (x0, y0) and adjacent corners
    /// (x1, y1) and (x2, y2) onto the unit square.
    pub fn space2(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<()> {
        self.run("space2", |d| {
            let v1 = DVec2::new(x1 - x0, y1 - y0);
            let v2 = DVec2::new(x2 - x0, y2 - y0);
            let cross = v1.perp_dot(v2);
            if cross == 0.0 {
                return Err(PlotError::SingularTransform);
            }
            let m = DAffine2::from_cols_array(&[
                v2.y / cross,
                -v1.y / cross,
                -v2.x / cross,
                v1.x / cross,
                -(x0 * v2.y - y0 * v2.x) / cross,
                (x0 * v1.y - y0 * v1.x) / cross,
            ]);
            d.apply_matrix(m)
        })
    }

    /// Install a new user frame map and rescale the defaults that depend
    /// on it. Sizes the user chose explicitly on this page are kept.
    pub(super) fn apply_matrix(&mut self, user_to_ndc: DAffine2) -> Result<()> {
        let transform = self.transform_for(user_to_ndc);
        let (norm, _) = singular_values(user_to_ndc.matrix2);
        let default_line_width = if self.caps.device_coords == DeviceCoords::IntegerRaster || norm == 0.0 {
            0.0
        } else {
            defaults::LINE_WIDTH_FRACTION / norm
        };
        let default_font_size = if norm == 0.0 {
            0.0
        } else {
            defaults::FONT_SIZE_FRACTION / norm
        };
        let state = self.top_mut();
        state.transform = transform;
        state.default_line_width = default_line_width;
        state.default_font_size = default_font_size;

        if self.linewidth_invoked {
            let width = self.top().line_width;
            self.apply_line_width(width)?;
        } else {
            self.apply_line_width(-1.0)?;
            self.linewidth_invoked = false;
        }
        if !self.fontsize_invoked {
            let state = self.top_mut();
            state.font_size = default_font_size;
            state.font_size_is_default = true;
        }
        self.set_font();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Capabilities, NullBackend};
    use crate::params::DeviceParams;
    use crate::registry::DeviceRegistry;
    use glam::dvec2;

    fn open_device() -> Device<NullBackend> {
        let params = DeviceParams::new().resolve_with(|_| None);
        let mut d = Device::with_registry(NullBackend::new(), params, DeviceRegistry::new()).unwrap();
        d.open().unwrap();
        d
    }

    fn close_to(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn default_line_width_follows_the_frame() {
        let mut d = open_device();
        assert!(close_to(d.state().unwrap().line_width, 1.0 / 850.0));
        d.space(0.0, 0.0, 100.0, 100.0).unwrap();
        let state = d.state().unwrap();
        assert!(close_to(state.line_width, 100.0 / 850.0));
        assert!(state.line_width_is_default);
        assert!(close_to(state.font_size, 2.0));
        assert!(close_to(state.true_font_size, 2.0));
    }

    #[test]
    fn chosen_line_width_survives_a_new_frame() {
        let mut d = open_device();
        d.line_width(2.0).unwrap();
        d.space(0.0, 0.0, 10.0, 10.0).unwrap();
        let state = d.state().unwrap();
        assert_eq!(state.line_width, 2.0);
        assert!(close_to(state.device_line_width, 0.2));
        assert_eq!(state.quantized_device_line_width, 1);
        d.line_width(-1.0).unwrap();
        assert!(close_to(d.state().unwrap().line_width, 10.0 / 850.0));
    }

    #[test]
    fn space2_maps_the_parallelogram() {
        let mut d = open_device();
        d.space2(1.0, 1.0, 3.0, 1.0, 1.0, 5.0).unwrap();
        let m = d.state().unwrap().transform.user_to_ndc;
        assert_eq!(m.transform_point2(dvec2(1.0, 1.0)), dvec2(0.0, 0.0));
        assert_eq!(m.transform_point2(dvec2(3.0, 1.0)), dvec2(1.0, 0.0));
        assert_eq!(m.transform_point2(dvec2(1.0, 5.0)), dvec2(0.0, 1.0));
    }

    #[test]
    fn collinear_space_is_singular() {
        let mut d = open_device();
        let before = d.state().unwrap().transform;
        assert!(matches!(
            d.space2(0.0, 0.0, 1.0, 1.0, 2.0, 2.0),
            Err(PlotError::SingularTransform)
        ));
        assert_eq!(d.state().unwrap().transform, before);
    }

    #[test]
    fn concat_applies_before_the_frame() {
        let mut d = open_device();
        d.space(0.0, 0.0, 10.0, 10.0).unwrap();
        d.translate(5.0, 0.0).unwrap();
        let m = d.state().unwrap().transform.user_to_ndc;
        assert!((m.transform_point2(dvec2(0.0, 0.0)) - dvec2(0.5, 0.0)).length() < 1e-12);
        d.rotate(90.0).unwrap();
        let m = d.state().unwrap().transform.user_to_ndc;
        assert!((m.transform_point2(dvec2(1.0, 0.0)) - dvec2(0.5, 0.1)).length() < 1e-12);
    }

    #[test]
    fn invalid_dash_keeps_the_old_pattern() {
        let mut d = open_device();
        d.line_dash(&[2.0, 1.0], 0.5).unwrap();
        assert!(matches!(
            d.line_dash(&[2.0, -1.0], 0.0),
            Err(PlotError::InvalidArgument { op: "line_dash", .. })
        ));
        let state = d.state().unwrap();
        assert_eq!(state.dash_array, vec![2.0, 1.0]);
        assert_eq!(state.dash_offset, 0.5);
        assert!(state.dash_array_in_effect);

        d.line_mod("longdashed").unwrap();
        assert!(!d.state().unwrap().dash_array_in_effect);
    }

    #[test]
    fn unknown_names_fall_back() {
        let mut d = open_device();
        d.line_mod("wavy").unwrap();
        d.cap_mod("pointy").unwrap();
        d.join_mod("mitre").unwrap();
        d.fill_mod("sideways").unwrap();
        let state = d.state().unwrap();
        assert_eq!(state.line_type, LineType::Solid);
        assert_eq!(state.cap_type, CapType::Butt);
        assert_eq!(state.join_type, JoinType::Miter);
        assert_eq!(state.fill_rule, FillRule::EvenOdd);
    }

    #[test]
    fn unsupported_fill_rule_gives_the_default() {
        #[derive(Debug, Default)]
        struct WindingOnly;
        impl Backend for WindingOnly {
            fn capabilities(&self) -> Capabilities {
                Capabilities {
                    have_odd_winding_fill: Capability::Unsupported,
                    ..Capabilities::GENERIC
                }
            }
        }
        let params = DeviceParams::new().resolve_with(|_| None);
        let mut d = Device::with_registry(WindingOnly, params, DeviceRegistry::new()).unwrap();
        d.open().unwrap();
        assert_eq!(d.state().unwrap().fill_rule, FillRule::NonzeroWinding);
        d.fill_mod("even-odd").unwrap();
        assert_eq!(d.state().unwrap().fill_rule, FillRule::NonzeroWinding);
    }

    #[test]
    fn fill_levels_desaturate() {
        let mut d = open_device();
        d.fill_color(Color::new(0, 0, 0xffff)).unwrap();
        d.fill_type(1).unwrap();
        assert_eq!(d.state().unwrap().fill_color, Color::new(0, 0, 0xffff));
        d.fill_type(0xffff).unwrap();
        assert_eq!(d.state().unwrap().fill_color, Color::WHITE);
        d.fill_type(0x10000).unwrap();
        assert_eq!(d.state().unwrap().fill_type, 0);
        d.pen_type(-4).unwrap();
        assert_eq!(d.state().unwrap().pen_type, 1);
    }

    #[test]
    fn unknown_color_names_substitute() {
        let mut d = open_device();
        d.pen_color_name("red").unwrap();
        assert_eq!(d.state().unwrap().fg_color, Color::new(0xffff, 0, 0));
        d.pen_color_name("no such color").unwrap();
        assert_eq!(d.state().unwrap().fg_color, Color::BLACK);
        d.bg_color_name("nope").unwrap();
        assert_eq!(d.state().unwrap().bg_color, Color::WHITE);
    }

    #[test]
    fn fonts_resolve_to_stroke_fonts() {
        let mut d = open_device();
        let size = d.font_size(12.0).unwrap();
        assert_eq!(size, 12.0);
        assert_eq!(d.font_name("Times-Roman").unwrap(), 12.0);
        assert_eq!(d.state().unwrap().true_font_name, defaults::FONT_NAME);
        d.font_name("HersheySans").unwrap();
        let state = d.state().unwrap();
        assert_eq!(state.true_font_name, "HersheySans");
        assert!(close_to(state.font_ascent, 12.0 * 26.0 / 33.0));
        assert_eq!(d.font_name("").unwrap(), 12.0);
        assert_eq!(d.state().unwrap().font_name, defaults::FONT_NAME);
    }

    #[test]
    fn orientation_takes_a_sign() {
        let mut d = open_device();
        d.orientation(-1).unwrap();
        assert_eq!(d.state().unwrap().orientation, -1);
        d.orientation(7).unwrap();
        assert_eq!(d.state().unwrap().orientation, 1);
    }
}
