//! Labels and markers.

use glam::{DVec2, dvec2};

use super::Device;
use crate::backend::{Backend, DeviceCoords, HAlign, VAlign, nominal_text_width};
use crate::errors::Result;
use crate::render::{CapType, JoinType, LineType, defaults};
use crate::types::Point;

/// Fill level of half-filled markers
const NOMINAL_HALF: i32 = 0xa000;

/// One pen movement of a marker outline, in units of half the marker size
#[derive(Debug, Clone, Copy)]
enum Stroke {
    Move(f64, f64),
    Cont(f64, f64),
    /// Paint what has been drawn so far
    End,
}

use Stroke::{Cont as C, End, Move as M};

const H: f64 = 0.866_025_403_784_438_6;

const PLUS: &[Stroke] = &[M(-1.0, 0.0), C(2.0, 0.0), M(-1.0, -1.0), C(0.0, 2.0), M(0.0, -1.0)];

const ASTERISK: &[Stroke] = &[
    M(0.0, -1.0),
    C(0.0, 2.0),
    M(0.0, -1.0),
    C(H, 0.5),
    M(-H, -0.5),
    C(-H, -0.5),
    M(H, 0.5),
    C(H, -0.5),
    M(-H, 0.5),
    C(-H, 0.5),
    M(H, -0.5),
];

const CROSS: &[Stroke] = &[M(-1.0, -1.0), C(2.0, 2.0), M(0.0, -2.0), C(-2.0, 2.0), M(1.0, -1.0)];

const STAR_ARMS: &[Stroke] = &[
    C(1.0, 1.0),
    M(-1.0, -1.0),
    C(1.0, -1.0),
    M(-1.0, 1.0),
    C(-1.0, 1.0),
    M(1.0, -1.0),
    C(-1.0, -1.0),
    M(1.0, 1.0),
];

const DIAMOND: &[Stroke] = &[
    M(1.0, 0.0),
    C(-1.0, 1.0),
    C(-1.0, -1.0),
    C(1.0, -1.0),
    C(1.0, 1.0),
    M(-1.0, 0.0),
];

const FILLED_DIAMOND: &[Stroke] = &[
    M(0.0, -1.0),
    C(1.0, 1.0),
    C(-1.0, 1.0),
    C(-1.0, -1.0),
    C(1.0, -1.0),
    M(0.0, 1.0),
];

const TRIANGLE: &[Stroke] = &[M(0.0, 1.0), C(H, -1.5), C(-2.0 * H, 0.0), C(H, 1.5), M(0.0, -1.0)];

const INVERTED_TRIANGLE: &[Stroke] = &[M(0.0, -1.0), C(H, 1.5), C(-2.0 * H, 0.0), C(H, -1.5), M(0.0, 1.0)];

const STARBURST: &[Stroke] = &[
    M(-0.5, 0.0),
    C(-0.5, 0.0),
    M(0.0, -1.0),
    C(0.5, 0.5),
    M(0.5, 0.0),
    C(0.0, -0.5),
    M(1.0, 0.0),
    C(-0.5, 0.5),
    M(0.0, 0.5),
    C(0.5, 0.0),
    M(0.0, 1.0),
    C(-0.5, -0.5),
    M(-0.5, 0.0),
    C(0.0, 0.5),
    M(-1.0, 0.0),
    C(0.5, -0.5),
    M(0.5, -0.5),
];

const FANCY_PLUS: &[Stroke] = &[
    M(-1.0, 0.0),
    C(2.0, 0.0),
    M(-1.0, -1.0),
    C(0.0, 2.0),
    M(0.5, 0.0),
    C(-1.0, 0.0),
    M(-0.5, -0.5),
    C(0.0, -1.0),
    M(0.5, -0.5),
    C(1.0, 0.0),
    M(0.5, 0.5),
    C(0.0, 1.0),
    M(-1.0, 0.0),
];

const FANCY_CROSS: &[Stroke] = &[
    M(-1.0, -1.0),
    C(2.0, 2.0),
    M(0.0, -2.0),
    C(-2.0, 2.0),
    M(2.0, -0.5),
    C(-0.5, 0.5),
    M(-1.0, 0.0),
    C(-0.5, -0.5),
    M(0.0, -1.0),
    C(0.5, -0.5),
    M(1.0, 0.0),
    C(0.5, 0.5),
    M(-1.0, 0.5),
];

/// Corner ticks drawn after the inner box of a fancy square
const FANCY_SQUARE_TICKS: &[Stroke] = &[
    M(0.5, 0.5),
    C(0.5, 0.5),
    M(-1.5, -1.5),
    C(-0.5, -0.5),
    M(1.5, 0.5),
    C(0.5, -0.5),
    M(-1.5, 1.5),
    C(-0.5, 0.5),
    M(1.5, -1.5),
];

const FANCY_DIAMOND: &[Stroke] = &[
    M(0.5, 0.0),
    C(-0.5, 0.5),
    C(-0.5, -0.5),
    C(0.5, -0.5),
    C(0.5, 0.5),
    End,
    C(0.5, 0.0),
    M(-1.0, 0.5),
    C(0.0, 0.5),
    M(-0.5, -1.0),
    C(-0.5, 0.0),
    M(1.0, -0.5),
    C(0.0, -0.5),
    M(0.0, 1.0),
];

const OCTAGON: &[Stroke] = &[
    M(-1.0, 0.5),
    C(0.0, -1.0),
    C(0.5, -0.5),
    C(1.0, 0.0),
    C(0.5, 0.5),
    C(0.0, 1.0),
    C(-0.5, 0.5),
    C(-1.0, 0.0),
    C(-0.5, -0.5),
    M(1.0, -0.5),
];

/// Fill level for the filled (`1`) and half-filled variants of a marker
/// family whose hollow member is `hollow`.
fn family_fill(kind: i32, hollow: i32, filled: i32, half: i32) -> Option<i32> {
    match kind {
        k if k == hollow => Some(0),
        k if k == filled => Some(1),
        k if k == half => Some(NOMINAL_HALF),
        _ => None,
    }
}

fn advance_factor(h: HAlign) -> f64 {
    match h {
        HAlign::Left => 1.0,
        HAlign::Center => 0.0,
        HAlign::Right => -1.0,
    }
}

impl<B: Backend> Device<B> {
    // ------------------------------------------------------------------
    // Labels
    // ------------------------------------------------------------------

    /// A label justified horizontally and vertically about the current
    /// position. Afterwards the position is moved along the baseline by the
    /// label's width, scaled by the horizontal justification.
    pub fn alabel(&mut self, h: HAlign, v: VAlign, text: &str) -> Result<()> {
        self.run("alabel", |d| d.draw_label(h, v, text))
    }

    /// A left-justified label on the baseline.
    pub fn label(&mut self, text: &str) -> Result<()> {
        self.alabel(HAlign::Left, VAlign::Baseline, text)
    }

    /// Width the label would have in the current font, in user units.
    pub fn label_width(&mut self, text: &str) -> Result<f64> {
        self.run("label_width", |d| {
            let text = d.printable(text);
            d.set_font();
            Ok(d.text_width(&text))
        })
    }

    /// Drop control characters, which labels can't show.
    fn printable(&mut self, text: &str) -> String {
        let clean: String = text.chars().filter(|c| !c.is_control()).collect();
        if clean.len() != text.len() {
            self.backend
                .warning("ignoring control character (e.g. CR or LF) in label");
        }
        clean
    }

    fn text_width(&mut self, text: &str) -> f64 {
        let state = self.top();
        if state.true_font_name.to_ascii_lowercase().starts_with("hershey") {
            return nominal_text_width(text, state.true_font_size);
        }
        let (backend, mut surface) = self.parts();
        backend.get_text_width(&mut surface, text)
    }

    fn draw_label(&mut self, h: HAlign, v: VAlign, text: &str) -> Result<()> {
        self.flush_path()?;
        let text = self.printable(text);
        self.set_font();
        let width = self.text_width(&text);

        let state = self.top();
        let origin = state.position;
        let baseline = DVec2::from_angle(state.text_angle.to_radians());
        let (mut sent_h, mut sent_v) = (h, v);
        let mut offset = DVec2::ZERO;
        if !self.caps.have_horizontal_justification {
            offset.x = -h.offset_fraction() * width;
            sent_h = HAlign::Left;
        }
        if !self.caps.have_vertical_justification {
            offset.y = match v {
                VAlign::Bottom => state.font_descent,
                VAlign::Baseline => 0.0,
                VAlign::Center => 0.5 * (state.font_descent - state.font_ascent),
                VAlign::CapLine => -state.font_cap_height,
                VAlign::Top => -state.font_ascent,
            };
            sent_v = VAlign::Baseline;
        }

        self.top_mut().position = origin + baseline.rotate(offset);
        let painted = {
            let (backend, mut surface) = self.parts();
            backend.paint_text_with_escapes(&mut surface, &text, sent_h, sent_v)
        };
        self.top_mut().position = origin + baseline * (advance_factor(h) * width);
        painted.map(|_| ())
    }

    // ------------------------------------------------------------------
    // Markers
    // ------------------------------------------------------------------

    /// Marker `kind` of `size` user units centered at (x, y). Kinds 1
    /// through 31 are built-in symbols; kinds from 32 on draw the character
    /// with that code.
    pub fn marker(&mut self, x: f64, y: f64, kind: i32, size: f64) -> Result<()> {
        self.run("marker", |d| d.draw_marker(dvec2(x, y), kind, size))
    }

    pub fn marker_rel(&mut self, dx: f64, dy: f64, kind: i32, size: f64) -> Result<()> {
        let origin = if self.open { self.top().position } else { Point::ZERO };
        self.marker(origin.x + dx, origin.y + dy, kind, size)
    }

    fn draw_marker(&mut self, at: Point, kind: i32, size: f64) -> Result<()> {
        self.flush_path()?;
        self.top_mut().position = at;
        if self.top().pen_type == 0 {
            return Ok(());
        }
        let handled = {
            let (backend, mut surface) = self.parts();
            backend.paint_marker(&mut surface, kind, size)?
        };
        if handled || kind < 0 {
            return Ok(());
        }
        let kind = kind % 256;

        self.save_frame();
        if self.caps.device_coords != DeviceCoords::Real {
            self.snap_to_device_grid();
        }
        let drawn = if kind > 31 {
            self.marker_glyph(kind, size)
        } else {
            self.marker_symbol(kind, size)
        };
        drawn.and(self.restore_frame())
    }

    /// Move the position onto the nearest integer device point.
    fn snap_to_device_grid(&mut self) {
        let state = self.top();
        let linear = state.transform.user_to_device.matrix2;
        if linear.determinant() == 0.0 {
            return;
        }
        let device = state.transform.to_device(state.position);
        let delta = linear.inverse() * (device.round() - device);
        self.top_mut().position += delta;
    }

    fn marker_glyph(&mut self, kind: i32, size: f64) -> Result<()> {
        let state = self.top_mut();
        state.pen_type = 1;
        state.font_size = size;
        state.text_angle = 0.0;
        let glyph = u8::try_from(kind).map(char::from).unwrap_or('?');
        self.draw_label(HAlign::Center, VAlign::Center, &glyph.to_string())
    }

    fn marker_symbol(&mut self, kind: i32, size: f64) -> Result<()> {
        let fg = self.top().fg_color;
        let state = self.top_mut();
        state.pen_type = 1;
        state.line_type = LineType::Solid;
        state.points_are_connected = true;
        state.dash_array_in_effect = false;
        state.cap_type = CapType::Butt;
        state.join_type = JoinType::Miter;
        state.fill_color_base = fg;
        state.fill_color = fg;

        let invoked = self.linewidth_invoked;
        self.apply_line_width(defaults::MARKER_LINE_SCALE * size)?;
        if self.caps.device_coords == DeviceCoords::IntegerRaster
            && self.top().quantized_device_line_width == 1
        {
            self.apply_line_width(0.0)?;
        }
        self.linewidth_invoked = invoked;

        let unit = 0.5 * defaults::MAXIMUM_MARKER_DIMENSION * size;
        match kind {
            1 => {
                if self.caps.device_coords == DeviceCoords::Real {
                    self.set_marker_fill(1);
                    let center = self.top().position;
                    self.add_circle(center, defaults::RELATIVE_DOT_SIZE * unit)
                } else {
                    let at = self.top().position;
                    self.add_point(at)
                }
            }
            2 => self.strokes(PLUS, unit),
            3 => self.strokes(ASTERISK, unit),
            5 => self.strokes(CROSS, unit),
            9 => {
                self.strokes(PLUS, unit)?;
                self.strokes(STAR_ARMS, unit)
            }
            8 => {
                self.set_marker_fill(0);
                self.strokes(DIAMOND, unit)
            }
            11 => self.strokes(STARBURST, unit),
            12 => self.strokes(FANCY_PLUS, unit),
            13 => self.strokes(FANCY_CROSS, unit),
            _ => self.filled_family(kind, unit),
        }
    }

    /// Markers that come hollow, filled and half-filled.
    fn filled_family(&mut self, kind: i32, unit: f64) -> Result<()> {
        if let Some(level) = family_fill(kind, 4, 16, 23) {
            self.set_marker_fill(level);
            let center = self.top().position;
            return self.add_circle(center, unit);
        }
        if let Some(level) = family_fill(kind, 6, 17, 24) {
            self.set_marker_fill(level);
            let center = self.top().position;
            let corner = DVec2::splat(unit);
            self.add_box(center - corner, center + corner)?;
            return self.strokes(&[M(-1.0, -1.0)], unit);
        }
        if let Some(level) = family_fill(kind, 7, 18, 25) {
            self.set_marker_fill(level);
            return self.strokes(TRIANGLE, unit);
        }
        if let Some(level) = family_fill(kind, 10, 20, 27) {
            self.set_marker_fill(level);
            return self.strokes(INVERTED_TRIANGLE, unit);
        }
        if let Some(level) = family_fill(kind, -1, 19, 26) {
            self.set_marker_fill(level);
            return self.strokes(FILLED_DIAMOND, unit);
        }
        if let Some(level) = family_fill(kind, 14, 21, 28) {
            self.set_marker_fill(level);
            let center = self.top().position;
            let corner = DVec2::splat(0.5 * unit);
            self.add_box(center - corner, center + corner)?;
            return self.strokes(FANCY_SQUARE_TICKS, unit);
        }
        if let Some(level) = family_fill(kind, 15, 22, 29) {
            self.set_marker_fill(level);
            return self.strokes(FANCY_DIAMOND, unit);
        }
        if let Some(level) = family_fill(kind, 30, 31, -1) {
            self.set_marker_fill(level);
            return self.strokes(OCTAGON, unit);
        }
        Ok(())
    }

    fn set_marker_fill(&mut self, level: i32) {
        let state = self.top_mut();
        state.fill_type = level;
        state.fill_color = if level == 0 {
            state.fill_color_base
        } else {
            state
                .fill_color_base
                .desaturate(f64::from(level - 1) / f64::from(0xfffe))
        };
    }

    fn strokes(&mut self, strokes: &[Stroke], unit: f64) -> Result<()> {
        for stroke in strokes {
            match *stroke {
                Stroke::Move(dx, dy) => {
                    self.flush_path()?;
                    self.top_mut().position += dvec2(dx, dy) * unit;
                }
                Stroke::Cont(dx, dy) => {
                    let end = self.top().position + dvec2(dx, dy) * unit;
                    self.add_line(None, end)?;
                }
                Stroke::End => self.flush_path()?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Capabilities, Surface};
    use crate::params::DeviceParams;
    use crate::registry::DeviceRegistry;
    use crate::render::Path;

    #[derive(Debug, Clone, PartialEq)]
    struct Text {
        text: String,
        h: HAlign,
        v: VAlign,
        at: Point,
        size: f64,
    }

    #[derive(Debug, Default)]
    struct Recorder {
        justifies: bool,
        native_markers: bool,
        texts: Vec<Text>,
        /// (fill_type, pen_type) of each painted path
        paths: Vec<(i32, i32)>,
        warnings: Vec<String>,
    }

    impl Backend for Recorder {
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                have_horizontal_justification: self.justifies,
                have_vertical_justification: self.justifies,
                ..Capabilities::GENERIC
            }
        }

        fn paint_path(&mut self, surface: &mut Surface<'_>, _path: &Path) -> Result<()> {
            self.paths.push((surface.state.fill_type, surface.state.pen_type));
            Ok(())
        }

        fn paint_marker(&mut self, _surface: &mut Surface<'_>, _kind: i32, _size: f64) -> Result<bool> {
            Ok(self.native_markers)
        }

        fn paint_text(&mut self, surface: &mut Surface<'_>, text: &str, h: HAlign, v: VAlign) -> Result<f64> {
            self.texts.push(Text {
                text: text.to_string(),
                h,
                v,
                at: surface.state.position,
                size: surface.state.true_font_size,
            });
            Ok(0.0)
        }

        fn warning(&mut self, message: &str) {
            self.warnings.push(message.to_string());
        }
    }

    fn open_with(backend: Recorder) -> Device<Recorder> {
        let params = DeviceParams::new().resolve_with(|_| None);
        let mut d = Device::with_registry(backend, params, DeviceRegistry::new()).unwrap();
        d.open().unwrap();
        d
    }

    fn near(a: Point, b: Point) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn labels_advance_along_the_baseline() {
        let mut d = open_with(Recorder::default());
        d.font_size(10.0).unwrap();
        assert!((d.label_width("abc").unwrap() - 18.0).abs() < 1e-9);
        d.label("abc").unwrap();
        assert!(near(d.state().unwrap().position, dvec2(18.0, 0.0)));

        d.move_to(0.0, 0.0).unwrap();
        d.text_angle(90.0).unwrap();
        d.label("ab").unwrap();
        assert!(near(d.state().unwrap().position, dvec2(0.0, 12.0)));
    }

    #[test]
    fn justification_is_emulated() {
        let mut d = open_with(Recorder::default());
        d.font_size(10.0).unwrap();
        d.move_to(100.0, 100.0).unwrap();
        d.alabel(HAlign::Center, VAlign::Center, "abc").unwrap();
        let text = &d.backend().texts[0];
        assert_eq!((text.h, text.v), (HAlign::Left, VAlign::Baseline));
        let dy = 0.5 * (10.0 * 7.0 / 33.0 - 10.0 * 26.0 / 33.0);
        assert!(near(text.at, dvec2(91.0, 100.0 + dy)));
        assert!(near(d.state().unwrap().position, dvec2(100.0, 100.0)));

        d.alabel(HAlign::Right, VAlign::Top, "abc").unwrap();
        assert!(near(d.state().unwrap().position, dvec2(82.0, 100.0)));
    }

    #[test]
    fn justifying_backends_get_the_request() {
        let mut d = open_with(Recorder {
            justifies: true,
            ..Recorder::default()
        });
        d.move_to(5.0, 5.0).unwrap();
        d.alabel(HAlign::Right, VAlign::CapLine, "x").unwrap();
        let text = &d.backend().texts[0];
        assert_eq!((text.h, text.v), (HAlign::Right, VAlign::CapLine));
        assert_eq!(text.at, dvec2(5.0, 5.0));
    }

    #[test]
    fn control_characters_are_dropped() {
        let mut d = open_with(Recorder::default());
        d.label("a\r\nb").unwrap();
        assert_eq!(d.backend().texts[0].text, "ab");
        assert_eq!(
            d.backend().warnings,
            vec!["ignoring control character (e.g. CR or LF) in label".to_string()]
        );
    }

    #[test]
    fn markers_restore_the_state() {
        let mut d = open_with(Recorder::default());
        d.line_mod("dotted").unwrap();
        d.marker(3.0, 4.0, 17, 1.0).unwrap();
        assert_eq!(d.backend().paths, vec![(1, 1)]);
        let state = d.state().unwrap();
        assert_eq!(state.position, dvec2(3.0, 4.0));
        assert_eq!(state.line_type, LineType::Dotted);
        assert_eq!(state.fill_type, 0);
        assert!(state.line_width_is_default);
        assert_eq!(d.depth(), 1);
    }

    #[test]
    fn plus_marker_is_two_strokes() {
        let mut d = open_with(Recorder::default());
        d.marker(0.0, 0.0, 2, 8.0).unwrap();
        assert_eq!(d.backend().paths, vec![(0, 1), (0, 1)]);
    }

    #[test]
    fn half_filled_markers_use_a_light_fill() {
        let mut d = open_with(Recorder::default());
        d.marker(0.0, 0.0, 25, 8.0).unwrap();
        assert_eq!(d.backend().paths, vec![(NOMINAL_HALF, 1)]);
    }

    #[test]
    fn fancy_diamond_paints_outline_then_ticks() {
        let mut d = open_with(Recorder::default());
        d.marker(0.0, 0.0, 22, 8.0).unwrap();
        let paths = &d.backend().paths;
        assert_eq!(paths.len(), 5);
        assert!(paths.iter().all(|p| *p == (1, 1)));
    }

    #[test]
    fn character_markers_are_centered_labels() {
        let mut d = open_with(Recorder::default());
        d.marker(1.0, 1.0, 65, 6.0).unwrap();
        let text = &d.backend().texts[0];
        assert_eq!(text.text, "A");
        assert_eq!(text.size, 6.0);
        assert_eq!(d.state().unwrap().position, dvec2(1.0, 1.0));
    }

    #[test]
    fn markers_need_a_pen_and_a_kind() {
        let mut d = open_with(Recorder::default());
        d.pen_type(0).unwrap();
        d.marker(0.0, 0.0, 4, 1.0).unwrap();
        d.pen_type(1).unwrap();
        d.marker(0.0, 0.0, -3, 1.0).unwrap();
        d.marker(0.0, 0.0, 0, 1.0).unwrap();
        assert!(d.backend().paths.is_empty());
        assert!(d.backend().texts.is_empty());

        let mut native = open_with(Recorder {
            native_markers: true,
            ..Recorder::default()
        });
        native.marker(0.0, 0.0, 4, 1.0).unwrap();
        assert!(native.backend().paths.is_empty());
    }
}
