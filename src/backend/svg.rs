//! SVG generation
//!
//! One buffered page. Painted paths are converted to device coordinates
//! immediately and collected as `svg` elements; the document is assembled
//! at `end_page` so that it picks up the final background color. Only the
//! first page ever reaches the output.

use glam::{DAffine2, DVec2, dvec2};
use svg::Document;
use svg::node::element::{Circle, Ellipse, Group, Path as SvgPath, Rectangle, Text as SvgText};

use super::{
    Backend, Capabilities, Capability, FontMetrics, HAlign, ScalingPolicy, Surface, VAlign, fmt_num,
    nominal_text_width, raster_ndc_map, stroke_font_metrics,
};
use crate::errors::Result;
use crate::page::OutputModel;
use crate::params::ResolvedParams;
use crate::render::geometry;
use crate::render::{CapType, DrawingState, FillRule, JoinType, Path, PathShape, Segment};
use crate::types::{Color, Point, Transform};

const DECIMALS: usize = 2;
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

#[derive(Debug, Clone)]
pub struct SvgBackend {
    width: u32,
    height: u32,
    rotation: u32,
    /// Elements painted on the current page
    body: Group,
}

impl Default for SvgBackend {
    fn default() -> Self {
        Self::from_params(&ResolvedParams::default())
    }
}

impl SvgBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_params(params: &ResolvedParams) -> Self {
        let (width, height) = params.bitmap_size();
        SvgBackend {
            width,
            height,
            rotation: params.rotation(),
            body: Group::new(),
        }
    }

    fn push(&mut self, node: impl Into<Box<dyn svg::Node>>) {
        let body = std::mem::replace(&mut self.body, Group::new());
        self.body = body.add(node);
    }

    /// The whole page as a standalone document.
    fn document(&self, background: Color) -> Document {
        let (w, h) = (self.width, self.height);
        let backdrop = Rectangle::new()
            .set("x", "0")
            .set("y", "0")
            .set("width", w.to_string())
            .set("height", h.to_string())
            .set("fill", background.to_string());
        Document::new()
            .set("xmlns", "http://www.w3.org/2000/svg")
            .set("width", w.to_string())
            .set("height", h.to_string())
            .set("viewBox", format!("0 0 {w} {h}"))
            .add(backdrop)
            .add(self.body.clone())
    }
}

fn num(v: f64) -> String {
    fmt_num(v, DECIMALS)
}

fn pt(p: Point) -> String {
    format!("{},{}", num(p.x), num(p.y))
}

/// Set every `(name, value)` pair on an element.
macro_rules! with_attrs {
    ($element:expr, $attrs:expr) => {{
        let mut element = $element;
        for (name, value) in $attrs {
            element = element.set(name, value);
        }
        element
    }};
}

/// Presentation attributes for a path painted with `state`.
fn style(state: &DrawingState, filled: bool, stroked: bool) -> Vec<(&'static str, String)> {
    let mut attrs = Vec::new();
    if filled {
        let rule = match state.fill_rule {
            FillRule::EvenOdd => "evenodd",
            FillRule::NonzeroWinding => "nonzero",
        };
        attrs.push(("fill", state.fill_color.to_string()));
        attrs.push(("fill-rule", rule.to_string()));
    } else {
        attrs.push(("fill", "none".to_string()));
    }
    if !stroked {
        return attrs;
    }
    let cap = match state.cap_type {
        CapType::Butt => "butt",
        CapType::Round | CapType::Triangular => "round",
        CapType::Projecting => "square",
    };
    let join = match state.join_type {
        JoinType::Miter => "miter",
        JoinType::Round | JoinType::Triangular => "round",
        JoinType::Bevel => "bevel",
    };
    attrs.push(("stroke", state.fg_color.to_string()));
    attrs.push(("stroke-width", num(state.device_line_width)));
    attrs.push(("stroke-linecap", cap.to_string()));
    attrs.push(("stroke-linejoin", join.to_string()));
    if state.join_type == JoinType::Miter {
        attrs.push(("stroke-miterlimit", num(state.miter_limit)));
    }
    let (dashes, offset) = state.effective_dash();
    if !dashes.is_empty() {
        let scale = state.transform.min_device_scale();
        let lengths: Vec<String> = dashes.iter().map(|d| num(d * scale)).collect();
        attrs.push(("stroke-dasharray", lengths.join(" ")));
        if offset != 0.0 {
            attrs.push(("stroke-dashoffset", num(offset * scale)));
        }
    }
    attrs
}

/// `rotate(...)` about `pivot` for a direction `dir`, or `None` when level.
fn rotation_about(dir: DVec2, pivot: Point) -> Option<String> {
    let degrees = dir.y.atan2(dir.x).to_degrees();
    (degrees.abs() >= 1e-9)
        .then(|| format!("rotate({} {} {})", num(degrees), num(pivot.x), num(pivot.y)))
}

/// SVG path data for a segment list, in device coordinates.
fn segment_data(segments: &[Segment], t: &Transform) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(segments.len() + 1);
    let mut current = Point::ZERO;
    for segment in segments {
        let part = match *segment {
            Segment::MoveTo(p) => format!("M{}", pt(t.to_device(p))),
            Segment::LineTo(p) => format!("L{}", pt(t.to_device(p))),
            Segment::Arc { center, end } => {
                let (s, e, c) = (t.to_device(current), t.to_device(end), t.to_device(center));
                let r = num((s - c).length());
                let sweep = u8::from(geometry::sweep_angle(s, e, c) > 0.0);
                format!("A{r},{r} 0 0,{sweep} {}", pt(e))
            }
            Segment::EllArc { center, end } => {
                let (c1, c2) = geometry::ellarc_as_cubic(current, end, center);
                format!(
                    "C{} {} {}",
                    pt(t.to_device(c1)),
                    pt(t.to_device(c2)),
                    pt(t.to_device(end))
                )
            }
            Segment::Quad { control, end } => {
                format!("Q{} {}", pt(t.to_device(control)), pt(t.to_device(end)))
            }
            Segment::Cubic { c1, c2, end } => format!(
                "C{} {} {}",
                pt(t.to_device(c1)),
                pt(t.to_device(c2)),
                pt(t.to_device(end))
            ),
        };
        parts.push(part);
        current = segment.end();
    }
    let closed = segments.len() > 2
        && segments.first().map(Segment::end) == segments.last().map(Segment::end);
    if closed {
        parts.push("Z".to_string());
    }
    parts.join(" ")
}

/// One SVG element for a simple path.
fn path_element(path: &Path, state: &DrawingState, filled: bool, stroked: bool) -> Box<dyn svg::Node> {
    let t = &state.transform;
    let attrs = style(state, filled, stroked);
    match path.shape {
        PathShape::Segments(ref segments) => Box::new(with_attrs!(
            SvgPath::new().set("d", segment_data(segments, t)),
            attrs
        )),
        PathShape::Box { p0, p1 } => {
            let (a, b) = (t.to_device(p0), t.to_device(p1));
            let (lo, hi) = (a.min(b), a.max(b));
            let rect = Rectangle::new()
                .set("x", num(lo.x))
                .set("y", num(lo.y))
                .set("width", num(hi.x - lo.x))
                .set("height", num(hi.y - lo.y));
            Box::new(with_attrs!(rect, attrs))
        }
        PathShape::Circle { center, radius } => {
            let c = t.to_device(center);
            let r = t.to_device_vector(dvec2(radius, 0.0)).length();
            let circle = Circle::new()
                .set("cx", num(c.x))
                .set("cy", num(c.y))
                .set("r", num(r));
            Box::new(with_attrs!(circle, attrs))
        }
        PathShape::Ellipse {
            center,
            rx,
            ry,
            angle,
        } => {
            // images of the semi-axes stay perpendicular under the transforms
            // this shape is accepted for
            let turn = DAffine2::from_angle(angle.to_radians());
            let u = t.to_device_vector(turn.transform_vector2(dvec2(rx, 0.0)));
            let v = t.to_device_vector(turn.transform_vector2(dvec2(0.0, ry)));
            let c = t.to_device(center);
            let mut ellipse = Ellipse::new()
                .set("cx", num(c.x))
                .set("cy", num(c.y))
                .set("rx", num(u.length()))
                .set("ry", num(v.length()));
            if let Some(rotate) = rotation_about(u, c) {
                ellipse = ellipse.set("transform", rotate);
            }
            Box::new(with_attrs!(ellipse, attrs))
        }
    }
}

impl Backend for SvgBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            type_name: "svg",
            output_model: OutputModel::OnePage,
            flipped_y: true,
            have_pcl_fonts: Capability::Unsupported,
            have_stick_fonts: Capability::Unsupported,
            have_horizontal_justification: true,
            have_mixed_paths: true,
            arc_scaling: ScalingPolicy::Uniform,
            quad_scaling: ScalingPolicy::Any,
            cubic_scaling: ScalingPolicy::Any,
            box_scaling: ScalingPolicy::AxesPreserved,
            circle_scaling: ScalingPolicy::Uniform,
            ellipse_scaling: ScalingPolicy::AxesPreserved,
            ..Capabilities::GENERIC
        }
    }

    fn ndc_to_device(&self) -> DAffine2 {
        raster_ndc_map(
            f64::from(self.width),
            f64::from(self.height),
            self.rotation,
            false,
        )
    }

    fn initialize(&mut self, params: &ResolvedParams) -> Result<()> {
        *self = Self::from_params(params);
        Ok(())
    }

    fn begin_page(&mut self, _surface: &mut Surface<'_>) -> Result<()> {
        self.body = Group::new();
        Ok(())
    }

    fn erase_page(&mut self, _surface: &mut Surface<'_>) -> Result<()> {
        self.body = Group::new();
        Ok(())
    }

    fn end_page(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        let document = self.document(surface.state.bg_color);
        if let Some(page) = surface.page.as_deref_mut() {
            page.header = Some(XML_DECLARATION.as_bytes().to_vec());
            page.replace(format!("{document}\n").into_bytes());
        }
        Ok(())
    }

    fn paint_path(&mut self, surface: &mut Surface<'_>, path: &Path) -> Result<()> {
        let state = surface.state;
        let (filled, stroked) = (state.fill_type != 0, state.pen_type != 0);
        if !filled && !stroked {
            return Ok(());
        }
        note_colors(surface, filled, stroked);
        surface.expand_bbox(path);
        self.push(path_element(path, surface.state, filled, stroked));
        Ok(())
    }

    fn paint_paths(&mut self, surface: &mut Surface<'_>, paths: &[Path]) -> Result<bool> {
        let state = surface.state;
        let (filled, stroked) = (state.fill_type != 0, state.pen_type != 0);
        if !filled && !stroked {
            return Ok(true);
        }
        note_colors(surface, filled, stroked);
        let mut data: Vec<String> = Vec::with_capacity(paths.len());
        for path in paths {
            surface.expand_bbox(path);
            let list = path.to_segment_list();
            data.push(segment_data(list.segments(), &surface.state.transform));
        }
        let compound = with_attrs!(
            SvgPath::new().set("d", data.join(" ")),
            style(surface.state, filled, stroked)
        );
        self.push(compound);
        Ok(true)
    }

    fn paint_point(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        let state = surface.state;
        let p = state.transform.to_device(state.position);
        let dot = Circle::new()
            .set("cx", num(p.x))
            .set("cy", num(p.y))
            .set("r", "0.5")
            .set("fill", state.fg_color.to_string());
        self.push(dot);
        Ok(())
    }

    fn paint_text(
        &mut self,
        surface: &mut Surface<'_>,
        text: &str,
        h: HAlign,
        _v: VAlign,
    ) -> Result<f64> {
        let state = surface.state;
        let t = &state.transform;
        let p = t.to_device(state.position);
        let theta = state.text_angle.to_radians();
        let dir = t.to_device_vector(dvec2(theta.cos(), theta.sin()));
        let size = t.to_device_vector(dvec2(0.0, state.true_font_size)).length();
        let anchor = match h {
            HAlign::Left => "start",
            HAlign::Center => "middle",
            HAlign::Right => "end",
        };
        let mut label = SvgText::new(text)
            .set("x", num(p.x))
            .set("y", num(p.y))
            .set("font-family", state.true_font_name.as_str())
            .set("font-size", num(size))
            .set("text-anchor", anchor)
            .set("fill", state.fg_color.to_string());
        if let Some(rotate) = rotation_about(dir, p) {
            label = label.set("transform", rotate);
        }
        let font = state.true_font_name.clone();
        let width = nominal_text_width(text, state.true_font_size);
        self.push(label);
        if let Some(page) = surface.page.as_deref_mut() {
            page.note_font(&font);
        }
        Ok(width)
    }

    fn get_text_width(&mut self, surface: &mut Surface<'_>, text: &str) -> f64 {
        nominal_text_width(text, surface.state.true_font_size)
    }

    fn retrieve_font(
        &mut self,
        _surface: &mut Surface<'_>,
        name: &str,
        size: f64,
    ) -> Option<FontMetrics> {
        Some(stroke_font_metrics(name, size))
    }
}

fn note_colors(surface: &mut Surface<'_>, filled: bool, stroked: bool) {
    let plain = |c: Color| c == Color::BLACK || c == Color::WHITE;
    let state = surface.state;
    let colored = (filled && !plain(state.fill_color)) || (stroked && !plain(state.fg_color));
    if let (true, Some(page)) = (colored, surface.page.as_deref_mut()) {
        page.colors_used = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DAffine2;

    fn flipped(height: f64) -> Transform {
        let ndc = DAffine2::from_cols_array(&[1.0, 0.0, 0.0, -1.0, 0.0, height]);
        Transform::new(DAffine2::IDENTITY, ndc, true)
    }

    #[test]
    fn segment_lists_become_path_data() {
        let t = flipped(10.0);
        let segments = [
            Segment::MoveTo(dvec2(0.0, 0.0)),
            Segment::LineTo(dvec2(4.0, 0.0)),
            Segment::LineTo(dvec2(4.0, 3.0)),
            Segment::LineTo(dvec2(0.0, 0.0)),
        ];
        assert_eq!(segment_data(&segments, &t), "M0,10 L4,10 L4,7 L0,10 Z");
    }

    #[test]
    fn arc_sweep_follows_the_flip() {
        let t = flipped(0.0);
        // counterclockwise quarter circle in user space
        let segments = [
            Segment::MoveTo(dvec2(1.0, 0.0)),
            Segment::Arc {
                center: dvec2(0.0, 0.0),
                end: dvec2(0.0, 1.0),
            },
        ];
        assert_eq!(segment_data(&segments, &t), "M1,0 A1,1 0 0,0 0,-1");
    }

    #[test]
    fn unfilled_style_has_no_fill() {
        let state = DrawingState::new("HersheySerif", flipped(1.0));
        let attrs = style(&state, false, true);
        assert_eq!(attrs[0], ("fill", "none".to_string()));
        assert_eq!(attrs[1], ("stroke", "#000000".to_string()));
        assert!(attrs.iter().all(|(name, _)| *name != "stroke-dasharray"));
    }

    #[test]
    fn level_text_needs_no_rotation() {
        assert_eq!(rotation_about(dvec2(2.0, 0.0), dvec2(5.0, 5.0)), None);
        assert_eq!(
            rotation_about(dvec2(0.0, 1.0), dvec2(5.0, 5.0)).as_deref(),
            Some("rotate(90 5 5)")
        );
    }
}
