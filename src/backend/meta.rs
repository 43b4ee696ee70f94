//! Textual metafile backend.
//!
//! Each page is recorded as lines of text in user coordinates:
//!
//! ```text
//! openpl 1
//! attrs pen=#000000 fill=#000000 pentype=1 filltype=0 width=0.0012 line=solid cap=butt join=miter rule=even-odd
//! path M 0 0 L 1 1
//! closepl
//! ```
//!
//! An `attrs` line is written only when some attribute differs from the
//! last one written on the page. Closed primitives are written as `box`,
//! `circle` and `ellipse` paths; compound paths as a `paths N` line
//! followed by N `path` lines.

use std::fmt::Write;

use super::{
    Backend, Capabilities, Capability, FontMetrics, HAlign, ScalingPolicy, Surface, VAlign, fmt_num,
    stroke_font_metrics,
};
use crate::errors::Result;
use crate::page::OutputModel;
use crate::render::{DrawingState, Path, PathShape, Segment};
use crate::types::Point;

const DECIMALS: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct MetaBackend {
    /// Last `attrs` line written on this page
    last_attrs: Option<String>,
    /// Last font line written on this page
    last_font: Option<String>,
    /// `savestate` lines currently unmatched
    saved: usize,
}

impl MetaBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn sync_attrs(&mut self, surface: &mut Surface<'_>) {
        let attrs = attrs_line(surface.state);
        if self.last_attrs.as_deref() != Some(attrs.as_str()) {
            surface.write_page(&attrs);
            self.last_attrs = Some(attrs);
        }
    }

    fn forget_attrs(&mut self) {
        self.last_attrs = None;
        self.last_font = None;
    }
}

fn num(v: f64) -> String {
    fmt_num(v, DECIMALS)
}

fn pt(p: Point) -> String {
    format!("{} {}", num(p.x), num(p.y))
}

fn attrs_line(state: &DrawingState) -> String {
    let mut line = format!(
        "attrs pen={} fill={} pentype={} filltype={} width={} line={} cap={} join={} rule={}",
        state.fg_color,
        state.fill_color,
        state.pen_type,
        state.fill_type,
        num(state.line_width),
        state.line_mode(),
        state.cap_type.name(),
        state.join_type.name(),
        state.fill_rule.name(),
    );
    if state.dash_array_in_effect {
        let dashes: Vec<String> = state.dash_array.iter().map(|d| num(*d)).collect();
        let _ = write!(line, " dash=[{}]@{}", dashes.join(","), num(state.dash_offset));
    }
    line.push('\n');
    line
}

fn path_line(path: &Path) -> String {
    let mut line = String::from("path");
    match &path.shape {
        PathShape::Segments(segments) => {
            for segment in segments {
                let _ = match *segment {
                    Segment::MoveTo(p) => write!(line, " M {}", pt(p)),
                    Segment::LineTo(p) => write!(line, " L {}", pt(p)),
                    Segment::Arc { center, end } => write!(line, " A {} {}", pt(center), pt(end)),
                    Segment::EllArc { center, end } => {
                        write!(line, " E {} {}", pt(center), pt(end))
                    }
                    Segment::Quad { control, end } => {
                        write!(line, " Q {} {}", pt(control), pt(end))
                    }
                    Segment::Cubic { c1, c2, end } => {
                        write!(line, " C {} {} {}", pt(c1), pt(c2), pt(end))
                    }
                };
            }
        }
        PathShape::Box { p0, p1 } => {
            let _ = write!(line, " box {} {}", pt(*p0), pt(*p1));
        }
        PathShape::Circle { center, radius } => {
            let _ = write!(line, " circle {} {}", pt(*center), num(*radius));
        }
        PathShape::Ellipse {
            center,
            rx,
            ry,
            angle,
        } => {
            let _ = write!(
                line,
                " ellipse {} {} {} {}",
                pt(*center),
                num(*rx),
                num(*ry),
                num(*angle)
            );
        }
    }
    if path.clockwise && path.kind() != crate::render::PathKind::SegmentList {
        line.push_str(" cw");
    }
    line.push('\n');
    line
}

impl Backend for MetaBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            type_name: "meta",
            output_model: OutputModel::OnePageAtATime,
            have_wide_lines: Capability::Maybe,
            have_dash_array: Capability::Maybe,
            have_solid_fill: Capability::Maybe,
            have_odd_winding_fill: Capability::Maybe,
            have_nonzero_winding_fill: Capability::Maybe,
            have_settable_bg: Capability::Maybe,
            have_extra_stick_fonts: Capability::Supported,
            have_horizontal_justification: true,
            have_vertical_justification: true,
            have_mixed_paths: true,
            arc_scaling: ScalingPolicy::Any,
            ellarc_scaling: ScalingPolicy::Any,
            quad_scaling: ScalingPolicy::Any,
            cubic_scaling: ScalingPolicy::Any,
            box_scaling: ScalingPolicy::Any,
            circle_scaling: ScalingPolicy::Any,
            ellipse_scaling: ScalingPolicy::Any,
            ..Capabilities::GENERIC
        }
    }

    fn begin_page(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        self.forget_attrs();
        self.saved = 0;
        let line = format!("openpl {}\n", surface.page_number);
        surface.write_page(&line);
        Ok(())
    }

    /// The erased page loses its `savestate` lines, so the frames still
    /// on the stack are saved again.
    fn erase_page(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        self.forget_attrs();
        surface.write_page("erase\n");
        for _ in 0..self.saved {
            surface.write_page("savestate\n");
        }
        Ok(())
    }

    fn end_page(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        surface.write_page("closepl\n");
        Ok(())
    }

    fn push_state(&mut self, surface: &mut Surface<'_>) {
        self.saved += 1;
        surface.write_page("savestate\n");
    }

    fn pop_state(&mut self, surface: &mut Surface<'_>) {
        self.saved = self.saved.saturating_sub(1);
        surface.write_page("restorestate\n");
        // the restored frame may differ from what was last written
        self.forget_attrs();
    }

    fn paint_path(&mut self, surface: &mut Surface<'_>, path: &Path) -> Result<()> {
        self.sync_attrs(surface);
        surface.expand_bbox(path);
        surface.write_page(&path_line(path));
        Ok(())
    }

    fn paint_paths(&mut self, surface: &mut Surface<'_>, paths: &[Path]) -> Result<bool> {
        self.sync_attrs(surface);
        surface.write_page(&format!("paths {}\n", paths.len()));
        for path in paths {
            surface.expand_bbox(path);
            surface.write_page(&path_line(path));
        }
        Ok(true)
    }

    fn paint_point(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        self.sync_attrs(surface);
        let line = format!("point {}\n", pt(surface.state.position));
        surface.write_page(&line);
        Ok(())
    }

    fn paint_marker(&mut self, surface: &mut Surface<'_>, kind: i32, size: f64) -> Result<bool> {
        self.sync_attrs(surface);
        let line = format!(
            "marker {} {} {}\n",
            pt(surface.state.position),
            kind,
            num(size)
        );
        surface.write_page(&line);
        Ok(true)
    }

    fn paint_text_with_escapes(
        &mut self,
        surface: &mut Surface<'_>,
        text: &str,
        h: HAlign,
        v: VAlign,
    ) -> Result<f64> {
        self.sync_attrs(surface);
        let state = surface.state;
        let font = format!(
            "font {} {} {}\n",
            state.true_font_name,
            num(state.true_font_size),
            num(state.text_angle)
        );
        if self.last_font.as_deref() != Some(font.as_str()) {
            surface.write_page(&font);
            if let Some(page) = surface.page.as_deref_mut() {
                page.note_font(&state.true_font_name);
            }
            self.last_font = Some(font);
        }
        let line = format!(
            "label {} {} {} {}\n",
            h.as_char(),
            v.as_char(),
            pt(state.position),
            text
        );
        surface.write_page(&line);
        Ok(0.0)
    }

    /// Any font name is recorded as given, with stroke-font proportions.
    fn retrieve_font(
        &mut self,
        _surface: &mut Surface<'_>,
        name: &str,
        size: f64,
    ) -> Option<FontMetrics> {
        Some(stroke_font_metrics(name, size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::dvec2;

    #[test]
    fn segment_lists_are_written_in_order() {
        let mut path = Path::starting_at(dvec2(0.0, 0.0));
        path.push(Segment::LineTo(dvec2(1.0, 0.5)));
        path.push(Segment::Arc {
            center: dvec2(1.0, 1.0),
            end: dvec2(1.5, 1.0),
        });
        assert_eq!(path_line(&path), "path M 0 0 L 1 0.5 A 1 1 1.5 1\n");
    }

    #[test]
    fn primitives_record_their_direction() {
        let boxed = Path::rect(dvec2(0.0, 0.0), dvec2(2.0, 1.0), true);
        assert_eq!(path_line(&boxed), "path box 0 0 2 1 cw\n");
        let circle = Path::circle(dvec2(0.25, 0.25), 1.0 / 3.0, false);
        assert_eq!(path_line(&circle), "path circle 0.25 0.25 0.3333\n");
    }
}
