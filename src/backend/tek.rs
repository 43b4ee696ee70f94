//! Tektronix 4010-style vector terminal stream.
//!
//! Every segment is clipped to the 1024x780 screen and written to the sink
//! as soon as it is added to the path, so a path can never be retracted
//! once started. The terminal has no fill and no wide lines.

use glam::DAffine2;

use super::{Backend, Capabilities, Capability, DeviceCoords, Surface};
use crate::errors::{PlotError, Result};
use crate::page::OutputModel;
use crate::render::{ClipRect, DrawingState, LineType, Path, Segment, clip_line};
use crate::types::Point;

const ESC: u8 = 0x1b;
/// Enter graph mode; the next point starts a dark vector
const GS: u8 = 0x1d;
/// Return to alpha mode
const US: u8 = 0x1f;
const FF: u8 = 0x0c;

const SCREEN_WIDTH: f64 = 1024.0;
const SCREEN_HEIGHT: f64 = 780.0;

/// Four-byte address of a screen point: high y, low y, high x, low x.
fn encode_point(x: i32, y: i32) -> [u8; 4] {
    [
        0x20 | ((y >> 5) & 0x1f) as u8,
        0x60 | (y & 0x1f) as u8,
        0x20 | ((x >> 5) & 0x1f) as u8,
        0x40 | (x & 0x1f) as u8,
    ]
}

/// Hardware line style selected by `ESC` and this byte. A dash array is
/// shown as short dashes.
fn line_style_code(state: &DrawingState) -> u8 {
    if state.dash_array_in_effect {
        return if state.dash_array.iter().any(|d| *d > 0.0) {
            b'c'
        } else {
            b'`'
        };
    }
    match state.line_type {
        LineType::Solid => b'`',
        LineType::Dotted => b'a',
        LineType::DotDashed | LineType::DotDotDashed | LineType::DotDotDotDashed => b'b',
        LineType::ShortDashed => b'c',
        LineType::LongDashed => b'd',
    }
}

fn screen_rect() -> ClipRect {
    ClipRect::new(0.0, 0.0, SCREEN_WIDTH - 1.0, SCREEN_HEIGHT - 1.0)
}

#[derive(Debug, Clone, Default)]
pub struct TekBackend {
    /// Where the terminal's beam is, if known
    beam: Option<(i32, i32)>,
    /// Line style last selected on the terminal
    line_style: Option<u8>,
}

impl TekBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn forget_terminal_state(&mut self) {
        self.beam = None;
        self.line_style = None;
    }

    /// Append the bytes drawing a clipped device-space line.
    fn draw_line(&mut self, out: &mut Vec<u8>, from: Point, to: Point, style: u8) {
        let (outcome, a, b) = clip_line(from, to, &screen_rect());
        if !outcome.accepted {
            return;
        }
        let a = (a.x.round() as i32, a.y.round() as i32);
        let b = (b.x.round() as i32, b.y.round() as i32);
        if self.line_style != Some(style) {
            out.extend_from_slice(&[ESC, style]);
            self.line_style = Some(style);
        }
        if outcome.first_moved || self.beam != Some(a) {
            out.push(GS);
            out.extend_from_slice(&encode_point(a.0, a.1));
        }
        out.extend_from_slice(&encode_point(b.0, b.1));
        self.beam = Some(b);
    }
}

/// Vertices of one segment as a polyline, excluding its start.
fn segment_vertices(start: Point, segment: &Segment) -> Vec<Point> {
    match segment {
        Segment::MoveTo(_) => Vec::new(),
        Segment::LineTo(p) => vec![*p],
        curve => {
            let mut piece = Path::starting_at(start);
            piece.push(*curve);
            piece.polyline().split_off(1)
        }
    }
}

impl Backend for TekBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            type_name: "tek",
            output_model: OutputModel::CustomRoutinesRealTime,
            device_coords: DeviceCoords::Integer,
            have_wide_lines: Capability::Unsupported,
            have_dash_array: Capability::Unsupported,
            have_solid_fill: Capability::Unsupported,
            have_odd_winding_fill: Capability::Unsupported,
            have_nonzero_winding_fill: Capability::Unsupported,
            have_settable_bg: Capability::Unsupported,
            have_ps_fonts: Capability::Unsupported,
            have_pcl_fonts: Capability::Unsupported,
            have_stick_fonts: Capability::Unsupported,
            ..Capabilities::GENERIC
        }
    }

    /// The unit square fills the screen height, centered horizontally.
    fn ndc_to_device(&self) -> DAffine2 {
        let side = SCREEN_HEIGHT - 1.0;
        let margin = 0.5 * (SCREEN_WIDTH - SCREEN_HEIGHT);
        DAffine2::from_cols_array(&[side, 0.0, 0.0, side, margin, 0.0])
    }

    fn begin_page(&mut self, _surface: &mut Surface<'_>) -> Result<()> {
        self.forget_terminal_state();
        Ok(())
    }

    fn erase_page(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        self.forget_terminal_state();
        surface.write_sink(&[ESC, FF]).map_err(PlotError::from)
    }

    fn end_page(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        self.forget_terminal_state();
        surface.write_sink(&[US]).map_err(PlotError::from)
    }

    fn path_is_flushable(&self) -> bool {
        false
    }

    fn maybe_prepaint_segments(&mut self, surface: &mut Surface<'_>, prev: usize) -> Result<()> {
        let state = surface.state;
        let Some(path) = state.path.as_ref() else {
            return Ok(());
        };
        if state.pen_type == 0 {
            return Ok(());
        }
        let segments = path.segments();
        let style = line_style_code(state);
        let mut out = Vec::new();
        for i in prev.max(1)..segments.len() {
            let mut start = segments[i - 1].end();
            for end in segment_vertices(start, &segments[i]) {
                let from = state.transform.to_device(start);
                let to = state.transform.to_device(end);
                self.draw_line(&mut out, from, to, style);
                start = end;
            }
        }
        if out.is_empty() {
            return Ok(());
        }
        surface.write_sink(&out).map_err(PlotError::from)
    }

    fn paint_point(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        let state = surface.state;
        let p = state.transform.to_device(state.position);
        let mut out = Vec::new();
        // a zero-length vector lights one dot
        self.beam = None;
        self.draw_line(&mut out, p, p, b'`');
        surface.write_sink(&out).map_err(PlotError::from)
    }
}
