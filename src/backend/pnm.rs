//! Portable pixmap output.
//!
//! Paths are scan-converted onto a canvas as they are painted; the page is
//! encoded at `end_page`, binary (`P6`) unless `PNM_PORTABLE` asks for the
//! plain `P3` form. Like other single-page formats only the first page is
//! written.

use glam::DAffine2;

use super::{Backend, Capabilities, DeviceCoords, Surface, raster_ndc_map};
use crate::errors::{PlotError, Result};
use crate::page::OutputModel;
use crate::params::ResolvedParams;
use crate::render::raster::Canvas;
use crate::render::{CapType, ClipRect, DrawingState, JoinType, Path, clip_line};
use crate::types::{Color, Point};

#[derive(Debug, Clone)]
pub struct PnmBackend {
    width: u32,
    height: u32,
    rotation: u32,
    portable: bool,
    canvas: Option<Canvas>,
}

impl Default for PnmBackend {
    fn default() -> Self {
        Self::from_params(&ResolvedParams::default())
    }
}

impl PnmBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_params(params: &ResolvedParams) -> Self {
        let (width, height) = params.bitmap_size();
        PnmBackend {
            width,
            height,
            rotation: params.rotation(),
            portable: params.flag("PNM_PORTABLE"),
            canvas: None,
        }
    }

    fn canvas(&mut self, background: Color) -> &mut Canvas {
        let (width, height) = (self.width, self.height);
        self.canvas
            .get_or_insert_with(|| Canvas::new(width, height, background))
    }
}

/// Largest canvas, in pixels, the backend agrees to allocate.
const MAX_PIXELS: u64 = 1 << 26;

/// Dash patterns repeating faster than this many pixels are drawn solid.
const MIN_DASH_PERIOD: f64 = 1.0;

/// Split a polyline into its dashes. `dashes` alternates on and off
/// lengths; `offset` is how far into the pattern the line starts.
fn dash_polyline(points: &[Point], dashes: &[f64], offset: f64) -> Vec<Vec<Point>> {
    let period: f64 = dashes.iter().sum();
    if dashes.is_empty() || period < MIN_DASH_PERIOD {
        return vec![points.to_vec()];
    }
    let mut index = 0;
    let mut left = dashes[0];
    let mut skip = offset.rem_euclid(period);
    while skip > 0.0 {
        if skip < left {
            left -= skip;
            break;
        }
        skip -= left;
        index = (index + 1) % dashes.len();
        left = dashes[index];
    }

    let mut pieces = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    if index % 2 == 0 {
        if let Some(first) = points.first() {
            current.push(*first);
        }
    }
    for pair in points.windows(2) {
        let (mut a, b) = (pair[0], pair[1]);
        let mut remaining = a.distance(b);
        while remaining > 0.0 {
            let on = index % 2 == 0;
            let step = left.min(remaining);
            let next = if step >= remaining {
                b
            } else {
                a + (b - a) / remaining * step
            };
            if on {
                current.push(next);
            }
            remaining -= step;
            left -= step;
            a = next;
            if left <= 0.0 {
                if on && current.len() > 1 {
                    pieces.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
                index = (index + 1) % dashes.len();
                left = dashes[index];
                if index % 2 == 0 {
                    current.push(a);
                }
            }
        }
    }
    if current.len() > 1 {
        pieces.push(current);
    }
    pieces
}

/// The parts of a polyline inside `rect`, each with the distance along the
/// whole polyline at which it starts.
fn visible_runs(points: &[Point], rect: &ClipRect) -> Vec<(f64, Vec<Point>)> {
    if let [only] = points {
        return if rect.contains(*only) {
            vec![(0.0, vec![*only])]
        } else {
            Vec::new()
        };
    }
    let mut runs = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    let mut run_start = 0.0;
    let mut travelled = 0.0;
    let finish = |current: &mut Vec<Point>, runs: &mut Vec<(f64, Vec<Point>)>, start: f64| {
        if current.len() > 1 {
            runs.push((start, std::mem::take(current)));
        } else {
            current.clear();
        }
    };
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (outcome, from, to) = clip_line(a, b, rect);
        if !outcome.accepted {
            finish(&mut current, &mut runs, run_start);
        } else {
            if current.is_empty() || outcome.first_moved {
                finish(&mut current, &mut runs, run_start);
                run_start = travelled + a.distance(from);
                current.push(from);
            }
            current.push(to);
            if outcome.second_moved {
                finish(&mut current, &mut runs, run_start);
            }
        }
        travelled += a.distance(b);
    }
    finish(&mut current, &mut runs, run_start);
    runs
}

fn device_polyline(state: &DrawingState, path: &Path) -> Vec<Point> {
    path.polyline()
        .into_iter()
        .map(|p| state.transform.to_device(p))
        .collect()
}

/// Stroke only what can reach the canvas; the dash phase of each visible
/// run accounts for the length clipped away before it.
fn stroke(canvas: &mut Canvas, state: &DrawingState, points: &[Point]) {
    let round = state.cap_type == CapType::Round || state.join_type == JoinType::Round;
    let width = state.quantized_device_line_width;
    let margin = f64::from(width.max(1));
    let bounds = ClipRect::new(
        -margin,
        -margin,
        f64::from(canvas.width()) - 1.0 + margin,
        f64::from(canvas.height()) - 1.0 + margin,
    );
    let (dashes, offset) = state.effective_dash();
    let scale = state.transform.min_device_scale();
    let dashes: Vec<f64> = dashes.iter().map(|d| d * scale).collect();
    for (start, run) in visible_runs(points, &bounds) {
        for piece in dash_polyline(&run, &dashes, offset * scale + start) {
            canvas.stroke_polyline(&piece, width, round, state.fg_color);
        }
    }
}

impl Backend for PnmBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            type_name: "pnm",
            output_model: OutputModel::OnePage,
            flipped_y: true,
            device_coords: DeviceCoords::IntegerRaster,
            ..Capabilities::GENERIC
        }
    }

    fn ndc_to_device(&self) -> DAffine2 {
        raster_ndc_map(
            f64::from(self.width),
            f64::from(self.height),
            self.rotation,
            true,
        )
    }

    fn initialize(&mut self, params: &ResolvedParams) -> Result<()> {
        let backend = Self::from_params(params);
        if u64::from(backend.width) * u64::from(backend.height) > MAX_PIXELS {
            crate::log::warn!(
                width = backend.width,
                height = backend.height,
                "pixmap too large to allocate"
            );
            return Err(PlotError::BackendFailure { hook: "initialize" });
        }
        *self = backend;
        Ok(())
    }

    fn begin_page(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        self.canvas = Some(Canvas::new(
            self.width,
            self.height,
            surface.state.bg_color,
        ));
        Ok(())
    }

    fn erase_page(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        self.canvas(surface.state.bg_color)
            .fill(surface.state.bg_color);
        Ok(())
    }

    fn end_page(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        let Some(canvas) = self.canvas.take() else {
            return Ok(());
        };
        if let Some(page) = surface.page.as_deref_mut() {
            page.replace(canvas.encode_pnm(self.portable));
        }
        Ok(())
    }

    fn paint_path(&mut self, surface: &mut Surface<'_>, path: &Path) -> Result<()> {
        let state = surface.state;
        let points = device_polyline(state, path);
        let canvas = self.canvas(state.bg_color);
        if state.fill_type != 0 {
            canvas.fill_polygon(std::slice::from_ref(&points), state.fill_rule, state.fill_color);
        }
        if state.pen_type != 0 {
            stroke(canvas, state, &points);
        }
        surface.expand_bbox(path);
        Ok(())
    }

    /// Subpaths are filled together, so holes come out right.
    fn paint_paths(&mut self, surface: &mut Surface<'_>, paths: &[Path]) -> Result<bool> {
        let state = surface.state;
        let rings: Vec<Vec<Point>> = paths.iter().map(|p| device_polyline(state, p)).collect();
        let canvas = self.canvas(state.bg_color);
        if state.fill_type != 0 {
            canvas.fill_polygon(&rings, state.fill_rule, state.fill_color);
        }
        if state.pen_type != 0 {
            for ring in &rings {
                stroke(canvas, state, ring);
            }
        }
        for path in paths {
            surface.expand_bbox(path);
        }
        Ok(true)
    }

    fn paint_point(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        let state = surface.state;
        let p = state.transform.to_device(state.position);
        self.canvas(state.bg_color)
            .set(p.x.round() as i64, p.y.round() as i64, state.fg_color);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::dvec2;

    #[test]
    fn solid_pattern_keeps_the_line() {
        let line = [dvec2(0.0, 0.0), dvec2(10.0, 0.0)];
        assert_eq!(dash_polyline(&line, &[], 0.0), vec![line.to_vec()]);
    }

    #[test]
    fn dashes_alternate_along_the_line() {
        let line = [dvec2(0.0, 0.0), dvec2(10.0, 0.0)];
        let pieces = dash_polyline(&line, &[2.0, 3.0], 0.0);
        assert_eq!(
            pieces,
            vec![
                vec![dvec2(0.0, 0.0), dvec2(2.0, 0.0)],
                vec![dvec2(5.0, 0.0), dvec2(7.0, 0.0)],
            ]
        );
    }

    #[test]
    fn dash_offset_starts_inside_the_pattern() {
        let line = [dvec2(0.0, 0.0), dvec2(6.0, 0.0)];
        let pieces = dash_polyline(&line, &[2.0, 3.0], 3.0);
        // 3 units in: the gap has 2 units left, then a full dash
        assert_eq!(pieces, vec![vec![dvec2(2.0, 0.0), dvec2(4.0, 0.0)]]);
    }

    #[test]
    fn patterns_finer_than_a_pixel_draw_solid() {
        let line = [dvec2(0.0, 0.0), dvec2(1.0e6, 0.0)];
        assert_eq!(dash_polyline(&line, &[1e-9, 1e-9], 0.0), vec![line.to_vec()]);
    }

    #[test]
    fn runs_are_clipped_with_their_distance_along_the_line() {
        let rect = ClipRect::new(0.0, 0.0, 9.0, 9.0);
        let line = [dvec2(-10.0, 5.0), dvec2(20.0, 5.0), dvec2(20.0, 50.0)];
        assert_eq!(
            visible_runs(&line, &rect),
            vec![(10.0, vec![dvec2(0.0, 5.0), dvec2(9.0, 5.0)])]
        );
    }

    #[test]
    fn runs_rejoin_when_the_line_comes_back() {
        let rect = ClipRect::new(0.0, 0.0, 9.0, 9.0);
        let line = [dvec2(5.0, 5.0), dvec2(5.0, 20.0), dvec2(6.0, 5.0), dvec2(7.0, 5.0)];
        let runs = visible_runs(&line, &rect);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], (0.0, vec![dvec2(5.0, 5.0), dvec2(5.0, 9.0)]));
        assert_eq!(runs[1].1.last(), Some(&dvec2(7.0, 5.0)));
        assert!(runs[1].0 > 15.0);
    }

    #[test]
    fn lone_points_outside_are_dropped() {
        let rect = ClipRect::new(0.0, 0.0, 9.0, 9.0);
        assert!(visible_runs(&[dvec2(50.0, 50.0)], &rect).is_empty());
        assert_eq!(visible_runs(&[dvec2(1.0, 1.0)], &rect).len(), 1);
    }

    #[test]
    fn dashes_turn_corners() {
        let line = [dvec2(0.0, 0.0), dvec2(1.0, 0.0), dvec2(1.0, 1.0)];
        let pieces = dash_polyline(&line, &[3.0, 1.0], 0.0);
        assert_eq!(pieces, vec![line.to_vec()]);
    }
}
