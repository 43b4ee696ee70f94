//! Building and painting paths.
//!
//! Open segments (lines, arcs, Beziers) extend the simple path under
//! construction; closed shapes (boxes, circles, ellipses) each occupy a
//! simple path of their own. Each shape is stored in the most compact form
//! the backend accepts under the current transform, falling back to cubic
//! Beziers and then to polylines.

use glam::dvec2;

use super::Device;
use crate::backend::{Backend, Capability, ScalingPolicy};
use crate::errors::Result;
use crate::render::{Path, PathKind, Segment, geometry, merge_paths};
use crate::types::{Point, Transform};

/// True if an angle in degrees is a whole multiple of 90.
fn is_right_angle(degrees: f64) -> bool {
    degrees % 90.0 == 0.0
}

/// Primitive test for shapes that stay axis-aligned only when the
/// transform preserves axes and the shape itself is aligned.
fn allows_aligned(policy: ScalingPolicy, transform: &Transform, aligned: bool) -> bool {
    match policy {
        ScalingPolicy::Any => true,
        ScalingPolicy::AxesPreserved => transform.axes_preserved && aligned,
        ScalingPolicy::Uniform | ScalingPolicy::None => false,
    }
}

impl<B: Backend> Device<B> {
    // ------------------------------------------------------------------
    // Open segments
    // ------------------------------------------------------------------

    /// Get the simple path ready for a segment from `start` (or from the
    /// current position) and return the segment count before the append.
    fn begin_segment(&mut self, start: Option<Point>) -> Result<usize> {
        if self.top().path.as_ref().is_some_and(Path::is_closed_shape) {
            self.flush_path()?;
        }
        if let Some(start) = start {
            if start != self.top().position {
                if self.top().path.is_some() {
                    self.flush_path()?;
                }
                self.top_mut().position = start;
            }
        }
        let mixed = self.caps.have_mixed_paths;
        let state = self.top_mut();
        let position = state.position;
        let mut prev = state.path.as_ref().map_or(0, Path::len);
        let path = state.path.get_or_insert_with(|| Path::starting_at(position));
        // a lone curve can't share its path on such backends
        if !mixed && path.replace_lone_curve() && path.len() > 2 {
            prev = 0;
        }
        Ok(prev)
    }

    /// May the next segment be a curve primitive?
    fn curves_allowed(&self) -> bool {
        self.caps.have_mixed_paths || self.top().path.as_ref().is_some_and(|p| p.len() == 1)
    }

    /// Straight segments in the disconnected line mode, and degenerate curves.
    fn draws_as_line(&self, start: Point, end: Point) -> bool {
        !self.top().points_are_connected || start == end
    }

    fn push_segment(&mut self, segment: Segment) {
        if let Some(path) = self.top_mut().path.as_mut() {
            path.push(segment);
        }
    }

    fn edit_path(&mut self, f: impl FnOnce(&mut Path)) {
        if let Some(path) = self.top_mut().path.as_mut() {
            f(path);
        }
    }

    fn finish_segment(&mut self, end: Point, prev: usize) -> Result<()> {
        self.top_mut().position = end;
        {
            let (backend, mut surface) = self.parts();
            backend.maybe_prepaint_segments(&mut surface, prev)?;
        }
        let state = self.top();
        let long = state
            .path
            .as_ref()
            .is_some_and(|p| p.len() >= self.max_line_length);
        if long && state.fill_type == 0 && self.backend.path_is_flushable() {
            crate::log::trace!(limit = self.max_line_length, "flushing long path");
            self.flush_path()?;
        }
        Ok(())
    }

    pub(super) fn add_line(&mut self, start: Option<Point>, end: Point) -> Result<()> {
        let prev = self.begin_segment(start)?;
        self.push_segment(Segment::LineTo(end));
        self.finish_segment(end, prev)
    }

    fn add_arc(&mut self, center: Point, start: Point, end: Point) -> Result<()> {
        let prev = self.begin_segment(Some(start))?;
        if self.draws_as_line(start, end) {
            self.push_segment(Segment::LineTo(end));
        } else {
            let center = geometry::true_center(start, end, center);
            let allowed = self.curves_allowed();
            let caps = &self.caps;
            let primitive = allowed && caps.arc_scaling.allows(&self.top().transform);
            let cubics = allowed && caps.cubic_scaling == ScalingPolicy::Any;
            self.edit_path(|path| {
                if primitive {
                    path.push(Segment::Arc { center, end });
                } else if cubics {
                    path.add_arc_as_cubics(center, end);
                } else {
                    path.add_arc_as_lines(center, end);
                }
            });
        }
        self.finish_segment(end, prev)
    }

    fn add_ellarc(&mut self, center: Point, start: Point, end: Point) -> Result<()> {
        let prev = self.begin_segment(Some(start))?;
        let (u, v) = (start - center, end - center);
        let collinear = u.perp_dot(v) == 0.0;
        if self.draws_as_line(start, end) || collinear {
            self.push_segment(Segment::LineTo(end));
        } else {
            let aligned = (start.y == center.y && end.x == center.x)
                || (start.x == center.x && end.y == center.y);
            let allowed = self.curves_allowed();
            let caps = &self.caps;
            let primitive = allowed && allows_aligned(caps.ellarc_scaling, &self.top().transform, aligned);
            let cubic = allowed && caps.cubic_scaling == ScalingPolicy::Any;
            self.edit_path(|path| {
                if primitive {
                    path.push(Segment::EllArc { center, end });
                } else if cubic {
                    path.add_ellarc_as_cubic(center, end);
                } else {
                    path.add_ellarc_as_lines(center, end);
                }
            });
        }
        self.finish_segment(end, prev)
    }

    fn add_quad(&mut self, start: Point, control: Point, end: Point) -> Result<()> {
        let prev = self.begin_segment(Some(start))?;
        if self.draws_as_line(start, end) {
            self.push_segment(Segment::LineTo(end));
        } else {
            let allowed = self.curves_allowed();
            let caps = &self.caps;
            let primitive = allowed && caps.quad_scaling == ScalingPolicy::Any;
            let cubic = allowed && caps.cubic_scaling == ScalingPolicy::Any;
            self.edit_path(|path| {
                if primitive {
                    path.push(Segment::Quad { control, end });
                } else if cubic {
                    path.add_quad_as_cubic(control, end);
                } else {
                    path.add_quad_as_lines(control, end);
                }
            });
        }
        self.finish_segment(end, prev)
    }

    fn add_cubic(&mut self, start: Point, c1: Point, c2: Point, end: Point) -> Result<()> {
        let prev = self.begin_segment(Some(start))?;
        if self.draws_as_line(start, end) {
            self.push_segment(Segment::LineTo(end));
        } else {
            let primitive = self.curves_allowed() && self.caps.cubic_scaling == ScalingPolicy::Any;
            self.edit_path(|path| {
                if primitive {
                    path.push(Segment::Cubic { c1, c2, end });
                } else {
                    path.add_cubic_as_lines(c1, c2, end);
                }
            });
        }
        self.finish_segment(end, prev)
    }

    // ------------------------------------------------------------------
    // Closed shapes
    // ------------------------------------------------------------------

    /// Install a closed shape as the simple path under construction.
    fn place_closed_shape(&mut self, path: Option<Path>, center: Point) -> Result<()> {
        let decomposed = path.as_ref().is_some_and(|p| p.kind() == PathKind::SegmentList);
        self.top_mut().path = path;
        if decomposed {
            let (backend, mut surface) = self.parts();
            backend.maybe_prepaint_segments(&mut surface, 0)?;
        }
        self.top_mut().position = center;
        Ok(())
    }

    pub(super) fn add_box(&mut self, p0: Point, p1: Point) -> Result<()> {
        if self.top().path.is_some() {
            self.flush_path()?;
        }
        let state = self.top();
        let clockwise = state.orientation < 0;
        let edge_ok = state.pen_type == 0 || state.has_solid_edge();
        let path = if state.points_are_connected
            && edge_ok
            && self.caps.box_scaling.allows(&state.transform)
        {
            Path::rect(p0, p1, clockwise)
        } else {
            Path::box_as_lines(p0, p1, clockwise)
        };
        self.place_closed_shape(Some(path), 0.5 * (p0 + p1))
    }

    pub(super) fn add_circle(&mut self, center: Point, radius: f64) -> Result<()> {
        if self.top().path.is_some() {
            self.flush_path()?;
        }
        let state = self.top();
        if !state.points_are_connected {
            return self.place_closed_shape(None, center);
        }
        let clockwise = state.orientation < 0;
        let t = &state.transform;
        let caps = &self.caps;
        let path = if caps.circle_scaling.allows(t) && caps.circle_scaling != ScalingPolicy::AxesPreserved {
            Path::circle(center, radius, clockwise)
        } else if allows_aligned(caps.ellipse_scaling, t, true) {
            Path::ellipse(center, radius, radius, 0.0, clockwise)
        } else if allows_aligned(caps.ellarc_scaling, t, true) {
            Path::ellipse_as_ellarcs(center, radius, radius, 0.0, clockwise)
        } else if caps.cubic_scaling == ScalingPolicy::Any {
            Path::ellipse_as_cubics(center, radius, radius, 0.0, clockwise)
        } else {
            Path::ellipse_as_lines(center, radius, radius, 0.0, clockwise)
        };
        self.place_closed_shape(Some(path), center)
    }

    fn add_ellipse(&mut self, center: Point, rx: f64, ry: f64, angle: f64) -> Result<()> {
        if self.top().path.is_some() {
            self.flush_path()?;
        }
        let state = self.top();
        if !state.points_are_connected {
            return self.place_closed_shape(None, center);
        }
        let clockwise = state.orientation < 0;
        let aligned = is_right_angle(angle);
        let t = &state.transform;
        let caps = &self.caps;
        let path = if allows_aligned(caps.ellipse_scaling, t, aligned) {
            Path::ellipse(center, rx, ry, angle, clockwise)
        } else if allows_aligned(caps.ellarc_scaling, t, aligned) {
            Path::ellipse_as_ellarcs(center, rx, ry, angle, clockwise)
        } else if caps.cubic_scaling == ScalingPolicy::Any {
            Path::ellipse_as_cubics(center, rx, ry, angle, clockwise)
        } else {
            Path::ellipse_as_lines(center, rx, ry, angle, clockwise)
        };
        self.place_closed_shape(Some(path), center)
    }

    // ------------------------------------------------------------------
    // Painting
    // ------------------------------------------------------------------

    fn end_subpath_inner(&mut self) {
        let state = self.top_mut();
        if let Some(path) = state.path.take() {
            if path.len() >= 2 || path.kind() != PathKind::SegmentList {
                state.paths.push(path);
            }
        }
    }

    /// Paint the compound path, if any, and clear it.
    pub(super) fn flush_path(&mut self) -> Result<()> {
        if !self.top().has_pending_path() {
            return Ok(());
        }
        self.end_subpath_inner();
        let state = self.top_mut();
        if state.paths.is_empty() {
            return Ok(());
        }
        let paths = std::mem::take(&mut state.paths);
        if !state.points_are_connected {
            if state.pen_type == 0 {
                return Ok(());
            }
            return self.paint_junctures(&paths);
        }
        crate::log::trace!(count = paths.len(), "painting compound path");

        if let [path] = paths.as_slice() {
            let (backend, mut surface) = self.parts();
            return backend.paint_path(&mut surface, path);
        }
        let painted = {
            let (backend, mut surface) = self.parts();
            backend.paint_paths(&mut surface, &paths)?
        };
        if painted {
            return Ok(());
        }

        // fill the merged paths with the pen up, then edge them unfilled
        let (fill_type, pen_type) = (self.top().fill_type, self.top().pen_type);
        let mut result = Ok(());
        if fill_type != 0 && self.caps.have_solid_fill != Capability::Unsupported {
            self.top_mut().pen_type = 0;
            for path in merge_paths(&paths).into_iter().flatten() {
                let (backend, mut surface) = self.parts();
                result = result.and(backend.paint_path(&mut surface, &path));
            }
        }
        if pen_type != 0 {
            let state = self.top_mut();
            state.fill_type = 0;
            state.pen_type = pen_type;
            for path in &paths {
                let (backend, mut surface) = self.parts();
                result = result.and(backend.paint_path(&mut surface, path));
            }
        }
        let state = self.top_mut();
        state.fill_type = fill_type;
        state.pen_type = pen_type;
        result
    }

    /// In the disconnected line mode only the points where segments meet
    /// are drawn, as dots as wide as the line.
    fn paint_junctures(&mut self, paths: &[Path]) -> Result<()> {
        self.save_frame();
        let state = self.top_mut();
        state.fill_type = 1;
        state.fill_color_base = state.fg_color;
        state.fill_color = state.fg_color;
        state.pen_type = 0;
        state.points_are_connected = true;
        state.dash_array_in_effect = false;
        let radius = 0.5 * state.line_width;

        let mut result = Ok(());
        for path in paths {
            let points: Vec<Point> = path.segments().iter().map(Segment::end).collect();
            if points.len() < 2 {
                continue;
            }
            let closed = points.len() >= 3 && points.first() == points.last();
            let count = if closed { points.len() - 1 } else { points.len() };
            for p in &points[..count] {
                result = result.and(self.add_circle(*p, radius));
            }
        }
        result.and(self.restore_frame())
    }

    // ------------------------------------------------------------------
    // Public drawing API
    // ------------------------------------------------------------------

    /// Paint the pending compound path.
    pub fn end_path(&mut self) -> Result<()> {
        self.run("end_path", |d| d.flush_path())
    }

    /// Finish the simple path under construction; it is painted with the
    /// rest of the compound path.
    pub fn end_subpath(&mut self) -> Result<()> {
        self.run("end_subpath", |d| {
            d.end_subpath_inner();
            Ok(())
        })
    }

    /// Close the simple path under construction with a line back to its
    /// first point, and end it.
    pub fn close_path(&mut self) -> Result<()> {
        self.run("close_path", |d| {
            let Some(path) = d.top().path.as_ref() else {
                return Ok(());
            };
            if !path.is_closed_shape() && path.len() >= 2 {
                if let (Some(first), Some(last)) = (path.first_point(), path.current_point()) {
                    if first != last {
                        d.add_line(None, first)?;
                    }
                }
            }
            d.end_subpath_inner();
            Ok(())
        })
    }

    pub fn move_to(&mut self, x: f64, y: f64) -> Result<()> {
        self.run("move", |d| {
            d.flush_path()?;
            d.top_mut().position = dvec2(x, y);
            Ok(())
        })
    }

    pub fn move_rel(&mut self, dx: f64, dy: f64) -> Result<()> {
        let p = self.relative(dx, dy);
        self.move_to(p.x, p.y)
    }

    /// A line from (x0, y0) to (x1, y1). It continues the current path if
    /// it starts at the current position.
    pub fn line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> Result<()> {
        self.run("line", |d| d.add_line(Some(dvec2(x0, y0)), dvec2(x1, y1)))
    }

    pub fn line_rel(&mut self, dx0: f64, dy0: f64, dx1: f64, dy1: f64) -> Result<()> {
        let (p0, p1) = (self.relative(dx0, dy0), self.relative(dx1, dy1));
        self.line(p0.x, p0.y, p1.x, p1.y)
    }

    /// A line from the current position.
    pub fn cont(&mut self, x: f64, y: f64) -> Result<()> {
        self.run("cont", |d| d.add_line(None, dvec2(x, y)))
    }

    pub fn cont_rel(&mut self, dx: f64, dy: f64) -> Result<()> {
        let p = self.relative(dx, dy);
        self.cont(p.x, p.y)
    }

    /// A counterclockwise circular arc centered near (xc, yc) from (x0, y0)
    /// to (x1, y1). The center is moved onto the chord's perpendicular
    /// bisector if needed.
    pub fn arc(&mut self, xc: f64, yc: f64, x0: f64, y0: f64, x1: f64, y1: f64) -> Result<()> {
        self.run("arc", |d| d.add_arc(dvec2(xc, yc), dvec2(x0, y0), dvec2(x1, y1)))
    }

    pub fn arc_rel(&mut self, dxc: f64, dyc: f64, dx0: f64, dy0: f64, dx1: f64, dy1: f64) -> Result<()> {
        let (c, p0, p1) = (self.relative(dxc, dyc), self.relative(dx0, dy0), self.relative(dx1, dy1));
        self.arc(c.x, c.y, p0.x, p0.y, p1.x, p1.y)
    }

    /// A quarter ellipse centered at (xc, yc), whose conjugate semi-diameters
    /// end at (x0, y0) and (x1, y1).
    pub fn ellarc(&mut self, xc: f64, yc: f64, x0: f64, y0: f64, x1: f64, y1: f64) -> Result<()> {
        self.run("ellarc", |d| d.add_ellarc(dvec2(xc, yc), dvec2(x0, y0), dvec2(x1, y1)))
    }

    pub fn ellarc_rel(&mut self, dxc: f64, dyc: f64, dx0: f64, dy0: f64, dx1: f64, dy1: f64) -> Result<()> {
        let (c, p0, p1) = (self.relative(dxc, dyc), self.relative(dx0, dy0), self.relative(dx1, dy1));
        self.ellarc(c.x, c.y, p0.x, p0.y, p1.x, p1.y)
    }

    /// A quadratic Bezier from (x0, y0) to (x2, y2).
    pub fn bezier2(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<()> {
        self.run("bezier2", |d| d.add_quad(dvec2(x0, y0), dvec2(x1, y1), dvec2(x2, y2)))
    }

    pub fn bezier2_rel(&mut self, dx0: f64, dy0: f64, dx1: f64, dy1: f64, dx2: f64, dy2: f64) -> Result<()> {
        let (p0, p1, p2) = (self.relative(dx0, dy0), self.relative(dx1, dy1), self.relative(dx2, dy2));
        self.bezier2(p0.x, p0.y, p1.x, p1.y, p2.x, p2.y)
    }

    /// A cubic Bezier from (x0, y0) to (x3, y3).
    #[allow(clippy::too_many_arguments)]
    pub fn bezier3(
        &mut self,
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        x3: f64,
        y3: f64,
    ) -> Result<()> {
        self.run("bezier3", |d| {
            d.add_cubic(dvec2(x0, y0), dvec2(x1, y1), dvec2(x2, y2), dvec2(x3, y3))
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn bezier3_rel(
        &mut self,
        dx0: f64,
        dy0: f64,
        dx1: f64,
        dy1: f64,
        dx2: f64,
        dy2: f64,
        dx3: f64,
        dy3: f64,
    ) -> Result<()> {
        let p0 = self.relative(dx0, dy0);
        let p1 = self.relative(dx1, dy1);
        let p2 = self.relative(dx2, dy2);
        let p3 = self.relative(dx3, dy3);
        self.bezier3(p0.x, p0.y, p1.x, p1.y, p2.x, p2.y, p3.x, p3.y)
    }

    /// A box with opposite corners (x0, y0) and (x1, y1). Leaves the
    /// position at its center.
    pub fn rect(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> Result<()> {
        self.run("box", |d| d.add_box(dvec2(x0, y0), dvec2(x1, y1)))
    }

    pub fn rect_rel(&mut self, dx0: f64, dy0: f64, dx1: f64, dy1: f64) -> Result<()> {
        let (p0, p1) = (self.relative(dx0, dy0), self.relative(dx1, dy1));
        self.rect(p0.x, p0.y, p1.x, p1.y)
    }

    pub fn circle(&mut self, x: f64, y: f64, r: f64) -> Result<()> {
        self.run("circle", |d| d.add_circle(dvec2(x, y), r))
    }

    pub fn circle_rel(&mut self, dx: f64, dy: f64, r: f64) -> Result<()> {
        let c = self.relative(dx, dy);
        self.circle(c.x, c.y, r)
    }

    /// An ellipse with semi-axes `rx` and `ry`, the first turned `angle`
    /// degrees counterclockwise from the x axis.
    pub fn ellipse(&mut self, x: f64, y: f64, rx: f64, ry: f64, angle: f64) -> Result<()> {
        self.run("ellipse", |d| d.add_ellipse(dvec2(x, y), rx, ry, angle))
    }

    pub fn ellipse_rel(&mut self, dx: f64, dy: f64, rx: f64, ry: f64, angle: f64) -> Result<()> {
        let c = self.relative(dx, dy);
        self.ellipse(c.x, c.y, rx, ry, angle)
    }

    /// A single point in the pen color.
    pub fn point(&mut self, x: f64, y: f64) -> Result<()> {
        self.run("point", |d| d.add_point(dvec2(x, y)))
    }

    pub fn point_rel(&mut self, dx: f64, dy: f64) -> Result<()> {
        let p = self.relative(dx, dy);
        self.point(p.x, p.y)
    }

    pub(super) fn add_point(&mut self, p: Point) -> Result<()> {
        self.flush_path()?;
        self.top_mut().position = p;
        if self.top().pen_type == 0 {
            return Ok(());
        }
        let (backend, mut surface) = self.parts();
        backend.paint_point(&mut surface)
    }

    /// `position + (dx, dy)`; the origin while closed, where the call it
    /// feeds fails anyway.
    fn relative(&self, dx: f64, dy: f64) -> Point {
        let origin = if self.open { self.top().position } else { Point::ZERO };
        origin + dvec2(dx, dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Capabilities, Surface};
    use crate::params::DeviceParams;
    use crate::registry::DeviceRegistry;
    use crate::render::PathShape;

    /// Records every painted path.
    #[derive(Debug, Default)]
    struct Recorder {
        caps: Option<Capabilities>,
        painted: Vec<Path>,
        compound: Vec<usize>,
        prepaints: Vec<usize>,
    }

    impl Backend for Recorder {
        fn capabilities(&self) -> Capabilities {
            self.caps.clone().unwrap_or(Capabilities::GENERIC)
        }

        fn paint_path(&mut self, _surface: &mut Surface<'_>, path: &Path) -> Result<()> {
            self.painted.push(path.clone());
            Ok(())
        }

        fn paint_paths(&mut self, _surface: &mut Surface<'_>, paths: &[Path]) -> Result<bool> {
            self.compound.push(paths.len());
            Ok(false)
        }

        fn maybe_prepaint_segments(&mut self, _surface: &mut Surface<'_>, prev: usize) -> Result<()> {
            self.prepaints.push(prev);
            Ok(())
        }
    }

    fn open_with(caps: Option<Capabilities>) -> Device<Recorder> {
        let params = DeviceParams::new().resolve_with(|_| None);
        let backend = Recorder {
            caps,
            ..Recorder::default()
        };
        let mut d = Device::with_registry(backend, params, DeviceRegistry::new()).unwrap();
        d.open().unwrap();
        d
    }

    fn primitive_caps() -> Capabilities {
        Capabilities {
            have_mixed_paths: true,
            arc_scaling: ScalingPolicy::Any,
            box_scaling: ScalingPolicy::Any,
            circle_scaling: ScalingPolicy::Any,
            ..Capabilities::GENERIC
        }
    }

    #[test]
    fn contiguous_lines_share_a_path() {
        let mut d = open_with(None);
        d.line(0.0, 0.0, 1.0, 0.0).unwrap();
        d.cont(1.0, 1.0).unwrap();
        d.line(1.0, 1.0, 0.0, 1.0).unwrap();
        assert_eq!(d.state().unwrap().path.as_ref().map(Path::len), Some(4));
        assert_eq!(d.state().unwrap().position, dvec2(0.0, 1.0));
        assert_eq!(d.backend().prepaints, vec![0, 2, 3]);
        d.end_path().unwrap();
        assert_eq!(d.backend().painted.len(), 1);
        assert!(d.state().unwrap().path.is_none());
    }

    #[test]
    fn a_jump_starts_a_new_path() {
        let mut d = open_with(None);
        d.line(0.0, 0.0, 1.0, 0.0).unwrap();
        d.line(5.0, 5.0, 6.0, 5.0).unwrap();
        assert_eq!(d.backend().painted.len(), 1);
        d.move_to(9.0, 9.0).unwrap();
        assert_eq!(d.backend().painted.len(), 2);
        assert_eq!(d.state().unwrap().position, dvec2(9.0, 9.0));
    }

    #[test]
    fn solid_box_is_a_primitive() {
        let mut d = open_with(Some(primitive_caps()));
        d.rect(0.0, 0.0, 2.0, 1.0).unwrap();
        assert_eq!(d.state().unwrap().position, dvec2(1.0, 0.5));
        d.end_path().unwrap();
        assert_eq!(d.backend().painted[0].kind(), PathKind::Box);
    }

    #[test]
    fn dashed_box_is_decomposed() {
        let mut d = open_with(Some(primitive_caps()));
        d.line_mod("dotted").unwrap();
        d.rect(0.0, 0.0, 2.0, 1.0).unwrap();
        d.end_path().unwrap();
        let path = &d.backend().painted[0];
        assert_eq!(path.kind(), PathKind::SegmentList);
        assert!(path.primitive);
        assert_eq!(path.len(), 5);
    }

    #[test]
    fn segments_after_a_closed_shape_flush_it() {
        let mut d = open_with(Some(primitive_caps()));
        d.circle(0.0, 0.0, 1.0).unwrap();
        d.cont(2.0, 0.0).unwrap();
        assert_eq!(d.backend().painted.len(), 1);
        assert!(matches!(d.backend().painted[0].shape, PathShape::Circle { .. }));
    }

    #[test]
    fn generic_circle_becomes_a_polygon() {
        let mut d = open_with(None);
        d.circle(0.0, 0.0, 1.0).unwrap();
        d.end_path().unwrap();
        let path = &d.backend().painted[0];
        assert_eq!(path.kind(), PathKind::SegmentList);
        assert!(path.segments()[1..].iter().all(|s| matches!(s, Segment::LineTo(_))));
        assert_eq!(d.backend().prepaints, vec![0]);
    }

    #[test]
    fn arcs_are_flattened_without_mixed_paths() {
        let mut d = open_with(Some(Capabilities {
            arc_scaling: ScalingPolicy::Any,
            ..Capabilities::GENERIC
        }));
        d.arc(0.0, 0.0, 1.0, 0.0, 0.0, 1.0).unwrap();
        assert_eq!(d.state().unwrap().path.as_ref().map(Path::len), Some(2));
        d.cont(-1.0, 1.0).unwrap();
        let path = d.state().unwrap().path.clone().unwrap();
        assert!(path.segments().iter().all(|s| !s.is_curve()));
        assert!(path.len() > 3);
        assert_eq!(d.backend().prepaints.last(), Some(&0));
    }

    #[test]
    fn mixed_paths_keep_arcs() {
        let mut d = open_with(Some(primitive_caps()));
        d.line(1.0, -1.0, 1.0, 0.0).unwrap();
        d.arc(0.0, 0.0, 1.0, 0.0, 0.0, 1.0).unwrap();
        let path = d.state().unwrap().path.clone().unwrap();
        assert!(matches!(path.segments()[2], Segment::Arc { .. }));
    }

    #[test]
    fn degenerate_arc_is_a_line() {
        let mut d = open_with(Some(primitive_caps()));
        d.arc(0.0, 0.0, 1.0, 0.0, 1.0, 0.0).unwrap();
        let path = d.state().unwrap().path.clone().unwrap();
        assert_eq!(path.segments()[1], Segment::LineTo(dvec2(1.0, 0.0)));
    }

    #[test]
    fn subpaths_form_a_compound_path() {
        let mut d = open_with(None);
        d.fill_type(1).unwrap();
        d.rect(0.0, 0.0, 10.0, 10.0).unwrap();
        d.end_subpath().unwrap();
        d.rect(4.0, 4.0, 6.0, 6.0).unwrap();
        d.end_path().unwrap();
        assert_eq!(d.backend().compound, vec![2]);
        // one merged fill, then both outlines
        assert_eq!(d.backend().painted.len(), 3);
        assert_eq!(d.state().unwrap().fill_type, 1);
        assert_eq!(d.state().unwrap().pen_type, 1);
    }

    #[test]
    fn close_path_returns_to_the_start() {
        let mut d = open_with(None);
        d.line(0.0, 0.0, 1.0, 0.0).unwrap();
        d.cont(1.0, 1.0).unwrap();
        d.close_path().unwrap();
        assert!(d.state().unwrap().path.is_none());
        d.end_path().unwrap();
        let path = &d.backend().painted[0];
        assert_eq!(path.first_point(), path.current_point());
    }

    #[test]
    fn disconnected_lines_draw_dots() {
        let mut d = open_with(None);
        d.line_mod("disconnected").unwrap();
        d.line_width(0.5).unwrap();
        d.line(0.0, 0.0, 1.0, 0.0).unwrap();
        d.cont(2.0, 0.0).unwrap();
        d.end_path().unwrap();
        // three junctures, each a filled circle
        assert_eq!(d.backend().painted.len(), 3);
        assert_eq!(d.depth(), 1);
        assert!(!d.state().unwrap().points_are_connected);
    }

    #[test]
    fn long_paths_are_flushed() {
        let params = {
            let mut p = DeviceParams::new();
            p.set("MAX_LINE_LENGTH", "4");
            p.resolve_with(|_| None)
        };
        let mut d = Device::with_registry(Recorder::default(), params, DeviceRegistry::new()).unwrap();
        d.open().unwrap();
        d.move_to(0.0, 0.0).unwrap();
        for i in 1..=3 {
            d.cont(f64::from(i), 0.0).unwrap();
        }
        assert_eq!(d.backend().painted.len(), 1);
        assert!(d.state().unwrap().path.is_none());
    }

    #[test]
    fn points_flush_and_move() {
        let mut d = open_with(None);
        d.line(0.0, 0.0, 1.0, 1.0).unwrap();
        d.point(3.0, 3.0).unwrap();
        assert_eq!(d.backend().painted.len(), 1);
        assert_eq!(d.state().unwrap().position, dvec2(3.0, 3.0));
    }

    #[test]
    fn relative_calls_offset_from_the_position() {
        let mut d = open_with(None);
        d.move_to(1.0, 1.0).unwrap();
        d.cont_rel(1.0, 0.0).unwrap();
        d.rect_rel(0.0, 0.0, 2.0, 2.0).unwrap();
        assert_eq!(d.state().unwrap().position, dvec2(3.0, 2.0));
    }
}
