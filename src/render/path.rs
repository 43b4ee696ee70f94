//! Simple paths and the ways shapes are added to them.
//!
//! A simple path is either a list of segments that starts with a move, or a
//! single closed primitive (box, circle, ellipse) that a backend can paint
//! directly. Closed shapes can also be stored in decomposed form; such a
//! segment list is flagged `primitive` so that later segments never extend
//! it.

use super::geometry;
use crate::types::{BBox, Point};

/// One element of a segment list. Every segment starts where the previous
/// one ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    MoveTo(Point),
    LineTo(Point),
    /// Circular arc; the center lies on the perpendicular bisector of the chord
    Arc { center: Point, end: Point },
    /// Quarter ellipse whose conjugate semi-diameters point at start and end
    EllArc { center: Point, end: Point },
    Quad { control: Point, end: Point },
    Cubic { c1: Point, c2: Point, end: Point },
}

impl Segment {
    pub fn end(&self) -> Point {
        match *self {
            Segment::MoveTo(p) | Segment::LineTo(p) => p,
            Segment::Arc { end, .. }
            | Segment::EllArc { end, .. }
            | Segment::Quad { end, .. }
            | Segment::Cubic { end, .. } => end,
        }
    }

    /// Curved segments are the ones a backend without mixed paths cannot
    /// combine with anything else.
    pub fn is_curve(&self) -> bool {
        !matches!(self, Segment::MoveTo(_) | Segment::LineTo(_))
    }
}

/// Representation of a simple path
#[derive(Debug, Clone, PartialEq)]
pub enum PathShape {
    Segments(Vec<Segment>),
    Box { p0: Point, p1: Point },
    Circle { center: Point, radius: f64 },
    Ellipse { center: Point, rx: f64, ry: f64, angle: f64 },
}

/// Coarse tag for a path's representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    SegmentList,
    Box,
    Circle,
    Ellipse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub shape: PathShape,
    /// Direction in which a closed shape is traversed
    pub clockwise: bool,
    /// A segment list produced by decomposing a closed shape
    pub primitive: bool,
}

impl Default for Path {
    fn default() -> Self {
        Self::new()
    }
}

impl Path {
    /// An empty segment list.
    pub fn new() -> Self {
        Path {
            shape: PathShape::Segments(Vec::new()),
            clockwise: false,
            primitive: false,
        }
    }

    /// A segment list whose first segment is a move to `p`.
    pub fn starting_at(p: Point) -> Self {
        let mut path = Path::new();
        path.push(Segment::MoveTo(p));
        path
    }

    fn closed_shape(shape: PathShape, clockwise: bool) -> Self {
        Path {
            shape,
            clockwise,
            primitive: false,
        }
    }

    pub fn rect(p0: Point, p1: Point, clockwise: bool) -> Self {
        Self::closed_shape(PathShape::Box { p0, p1 }, clockwise)
    }

    pub fn circle(center: Point, radius: f64, clockwise: bool) -> Self {
        Self::closed_shape(PathShape::Circle { center, radius }, clockwise)
    }

    pub fn ellipse(center: Point, rx: f64, ry: f64, angle: f64, clockwise: bool) -> Self {
        Self::closed_shape(PathShape::Ellipse { center, rx, ry, angle }, clockwise)
    }

    pub fn kind(&self) -> PathKind {
        match self.shape {
            PathShape::Segments(_) => PathKind::SegmentList,
            PathShape::Box { .. } => PathKind::Box,
            PathShape::Circle { .. } => PathKind::Circle,
            PathShape::Ellipse { .. } => PathKind::Ellipse,
        }
    }

    /// True once the path holds a closed shape, in either form.
    pub fn is_closed_shape(&self) -> bool {
        self.kind() != PathKind::SegmentList || self.primitive
    }

    pub fn segments(&self) -> &[Segment] {
        match &self.shape {
            PathShape::Segments(segments) => segments,
            _ => &[],
        }
    }

    /// Number of stored segments, counting the initial move.
    pub fn len(&self) -> usize {
        self.segments().len()
    }

    pub fn is_empty(&self) -> bool {
        self.kind() == PathKind::SegmentList && self.segments().is_empty()
    }

    pub fn current_point(&self) -> Option<Point> {
        self.segments().last().map(Segment::end)
    }

    pub fn first_point(&self) -> Option<Point> {
        self.segments().first().map(Segment::end)
    }

    /// Append a segment. Ignored on a closed primitive.
    pub fn push(&mut self, segment: Segment) {
        if let PathShape::Segments(segments) = &mut self.shape {
            segments.push(segment);
        }
    }

    pub fn truncate(&mut self, len: usize) {
        if let PathShape::Segments(segments) = &mut self.shape {
            segments.truncate(len);
        }
    }

    // ------------------------------------------------------------------
    // Decomposed curves. Each assumes the path already has a current point.
    // ------------------------------------------------------------------

    pub fn add_arc_as_lines(&mut self, center: Point, end: Point) {
        let Some(start) = self.current_point() else {
            return;
        };
        for p in geometry::arc_polyline(start, end, center) {
            self.push(Segment::LineTo(p));
        }
    }

    pub fn add_arc_as_cubics(&mut self, center: Point, end: Point) {
        let Some(start) = self.current_point() else {
            return;
        };
        for (c1, c2, end) in geometry::arc_as_cubics(start, end, center) {
            self.push(Segment::Cubic { c1, c2, end });
        }
    }

    pub fn add_ellarc_as_lines(&mut self, center: Point, end: Point) {
        let Some(start) = self.current_point() else {
            return;
        };
        for p in geometry::ellarc_polyline(start, end, center) {
            self.push(Segment::LineTo(p));
        }
    }

    pub fn add_ellarc_as_cubic(&mut self, center: Point, end: Point) {
        let Some(start) = self.current_point() else {
            return;
        };
        let (c1, c2) = geometry::ellarc_as_cubic(start, end, center);
        self.push(Segment::Cubic { c1, c2, end });
    }

    pub fn add_quad_as_cubic(&mut self, control: Point, end: Point) {
        let Some(start) = self.current_point() else {
            return;
        };
        let (c1, c2) = geometry::quad_as_cubic(start, control, end);
        self.push(Segment::Cubic { c1, c2, end });
    }

    pub fn add_quad_as_lines(&mut self, control: Point, end: Point) {
        let Some(start) = self.current_point() else {
            return;
        };
        for p in geometry::flatten_quad(start, control, end) {
            self.push(Segment::LineTo(p));
        }
    }

    pub fn add_cubic_as_lines(&mut self, c1: Point, c2: Point, end: Point) {
        let Some(start) = self.current_point() else {
            return;
        };
        for p in geometry::flatten_cubic(start, c1, c2, end) {
            self.push(Segment::LineTo(p));
        }
    }

    /// Replace a path holding nothing but one curve by its polygonal
    /// approximation. Returns true if a replacement happened.
    pub fn replace_lone_curve(&mut self) -> bool {
        if self.len() != 2 {
            return false;
        }
        let curve = self.segments()[1];
        if !curve.is_curve() {
            return false;
        }
        self.truncate(1);
        match curve {
            Segment::Arc { center, end } => self.add_arc_as_lines(center, end),
            Segment::EllArc { center, end } => self.add_ellarc_as_lines(center, end),
            Segment::Quad { control, end } => self.add_quad_as_lines(control, end),
            Segment::Cubic { c1, c2, end } => self.add_cubic_as_lines(c1, c2, end),
            Segment::MoveTo(_) | Segment::LineTo(_) => {}
        }
        true
    }

    // ------------------------------------------------------------------
    // Decomposed closed shapes
    // ------------------------------------------------------------------

    pub fn box_as_lines(p0: Point, p1: Point, clockwise: bool) -> Self {
        let corners = geometry::box_corners(p0, p1, clockwise);
        let mut path = Path::starting_at(corners[0]);
        for p in &corners[1..] {
            path.push(Segment::LineTo(*p));
        }
        path.mark_decomposed(clockwise)
    }

    pub fn ellipse_as_ellarcs(center: Point, rx: f64, ry: f64, angle: f64, clockwise: bool) -> Self {
        let q = geometry::ellipse_quadrant_points(center, rx, ry, angle, clockwise);
        let mut path = Path::starting_at(q[0]);
        for end in &q[1..] {
            path.push(Segment::EllArc { center, end: *end });
        }
        path.mark_decomposed(clockwise)
    }

    pub fn ellipse_as_cubics(center: Point, rx: f64, ry: f64, angle: f64, clockwise: bool) -> Self {
        let q = geometry::ellipse_quadrant_points(center, rx, ry, angle, clockwise);
        let mut path = Path::starting_at(q[0]);
        for end in &q[1..] {
            path.add_ellarc_as_cubic(center, *end);
        }
        path.mark_decomposed(clockwise)
    }

    pub fn ellipse_as_lines(center: Point, rx: f64, ry: f64, angle: f64, clockwise: bool) -> Self {
        let q = geometry::ellipse_quadrant_points(center, rx, ry, angle, clockwise);
        let mut path = Path::starting_at(q[0]);
        for end in &q[1..] {
            path.add_ellarc_as_lines(center, *end);
        }
        path.mark_decomposed(clockwise)
    }

    fn mark_decomposed(mut self, clockwise: bool) -> Self {
        self.primitive = true;
        self.clockwise = clockwise;
        self
    }

    /// The same outline as a segment list; segment lists are returned as is.
    pub fn to_segment_list(&self) -> Path {
        match self.shape {
            PathShape::Segments(_) => self.clone(),
            PathShape::Box { p0, p1 } => Path::box_as_lines(p0, p1, self.clockwise),
            PathShape::Circle { center, radius } => {
                Path::ellipse_as_lines(center, radius, radius, 0.0, self.clockwise)
            }
            PathShape::Ellipse { center, rx, ry, angle } => {
                Path::ellipse_as_lines(center, rx, ry, angle, self.clockwise)
            }
        }
    }

    /// Vertices of a polyline following the path, curves flattened.
    pub fn polyline(&self) -> Vec<Point> {
        let list = self.to_segment_list();
        let mut points: Vec<Point> = Vec::with_capacity(list.len());
        for segment in list.segments() {
            let start = points.last().copied();
            match (*segment, start) {
                (Segment::MoveTo(p), _) | (Segment::LineTo(p), _) => points.push(p),
                (_, None) => points.push(segment.end()),
                (Segment::Arc { center, end }, Some(s)) => {
                    points.extend(geometry::arc_polyline(s, end, center))
                }
                (Segment::EllArc { center, end }, Some(s)) => {
                    points.extend(geometry::ellarc_polyline(s, end, center))
                }
                (Segment::Quad { control, end }, Some(s)) => {
                    points.extend(geometry::flatten_quad(s, control, end))
                }
                (Segment::Cubic { c1, c2, end }, Some(s)) => {
                    points.extend(geometry::flatten_cubic(s, c1, c2, end))
                }
            }
        }
        points
    }

    /// Bounding box of the flattened path.
    pub fn bbox(&self) -> BBox {
        let mut bbox = BBox::new();
        for p in self.polyline() {
            bbox.expand_point(p);
        }
        bbox
    }
}

/// Merge simple paths that lie inside other simple paths into their
/// containers, so that a filler without compound-path support still
/// leaves holes. Each child is spliced into its container along a doubled
/// bridge between their closest vertices.
///
/// The result has one entry per input: the merged container, the
/// untouched path, or `None` for a path that was absorbed.
pub fn merge_paths(paths: &[Path]) -> Vec<Option<Path>> {
    let boxes: Vec<BBox> = paths.iter().map(Path::bbox).collect();
    let boxes = &boxes;
    let contained_in = |i: usize| {
        (0..paths.len()).filter(move |&j| j != i && boxes[j].contains(&boxes[i]) && boxes[j] != boxes[i])
    };
    let top_level: Vec<bool> = (0..paths.len())
        .map(|i| contained_in(i).next().is_none())
        .collect();

    // parent of each path, chosen as the smallest top-level container
    let parents: Vec<Option<usize>> = (0..paths.len())
        .map(|i| {
            contained_in(i).filter(|&j| top_level[j]).min_by(|&a, &b| {
                let area = |k: usize| boxes[k].width() * boxes[k].height();
                area(a).total_cmp(&area(b))
            })
        })
        .collect();

    let mut merged: Vec<Option<Path>> = paths.iter().cloned().map(Some).collect();
    for (child, parent) in parents.iter().enumerate() {
        let Some(parent) = *parent else { continue };
        let child_path = paths[child].to_segment_list();
        if let Some(container) = merged[parent].take() {
            merged[parent] = Some(splice(&container.to_segment_list(), &child_path));
        }
        merged[child] = None;
    }
    merged
}

fn splice(parent: &Path, child: &Path) -> Path {
    let outer = parent.segments();
    let mut inner: Vec<Segment> = child.segments().to_vec();
    let (Some(first), Some(last)) = (inner.first().map(Segment::end), inner.last().map(Segment::end)) else {
        return parent.clone();
    };
    if first != last {
        inner.push(Segment::LineTo(first));
    }
    // vertices of the closed child, excluding the repeated start
    let inner_vertices: Vec<Point> = inner[..inner.len() - 1].iter().map(Segment::end).collect();

    let mut best = (0usize, 0usize, f64::INFINITY);
    for (k, seg) in outer.iter().enumerate() {
        for (l, q) in inner_vertices.iter().enumerate() {
            let d = seg.end().distance_squared(*q);
            if d < best.2 {
                best = (k, l, d);
            }
        }
    }
    let (k, l, _) = best;
    let bridge_from = outer[k].end();
    let bridge_to = inner_vertices[l];

    let mut segments: Vec<Segment> = outer[..=k].to_vec();
    segments.push(Segment::LineTo(bridge_to));
    segments.extend_from_slice(&inner[l + 1..]);
    segments.extend_from_slice(&inner[1..=l]);
    segments.push(Segment::LineTo(bridge_from));
    segments.extend_from_slice(&outer[k + 1..]);

    Path {
        shape: PathShape::Segments(segments),
        clockwise: parent.clockwise,
        primitive: parent.primitive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::dvec2;

    #[test]
    fn box_as_lines_is_closed_and_flagged() {
        let path = Path::box_as_lines(dvec2(0.0, 0.0), dvec2(2.0, 1.0), false);
        assert_eq!(path.kind(), PathKind::SegmentList);
        assert!(path.primitive);
        assert!(path.is_closed_shape());
        let lines = path
            .segments()
            .iter()
            .filter(|s| matches!(s, Segment::LineTo(_)))
            .count();
        assert_eq!(lines, 4);
        assert_eq!(path.first_point(), path.current_point());
    }

    #[test]
    fn primitives_ignore_pushes() {
        let mut path = Path::rect(dvec2(0.0, 0.0), dvec2(1.0, 1.0), false);
        path.push(Segment::LineTo(dvec2(5.0, 5.0)));
        assert_eq!(path.kind(), PathKind::Box);
        assert_eq!(path.len(), 0);
        assert!(path.is_closed_shape());
    }

    #[test]
    fn lone_arc_is_replaced_by_lines() {
        let mut path = Path::starting_at(dvec2(1.0, 0.0));
        path.push(Segment::Arc {
            center: dvec2(0.0, 0.0),
            end: dvec2(0.0, 1.0),
        });
        assert!(path.replace_lone_curve());
        assert!(path.segments()[1..].iter().all(|s| matches!(s, Segment::LineTo(_))));
        assert_eq!(path.current_point(), Some(dvec2(0.0, 1.0)));
    }

    #[test]
    fn lone_line_is_kept() {
        let mut path = Path::starting_at(dvec2(0.0, 0.0));
        path.push(Segment::LineTo(dvec2(1.0, 0.0)));
        assert!(!path.replace_lone_curve());
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn circle_decompositions_close() {
        let c = dvec2(1.0, 1.0);
        for path in [
            Path::ellipse_as_ellarcs(c, 2.0, 2.0, 0.0, false),
            Path::ellipse_as_cubics(c, 2.0, 2.0, 0.0, false),
            Path::ellipse_as_lines(c, 2.0, 2.0, 0.0, false),
        ] {
            assert!(path.primitive);
            let first = path.first_point().unwrap();
            let last = path.current_point().unwrap();
            assert!((first - last).length() < 1e-12);
        }
    }

    #[test]
    fn bbox_of_circle_primitive() {
        let path = Path::circle(dvec2(0.0, 0.0), 1.0, false);
        let b = path.bbox();
        assert!((b.min.x + 1.0).abs() < 1e-9);
        assert!((b.max.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn nested_box_is_merged_into_container() {
        let outer = Path::box_as_lines(dvec2(0.0, 0.0), dvec2(10.0, 10.0), false);
        let inner = Path::box_as_lines(dvec2(4.0, 4.0), dvec2(6.0, 6.0), true);
        let apart = Path::box_as_lines(dvec2(20.0, 0.0), dvec2(21.0, 1.0), false);
        let merged = merge_paths(&[outer.clone(), inner.clone(), apart.clone()]);
        assert!(merged[1].is_none());
        assert_eq!(merged[2].as_ref(), Some(&apart));
        let container = merged[0].as_ref().unwrap();
        // outer + bridge + inner + bridge back
        assert_eq!(container.len(), outer.len() + 1 + 4 + 1);
        let pts: Vec<Point> = container.segments().iter().map(Segment::end).collect();
        assert!(pts.contains(&dvec2(4.0, 4.0)));
        assert_eq!(pts.first(), pts.last());
    }

    #[test]
    fn disjoint_paths_are_untouched() {
        let a = Path::box_as_lines(dvec2(0.0, 0.0), dvec2(1.0, 1.0), false);
        let b = Path::box_as_lines(dvec2(2.0, 0.0), dvec2(3.0, 1.0), false);
        let merged = merge_paths(&[a.clone(), b.clone()]);
        assert_eq!(merged, vec![Some(a), Some(b)]);
    }
}
