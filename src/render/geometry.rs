//! Geometry functions: angles, arc centers and curve approximations
//!
//! Everything here is pure math over `DVec2`. The path builder uses these to
//! decompose arcs, ellipses and Beziers when a backend cannot take them as
//! primitives.

use std::f64::consts::{FRAC_PI_2, PI};

use glam::{DVec2, dvec2};

use crate::types::Point;

/// Control-arm length for a cubic Bezier approximating a quarter circle.
pub const KAPPA_FOR_QUARTER_CIRCLE: f64 = 0.552284749825;

/// Number of binary subdivisions used when an arc is drawn as a polyline.
pub const NUM_ARC_SUBDIVISIONS: u32 = 5;

/// Deepest subdivision of a quadratic Bezier when flattening.
pub const MAX_NUM_BEZIER2_SUBDIVISIONS: u32 = 6;

/// Deepest subdivision of a cubic Bezier when flattening.
pub const MAX_NUM_BEZIER3_SUBDIVISIONS: u32 = 7;

/// Flatness threshold for Beziers, relative to the endpoint distance.
pub const REL_QUAD_FLATNESS: f64 = 5e-4;
pub const REL_CUBIC_FLATNESS: f64 = 5e-4;

/// Rescale `v` to length `new_len`. A zero vector is returned unchanged.
pub fn vscale(v: DVec2, new_len: f64) -> DVec2 {
    let len = v.length();
    if len == 0.0 { v } else { v * (new_len / len) }
}

/// Two-argument arctangent with exact answers on the axes.
///
/// `atan2` is left to the platform only when neither coordinate is zero, so
/// `y == 0, x < 0` gives exactly π (never -π) and the axis cases give exact
/// multiples of π/2.
pub fn normalized_atan2(y: f64, x: f64) -> f64 {
    if y == 0.0 && x >= 0.0 {
        0.0
    } else if y == 0.0 && x < 0.0 {
        PI
    } else if x == 0.0 && y >= 0.0 {
        FRAC_PI_2
    } else if x == 0.0 && y < 0.0 {
        -FRAC_PI_2
    } else {
        y.atan2(x)
    }
}

/// Signed angle swept from `p0` to `p1` about `center`, in (-π, π].
///
/// Collinear points sweep exactly π: an arc through a diameter always goes
/// counterclockwise.
pub fn sweep_angle(p0: Point, p1: Point, center: Point) -> f64 {
    let v0 = p0 - center;
    let v1 = p1 - center;
    if v0.perp_dot(v1) == 0.0 {
        return PI;
    }
    let mut angle = normalized_atan2(v1.y, v1.x) - normalized_atan2(v0.y, v0.x);
    if angle > PI {
        angle -= 2.0 * PI;
    } else if angle <= -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Project `center` orthogonally onto the perpendicular bisector of `p0`-`p1`.
///
/// `p0` and `p1` must differ.
pub fn true_center(p0: Point, p1: Point, center: Point) -> Point {
    let mid = 0.5 * (p0 + p1);
    let along = (p1 - p0).perp();
    let offset = center - mid;
    let scale = along.dot(offset) / along.length_squared();
    mid + scale * along
}

/// Orientation of an arc from `p0` to `p1` about `center`: +1 counterclockwise.
pub fn arc_orientation(p0: Point, p1: Point, center: Point) -> f64 {
    if (p0 - center).perp_dot(p1 - center) >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// Point halfway along the circular arc from `p0` to `p1`.
pub fn arc_bisection_point(p0: Point, p1: Point, center: Point) -> Point {
    let radius = center.distance(p0);
    let orientation = arc_orientation(p0, p1, center);
    let chord = vscale(p1 - p0, radius);
    center + orientation * dvec2(chord.y, -chord.x)
}

/// Vertices (excluding `p0`) of a polyline inscribed in the circular arc.
pub fn arc_polyline(p0: Point, p1: Point, center: Point) -> Vec<Point> {
    if p0 == p1 {
        return vec![p1];
    }
    let steps = 1usize << NUM_ARC_SUBDIVISIONS;
    let sweep = sweep_angle(p0, p1, center);
    let v0 = p0 - center;
    let mut points: Vec<Point> = (1..steps)
        .map(|i| {
            let theta = sweep * i as f64 / steps as f64;
            center + DVec2::from_angle(theta).rotate(v0)
        })
        .collect();
    points.push(p1);
    points
}

/// Vertices (excluding `p0`) of a polyline inscribed in the quarter ellipse
/// with conjugate semi-diameters `p0 - center` and `p1 - center`.
pub fn ellarc_polyline(p0: Point, p1: Point, center: Point) -> Vec<Point> {
    let v0 = p0 - center;
    let v1 = p1 - center;
    if v0.perp_dot(v1) == 0.0 {
        // collinear: no ellipse to follow
        return vec![p1];
    }
    let steps = 1usize << NUM_ARC_SUBDIVISIONS;
    let mut points: Vec<Point> = (1..steps)
        .map(|i| {
            let t = FRAC_PI_2 * i as f64 / steps as f64;
            center + v0 * t.cos() + v1 * t.sin()
        })
        .collect();
    points.push(p1);
    points
}

/// Cubic Bezier pieces `(c1, c2, end)` approximating a circular arc.
///
/// Arcs sweeping more than about a right angle are split in two first.
pub fn arc_as_cubics(p0: Point, p1: Point, center: Point) -> Vec<(Point, Point, Point)> {
    let mut out = Vec::new();
    push_arc_cubics(p0, p1, center, &mut out);
    out
}

fn push_arc_cubics(p0: Point, p1: Point, center: Point, out: &mut Vec<(Point, Point, Point)>) {
    let v0 = p0 - center;
    let v1 = p1 - center;
    if v0 == DVec2::ZERO || v1 == DVec2::ZERO || v0 == v1 {
        // degenerate: straight "curve"
        out.push((p0, p1, p1));
        return;
    }
    let orientation = arc_orientation(p0, p1, center);
    let mut range = normalized_atan2(v1.y, v1.x) - normalized_atan2(v0.y, v0.x);
    if range > PI {
        range -= 2.0 * PI;
    }
    if range <= -PI {
        range += 2.0 * PI;
    }
    if range.abs() > 0.51 * PI {
        let mid = arc_bisection_point(p0, p1, center);
        push_arc_cubics(p0, mid, center, out);
        push_arc_cubics(mid, p1, center, out);
        return;
    }
    let half = 0.5 * range.abs();
    let (sin_half, cos_half) = half.sin_cos();
    let kappa = if sin_half.abs() < 0.5 {
        (4.0 / 3.0) * sin_half / (1.0 + cos_half)
    } else {
        (4.0 / 3.0) * (1.0 - cos_half) / sin_half
    };
    let c1 = p0 + kappa * orientation * dvec2(-v0.y, v0.x);
    let c2 = p1 + kappa * orientation * dvec2(v1.y, -v1.x);
    out.push((c1, c2, p1));
}

/// Cubic Bezier control points `(c1, c2)` for a quarter ellipse.
pub fn ellarc_as_cubic(p0: Point, p1: Point, center: Point) -> (Point, Point) {
    let v0 = p0 - center;
    let v1 = p1 - center;
    (
        p0 + KAPPA_FOR_QUARTER_CIRCLE * v1,
        p1 + KAPPA_FOR_QUARTER_CIRCLE * v0,
    )
}

/// Control points of the cubic Bezier equal to a quadratic one.
pub fn quad_as_cubic(p0: Point, control: Point, end: Point) -> (Point, Point) {
    (
        p0 + (2.0 / 3.0) * (control - p0),
        end + (2.0 / 3.0) * (control - end),
    )
}

/// Flatten a quadratic Bezier, returning the vertices after `p0`.
pub fn flatten_quad(p0: Point, control: Point, end: Point) -> Vec<Point> {
    let tolerance = REL_QUAD_FLATNESS * p0.distance(end);
    let mut out = Vec::new();
    subdivide_quad(p0, control, end, tolerance, 0, &mut out);
    out
}

fn subdivide_quad(p0: Point, p1: Point, p2: Point, tol: f64, depth: u32, out: &mut Vec<Point>) {
    let deviation = (p0 - 2.0 * p1 + p2).length();
    if depth >= MAX_NUM_BEZIER2_SUBDIVISIONS || deviation <= tol {
        out.push(p2);
        return;
    }
    let q0 = 0.5 * (p0 + p1);
    let q1 = 0.5 * (p1 + p2);
    let mid = 0.5 * (q0 + q1);
    subdivide_quad(p0, q0, mid, tol, depth + 1, out);
    subdivide_quad(mid, q1, p2, tol, depth + 1, out);
}

/// Flatten a cubic Bezier, returning the vertices after `p0`.
pub fn flatten_cubic(p0: Point, c1: Point, c2: Point, end: Point) -> Vec<Point> {
    let tolerance = REL_CUBIC_FLATNESS * p0.distance(end);
    let mut out = Vec::new();
    subdivide_cubic([p0, c1, c2, end], tolerance, 0, &mut out);
    out
}

fn subdivide_cubic(p: [Point; 4], tol: f64, depth: u32, out: &mut Vec<Point>) {
    let d1 = (p[0] - 2.0 * p[1] + p[2]).length();
    let d2 = (p[1] - 2.0 * p[2] + p[3]).length();
    if depth >= MAX_NUM_BEZIER3_SUBDIVISIONS || d1.max(d2) <= tol {
        out.push(p[3]);
        return;
    }
    let a = 0.5 * (p[0] + p[1]);
    let b = 0.5 * (p[1] + p[2]);
    let c = 0.5 * (p[2] + p[3]);
    let ab = 0.5 * (a + b);
    let bc = 0.5 * (b + c);
    let mid = 0.5 * (ab + bc);
    subdivide_cubic([p[0], a, ab, mid], tol, depth + 1, out);
    subdivide_cubic([mid, bc, c, p[3]], tol, depth + 1, out);
}

/// The four quarter-ellipse endpoints of an ellipse, starting on the major
/// axis and going counterclockwise unless `clockwise`. The last entry
/// repeats the start.
pub fn ellipse_quadrant_points(
    center: Point,
    rx: f64,
    ry: f64,
    angle_degrees: f64,
    clockwise: bool,
) -> [Point; 5] {
    let (sin_t, cos_t) = angle_degrees.to_radians().sin_cos();
    let start = center + dvec2(rx * cos_t, rx * sin_t);
    let minor_ccw = center + dvec2(-ry * sin_t, ry * cos_t);
    let minor_cw = center + dvec2(ry * sin_t, -ry * cos_t);
    let opposite = center - dvec2(rx * cos_t, rx * sin_t);
    if clockwise {
        [start, minor_cw, opposite, minor_ccw, start]
    } else {
        [start, minor_ccw, opposite, minor_cw, start]
    }
}

/// Corners of a box from `p0` to `p1`, starting and ending at `p0`.
///
/// Counterclockwise unless `clockwise`.
pub fn box_corners(p0: Point, p1: Point, clockwise: bool) -> [Point; 5] {
    let mut x_first = (p1.x >= p0.x && p1.y >= p0.y) || (p1.x < p0.x && p1.y < p0.y);
    if clockwise {
        x_first = !x_first;
    }
    let (a, b) = if x_first {
        (dvec2(p1.x, p0.y), dvec2(p0.x, p1.y))
    } else {
        (dvec2(p0.x, p1.y), dvec2(p1.x, p0.y))
    };
    [p0, a, p1, b, p0]
}
