//! Cohen–Sutherland clipping of a single line segment against a rectangle.
//!
//! Used by backends whose device coordinates are bounded. When an endpoint
//! violates two sides at once, the side resolved first is right, then
//! left, then top, then bottom.

use glam::dvec2;

use crate::types::Point;

/// Which sides of the clip rectangle a point lies beyond.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Outcode {
    value: u8,
}

impl Outcode {
    const TOP: u8 = 1;
    const BOTTOM: u8 = 2;
    const RIGHT: u8 = 4;
    const LEFT: u8 = 8;

    fn of(p: Point, rect: &ClipRect) -> Self {
        let mut value = 0;
        if p.x < rect.min.x {
            value |= Self::LEFT;
        } else if p.x > rect.max.x {
            value |= Self::RIGHT;
        }
        if p.y < rect.min.y {
            value |= Self::BOTTOM;
        } else if p.y > rect.max.y {
            value |= Self::TOP;
        }
        Self { value }
    }

    fn is_inside(self) -> bool {
        self.value == 0
    }

    fn shares_side_with(self, other: Outcode) -> bool {
        self.value & other.value != 0
    }

    fn has(self, side: u8) -> bool {
        self.value & side != 0
    }
}

/// Closed, axis-aligned clip rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub min: Point,
    pub max: Point,
}

impl ClipRect {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            min: dvec2(x_min, y_min),
            max: dvec2(x_max, y_max),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        Outcode::of(p, self).is_inside()
    }
}

/// What happened to a segment during clipping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipOutcome {
    /// Some part of the segment lies in the rectangle
    pub accepted: bool,
    /// The first endpoint was replaced by a boundary point
    pub first_moved: bool,
    /// The second endpoint was replaced by a boundary point
    pub second_moved: bool,
}

/// Clip the segment `p0`-`p1` to `rect`.
///
/// Returns the outcome together with the clipped endpoints. A rejected
/// segment comes back with its endpoints untouched.
pub fn clip_line(p0: Point, p1: Point, rect: &ClipRect) -> (ClipOutcome, Point, Point) {
    let (mut a, mut b) = (p0, p1);
    let mut code_a = Outcode::of(a, rect);
    let mut code_b = Outcode::of(b, rect);
    let mut outcome = ClipOutcome::default();

    loop {
        if code_a.is_inside() && code_b.is_inside() {
            outcome.accepted = true;
            return (outcome, a, b);
        }
        if code_a.shares_side_with(code_b) {
            return (ClipOutcome::default(), p0, p1);
        }

        let moving_first = !code_a.is_inside();
        let code = if moving_first { code_a } else { code_b };
        let d = b - a;

        let hit = if code.has(Outcode::RIGHT) {
            dvec2(rect.max.x, a.y + d.y * (rect.max.x - a.x) / d.x)
        } else if code.has(Outcode::LEFT) {
            dvec2(rect.min.x, a.y + d.y * (rect.min.x - a.x) / d.x)
        } else if code.has(Outcode::TOP) {
            dvec2(a.x + d.x * (rect.max.y - a.y) / d.y, rect.max.y)
        } else {
            dvec2(a.x + d.x * (rect.min.y - a.y) / d.y, rect.min.y)
        };

        if moving_first {
            a = hit;
            code_a = Outcode::of(a, rect);
            outcome.first_moved = true;
        } else {
            b = hit;
            code_b = Outcode::of(b, rect);
            outcome.second_moved = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> ClipRect {
        ClipRect::new(0.0, 0.0, 10.0, 10.0)
    }

    #[test]
    fn inside_segment_is_untouched() {
        let (o, a, b) = clip_line(dvec2(1.0, 1.0), dvec2(9.0, 5.0), &unit());
        assert_eq!(
            o,
            ClipOutcome {
                accepted: true,
                first_moved: false,
                second_moved: false
            }
        );
        assert_eq!((a, b), (dvec2(1.0, 1.0), dvec2(9.0, 5.0)));
    }

    #[test]
    fn segment_beyond_one_side_is_rejected() {
        for (p0, p1) in [
            (dvec2(11.0, 1.0), dvec2(12.0, 9.0)),
            (dvec2(-1.0, 1.0), dvec2(-5.0, 9.0)),
            (dvec2(1.0, 11.0), dvec2(9.0, 20.0)),
            (dvec2(1.0, -1.0), dvec2(9.0, -0.5)),
        ] {
            let (o, a, b) = clip_line(p0, p1, &unit());
            assert!(!o.accepted);
            assert_eq!((a, b), (p0, p1));
        }
    }

    #[test]
    fn single_crossing_moves_one_endpoint_onto_boundary() {
        let (o, a, b) = clip_line(dvec2(5.0, 5.0), dvec2(15.0, 5.0), &unit());
        assert!(o.accepted);
        assert!(!o.first_moved);
        assert!(o.second_moved);
        assert_eq!(a, dvec2(5.0, 5.0));
        assert_eq!(b.x, 10.0);
        assert_eq!(b.y, 5.0);

        let (o, a, _) = clip_line(dvec2(5.0, -5.0), dvec2(5.0, 5.0), &unit());
        assert!(o.accepted && o.first_moved && !o.second_moved);
        assert_eq!(a.y, 0.0);
    }

    #[test]
    fn diagonal_through_corner_region() {
        // starts beyond right and top; right is resolved first
        let (o, a, b) = clip_line(dvec2(12.0, 12.0), dvec2(4.0, 4.0), &unit());
        assert!(o.accepted && o.first_moved && !o.second_moved);
        assert_eq!(a, dvec2(10.0, 10.0));
        assert_eq!(b, dvec2(4.0, 4.0));
    }

    #[test]
    fn segment_missing_the_corner_is_rejected() {
        let (o, _, _) = clip_line(dvec2(8.0, 12.0), dvec2(12.0, 8.0), &unit());
        // crosses x=10 at y=10, touching the corner exactly
        assert!(o.accepted);
        let (o, _, _) = clip_line(dvec2(9.0, 13.0), dvec2(13.0, 9.0), &unit());
        assert!(!o.accepted);
    }

    #[test]
    fn both_endpoints_outside_on_opposite_sides() {
        let (o, a, b) = clip_line(dvec2(-5.0, 5.0), dvec2(15.0, 5.0), &unit());
        assert!(o.accepted && o.first_moved && o.second_moved);
        assert_eq!(a, dvec2(0.0, 5.0));
        assert_eq!(b, dvec2(10.0, 5.0));
    }
}
