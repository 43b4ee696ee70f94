//! Scan conversion onto a dense RGB canvas.
//!
//! Line and circle stepping are pure functions over explicit step states:
//! `*_start` builds the first state and `*_next` returns the following one,
//! or `None` once the figure is complete. Filling samples each row at pixel
//! centers, with pixel `(i, j)` centered on the device point `(i, j)`.

use super::state::FillRule;
use crate::types::{Color, Point};

/// Bresenham state for a line between two pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStep {
    pub x: i64,
    pub y: i64,
    dx: i64,
    dy: i64,
    sx: i64,
    sy: i64,
    err: i64,
    remaining: i64,
}

pub fn line_start(from: (i64, i64), to: (i64, i64)) -> LineStep {
    let dx = (to.0 - from.0).abs();
    let dy = -(to.1 - from.1).abs();
    LineStep {
        x: from.0,
        y: from.1,
        dx,
        dy,
        sx: if from.0 < to.0 { 1 } else { -1 },
        sy: if from.1 < to.1 { 1 } else { -1 },
        err: dx + dy,
        remaining: dx.max(-dy),
    }
}

pub fn line_next(step: LineStep) -> Option<LineStep> {
    if step.remaining == 0 {
        return None;
    }
    let mut next = step;
    let e2 = 2 * step.err;
    if e2 >= step.dy {
        next.err += step.dy;
        next.x += step.sx;
    }
    if e2 <= step.dx {
        next.err += step.dx;
        next.y += step.sy;
    }
    next.remaining -= 1;
    Some(next)
}

/// Every pixel on the line, both endpoints included.
pub fn line_pixels(from: (i64, i64), to: (i64, i64)) -> impl Iterator<Item = (i64, i64)> {
    std::iter::successors(Some(line_start(from, to)), |s| line_next(*s)).map(|s| (s.x, s.y))
}

/// Midpoint-circle state covering the octant from (0, r) to the diagonal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircleStep {
    pub x: i64,
    pub y: i64,
    d: i64,
}

pub fn circle_start(radius: i64) -> CircleStep {
    CircleStep {
        x: 0,
        y: radius,
        d: 1 - radius,
    }
}

pub fn circle_next(step: CircleStep) -> Option<CircleStep> {
    let mut next = step;
    next.x += 1;
    if step.d < 0 {
        next.d += 2 * next.x + 1;
    } else {
        next.y -= 1;
        next.d += 2 * (next.x - next.y) + 1;
    }
    (next.x <= next.y).then_some(next)
}

fn pixel(p: Point) -> (i64, i64) {
    (p.x.round() as i64, p.y.round() as i64)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 3]>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        Canvas {
            width,
            height,
            pixels: vec![background.to_rgb8(); width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fill(&mut self, color: Color) {
        self.pixels.fill(color.to_rgb8());
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        let inside = (0..self.width as i64).contains(&x) && (0..self.height as i64).contains(&y);
        inside.then(|| y as usize * self.width as usize + x as usize)
    }

    pub fn get(&self, x: i64, y: i64) -> Option<[u8; 3]> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Set one pixel; points off the canvas are ignored.
    pub fn set(&mut self, x: i64, y: i64, color: Color) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color.to_rgb8();
        }
    }

    fn span(&mut self, y: i64, x0: i64, x1: i64, color: Color) {
        if !(0..self.height as i64).contains(&y) {
            return;
        }
        let x0 = x0.max(0);
        let x1 = x1.min(self.width as i64 - 1);
        for x in x0..=x1 {
            self.set(x, y, color);
        }
    }

    pub fn fill_disk(&mut self, center: Point, radius: i64, color: Color) {
        let (cx, cy) = pixel(center);
        let octant = std::iter::successors(Some(circle_start(radius)), |s| circle_next(*s));
        for s in octant {
            self.span(cy + s.y, cx - s.x, cx + s.x, color);
            self.span(cy - s.y, cx - s.x, cx + s.x, color);
            self.span(cy + s.x, cx - s.y, cx + s.y, color);
            self.span(cy - s.x, cx - s.y, cx + s.y, color);
        }
    }

    /// Stroke a polyline. Lines one pixel wide or thinner are stepped;
    /// wider ones are filled as quadrilaterals, with disks at the vertices
    /// when `round` is set.
    pub fn stroke_polyline(&mut self, points: &[Point], width: i32, round: bool, color: Color) {
        if let [only] = points {
            self.set(pixel(*only).0, pixel(*only).1, color);
            return;
        }
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if width <= 1 {
                for (x, y) in line_pixels(pixel(a), pixel(b)) {
                    self.set(x, y, color);
                }
                continue;
            }
            let Some(dir) = (b - a).try_normalize() else {
                continue;
            };
            let offset = dir.perp() * (width as f64 / 2.0);
            let quad = vec![a + offset, b + offset, b - offset, a - offset];
            self.fill_polygon(&[quad], FillRule::NonzeroWinding, color);
        }
        if round && width > 1 {
            for p in points {
                self.fill_disk(*p, i64::from(width / 2), color);
            }
        }
    }

    /// Fill the area enclosed by `rings` (each implicitly closed).
    pub fn fill_polygon(&mut self, rings: &[Vec<Point>], rule: FillRule, color: Color) {
        let edges: Vec<(Point, Point)> = rings
            .iter()
            .filter(|ring| ring.len() >= 2)
            .flat_map(|ring| {
                ring.iter()
                    .zip(ring.iter().cycle().skip(1))
                    .map(|(a, b)| (*a, *b))
            })
            .filter(|(a, b)| a.y != b.y)
            .collect();
        if edges.is_empty() {
            return;
        }
        let (lo, hi) = edges.iter().fold((f64::MAX, f64::MIN), |(lo, hi), (a, b)| {
            (lo.min(a.y).min(b.y), hi.max(a.y).max(b.y))
        });
        let first_row = (lo.ceil() as i64).max(0);
        let last_row = (hi.ceil() as i64 - 1).min(self.height as i64 - 1);

        let mut crossings: Vec<(f64, i32)> = Vec::new();
        for row in first_row..=last_row {
            let y = row as f64;
            crossings.clear();
            for (a, b) in &edges {
                let (upward, top, bottom) = if a.y < b.y { (1, a, b) } else { (-1, b, a) };
                if top.y <= y && y < bottom.y {
                    let t = (y - top.y) / (bottom.y - top.y);
                    crossings.push((top.x + t * (bottom.x - top.x), upward));
                }
            }
            crossings.sort_by(|p, q| p.0.total_cmp(&q.0));

            let mut winding = 0;
            for (k, (x, dir)) in crossings.iter().enumerate() {
                winding += dir;
                let inside = match rule {
                    FillRule::EvenOdd => (k + 1) % 2 == 1,
                    FillRule::NonzeroWinding => winding != 0,
                };
                if let (true, Some((next, _))) = (inside, crossings.get(k + 1)) {
                    self.span(row, x.ceil() as i64, next.ceil() as i64 - 1, color);
                }
            }
        }
    }

    /// Portable pixmap encoding: binary `P6`, or plain `P3` when `portable`.
    pub fn encode_pnm(&self, portable: bool) -> Vec<u8> {
        let magic = if portable { "P3" } else { "P6" };
        let mut out = format!("{magic}\n{} {}\n255\n", self.width, self.height).into_bytes();
        if !portable {
            out.extend(self.pixels.iter().flatten());
            return out;
        }
        // plain format lines stay within 70 characters
        let mut line = String::new();
        for sample in self.pixels.iter().flatten() {
            let text = sample.to_string();
            if !line.is_empty() && line.len() + 1 + text.len() > 70 {
                out.extend(line.as_bytes());
                out.push(b'\n');
                line.clear();
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&text);
        }
        if !line.is_empty() {
            out.extend(line.as_bytes());
            out.push(b'\n');
        }
        out
    }
}
