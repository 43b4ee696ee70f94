//! `i32` forms of the drawing calls. Each converts its arguments and
//! delegates to the `f64` method.

use super::Device;
use crate::backend::Backend;
use crate::errors::Result;
use crate::types::Color;

macro_rules! integer_forms {
    ($($name:ident => $target:ident($($arg:ident),*);)*) => {
        impl<B: Backend> Device<B> {
            $(
                #[doc = concat!("`i32` form of [`Device::", stringify!($target), "`].")]
                #[allow(clippy::too_many_arguments)]
                pub fn $name(&mut self, $($arg: i32),*) -> Result<()> {
                    self.$target($(f64::from($arg)),*)
                }
            )*
        }
    };
}

integer_forms! {
    move_i => move_to(x, y);
    move_rel_i => move_rel(dx, dy);
    line_i => line(x0, y0, x1, y1);
    line_rel_i => line_rel(dx0, dy0, dx1, dy1);
    cont_i => cont(x, y);
    cont_rel_i => cont_rel(dx, dy);
    arc_i => arc(xc, yc, x0, y0, x1, y1);
    arc_rel_i => arc_rel(dxc, dyc, dx0, dy0, dx1, dy1);
    ellarc_i => ellarc(xc, yc, x0, y0, x1, y1);
    ellarc_rel_i => ellarc_rel(dxc, dyc, dx0, dy0, dx1, dy1);
    bezier2_i => bezier2(x0, y0, x1, y1, x2, y2);
    bezier2_rel_i => bezier2_rel(dx0, dy0, dx1, dy1, dx2, dy2);
    bezier3_i => bezier3(x0, y0, x1, y1, x2, y2, x3, y3);
    bezier3_rel_i => bezier3_rel(dx0, dy0, dx1, dy1, dx2, dy2, dx3, dy3);
    box_i => rect(x0, y0, x1, y1);
    box_rel_i => rect_rel(dx0, dy0, dx1, dy1);
    circle_i => circle(x, y, r);
    circle_rel_i => circle_rel(dx, dy, r);
    ellipse_i => ellipse(x, y, rx, ry, angle);
    ellipse_rel_i => ellipse_rel(dx, dy, rx, ry, angle);
    point_i => point(x, y);
    point_rel_i => point_rel(dx, dy);
    line_width_i => line_width(width);
    space_i => space(x0, y0, x1, y1);
    space2_i => space2(x0, y0, x1, y1, x2, y2);
}

/// A color from 16-bit channels; any channel out of range gives `fallback`.
fn channels(red: i32, green: i32, blue: i32, fallback: Color) -> Color {
    match (u16::try_from(red), u16::try_from(green), u16::try_from(blue)) {
        (Ok(r), Ok(g), Ok(b)) => Color::new(r, g, b),
        _ => fallback,
    }
}

impl<B: Backend> Device<B> {
    pub fn marker_i(&mut self, x: i32, y: i32, kind: i32, size: i32) -> Result<()> {
        self.marker(f64::from(x), f64::from(y), kind, f64::from(size))
    }

    pub fn marker_rel_i(&mut self, dx: i32, dy: i32, kind: i32, size: i32) -> Result<()> {
        self.marker_rel(f64::from(dx), f64::from(dy), kind, f64::from(size))
    }

    pub fn line_dash_i(&mut self, dashes: &[i32], offset: i32) -> Result<()> {
        let dashes: Vec<f64> = dashes.iter().copied().map(f64::from).collect();
        self.line_dash(&dashes, f64::from(offset))
    }

    /// Returns the size of the font actually used, rounded.
    pub fn font_size_i(&mut self, size: i32) -> Result<i32> {
        self.font_size(f64::from(size)).map(round_to_i32)
    }

    pub fn font_name_i(&mut self, name: &str) -> Result<i32> {
        self.font_name(name).map(round_to_i32)
    }

    pub fn text_angle_i(&mut self, degrees: i32) -> Result<i32> {
        self.text_angle(f64::from(degrees)).map(round_to_i32)
    }

    pub fn pen_color_i(&mut self, red: i32, green: i32, blue: i32) -> Result<()> {
        self.pen_color(channels(red, green, blue, Color::BLACK))
    }

    pub fn fill_color_i(&mut self, red: i32, green: i32, blue: i32) -> Result<()> {
        self.fill_color(channels(red, green, blue, Color::BLACK))
    }

    pub fn color_i(&mut self, red: i32, green: i32, blue: i32) -> Result<()> {
        self.color(channels(red, green, blue, Color::BLACK))
    }

    pub fn bg_color_i(&mut self, red: i32, green: i32, blue: i32) -> Result<()> {
        self.bg_color(channels(red, green, blue, Color::WHITE))
    }
}

fn round_to_i32(value: f64) -> i32 {
    value.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}
