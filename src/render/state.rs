//! Drawing state and the stack of saved states.
//!
//! A [`DrawingState`] holds every attribute that affects how the next path
//! is painted, plus the path under construction. Saving pushes a copy with
//! no path; restoring drops the top frame. The bottom frame lives as long as
//! the page.

use super::defaults;
use super::path::Path;
use crate::types::{Color, Point, Transform};

/// Named line types, each with a dash pattern in units of the line width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineType {
    #[default]
    Solid,
    Dotted,
    DotDashed,
    ShortDashed,
    LongDashed,
    DotDotDashed,
    DotDotDotDashed,
}

impl LineType {
    pub const ALL: [LineType; 7] = [
        LineType::Solid,
        LineType::Dotted,
        LineType::DotDashed,
        LineType::ShortDashed,
        LineType::LongDashed,
        LineType::DotDotDashed,
        LineType::DotDotDotDashed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LineType::Solid => "solid",
            LineType::Dotted => "dotted",
            LineType::DotDashed => "dotdashed",
            LineType::ShortDashed => "shortdashed",
            LineType::LongDashed => "longdashed",
            LineType::DotDotDashed => "dotdotdashed",
            LineType::DotDotDotDashed => "dotdotdotdashed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// On/off lengths, cycled; empty for a solid line.
    pub fn dash_pattern(self) -> &'static [f64] {
        match self {
            LineType::Solid => &[],
            LineType::Dotted => &[1.0, 3.0],
            LineType::DotDashed => &[4.0, 3.0, 1.0, 3.0],
            LineType::ShortDashed => &[4.0, 4.0],
            LineType::LongDashed => &[7.0, 4.0],
            LineType::DotDotDashed => &[4.0, 3.0, 1.0, 3.0, 1.0, 3.0],
            LineType::DotDotDotDashed => &[4.0, 3.0, 1.0, 3.0, 1.0, 3.0, 1.0, 3.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapType {
    #[default]
    Butt,
    Round,
    Projecting,
    Triangular,
}

impl CapType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "butt" => Some(CapType::Butt),
            "round" => Some(CapType::Round),
            "projecting" => Some(CapType::Projecting),
            "triangular" => Some(CapType::Triangular),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CapType::Butt => "butt",
            CapType::Round => "round",
            CapType::Projecting => "projecting",
            CapType::Triangular => "triangular",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Miter,
    Round,
    Bevel,
    Triangular,
}

impl JoinType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "miter" | "mitre" => Some(JoinType::Miter),
            "round" => Some(JoinType::Round),
            "bevel" => Some(JoinType::Bevel),
            "triangular" => Some(JoinType::Triangular),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            JoinType::Miter => "miter",
            JoinType::Round => "round",
            JoinType::Bevel => "bevel",
            JoinType::Triangular => "triangular",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    EvenOdd,
    NonzeroWinding,
}

impl FillRule {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "even-odd" | "alternate" => Some(FillRule::EvenOdd),
            "nonzero-winding" | "winding" => Some(FillRule::NonzeroWinding),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FillRule::EvenOdd => "even-odd",
            FillRule::NonzeroWinding => "nonzero-winding",
        }
    }
}

/// Every attribute that affects painting, plus the compound path being built
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingState {
    /// Graphics cursor, in user coordinates
    pub position: Point,
    pub transform: Transform,

    /// Simple path under construction
    pub path: Option<Path>,
    /// Finished simple paths of the compound path
    pub paths: Vec<Path>,

    pub fill_rule: FillRule,
    pub line_type: LineType,
    /// False in the `disconnected` line mode
    pub points_are_connected: bool,
    pub cap_type: CapType,
    pub join_type: JoinType,
    pub miter_limit: f64,

    pub line_width: f64,
    pub line_width_is_default: bool,
    pub device_line_width: f64,
    pub quantized_device_line_width: i32,
    pub default_line_width: f64,

    pub dash_array: Vec<f64>,
    pub dash_offset: f64,
    /// The dash array overrides the named line type
    pub dash_array_in_effect: bool,

    /// 0 = no pen
    pub pen_type: i32,
    /// 0 = unfilled, otherwise 1..=0xffff desaturation level
    pub fill_type: i32,
    /// +1 counterclockwise, -1 clockwise closed shapes
    pub orientation: i32,

    pub font_name: String,
    pub font_size: f64,
    pub font_size_is_default: bool,
    pub default_font_size: f64,
    pub text_angle: f64,
    pub true_font_name: String,
    pub true_font_size: f64,
    pub font_ascent: f64,
    pub font_descent: f64,
    pub font_cap_height: f64,

    pub fg_color: Color,
    /// Fill color as set by the user, before desaturation
    pub fill_color_base: Color,
    pub fill_color: Color,
    pub bg_color: Color,
}

impl DrawingState {
    /// The state a page starts with.
    pub fn new(default_font: &str, transform: Transform) -> Self {
        DrawingState {
            position: Point::ZERO,
            transform,
            path: None,
            paths: Vec::new(),
            fill_rule: FillRule::EvenOdd,
            line_type: LineType::Solid,
            points_are_connected: true,
            cap_type: CapType::Butt,
            join_type: JoinType::Miter,
            miter_limit: defaults::MITER_LIMIT,
            line_width: 0.0,
            line_width_is_default: true,
            device_line_width: 0.0,
            quantized_device_line_width: 0,
            default_line_width: 0.0,
            dash_array: Vec::new(),
            dash_offset: 0.0,
            dash_array_in_effect: false,
            pen_type: 1,
            fill_type: 0,
            orientation: 1,
            font_name: default_font.to_string(),
            font_size: 0.0,
            font_size_is_default: true,
            default_font_size: 0.0,
            text_angle: defaults::TEXT_ANGLE,
            true_font_name: default_font.to_string(),
            true_font_size: 0.0,
            font_ascent: 0.0,
            font_descent: 0.0,
            font_cap_height: 0.0,
            fg_color: Color::BLACK,
            fill_color_base: Color::BLACK,
            fill_color: Color::BLACK,
            bg_color: Color::WHITE,
        }
    }

    /// Copy of this state for a new stack frame: attributes duplicated, no
    /// path. The pending path stays with `self`.
    pub fn duplicate(&mut self) -> Self {
        let path = self.path.take();
        let paths = std::mem::take(&mut self.paths);
        let copy = self.clone();
        self.path = path;
        self.paths = paths;
        copy
    }

    /// Name of the current line mode, including `disconnected`.
    pub fn line_mode(&self) -> &'static str {
        if self.points_are_connected {
            self.line_type.name()
        } else {
            "disconnected"
        }
    }

    /// Edges drawn with this state are solid (no dashing of any kind).
    pub fn has_solid_edge(&self) -> bool {
        !self.dash_array_in_effect && self.line_type == LineType::Solid
    }

    /// The dash pattern to stroke with, as (lengths, offset) in user units.
    /// An empty pattern means a solid line.
    pub fn effective_dash(&self) -> (Vec<f64>, f64) {
        if self.dash_array_in_effect {
            return (self.dash_array.clone(), self.dash_offset);
        }
        let unit = if self.line_width > 0.0 {
            self.line_width
        } else {
            self.default_line_width
        };
        let lengths = self
            .line_type
            .dash_pattern()
            .iter()
            .map(|d| d * unit)
            .collect();
        (lengths, 0.0)
    }

    /// True if a path is under construction or finished subpaths are waiting.
    pub fn has_pending_path(&self) -> bool {
        self.path.is_some() || !self.paths.is_empty()
    }
}

struct Frame {
    state: DrawingState,
    below: Option<Box<Frame>>,
}

/// Stack of drawing states. The bottom frame is created with the stack and
/// can't be popped.
pub struct StateStack {
    top: Box<Frame>,
    depth: usize,
}

impl StateStack {
    pub fn new(bottom: DrawingState) -> Self {
        StateStack {
            top: Box::new(Frame {
                state: bottom,
                below: None,
            }),
            depth: 1,
        }
    }

    /// Number of frames, at least 1.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn at_bottom(&self) -> bool {
        self.top.below.is_none()
    }

    /// Push a copy of the top frame without its path.
    pub fn save(&mut self) {
        let copy = self.top.state.duplicate();
        let below = std::mem::replace(
            &mut self.top,
            Box::new(Frame {
                state: copy,
                below: None,
            }),
        );
        self.top.below = Some(below);
        self.depth += 1;
    }

    /// Pop the top frame, returning it. `None` at the bottom frame.
    pub fn restore(&mut self) -> Option<DrawingState> {
        let below = self.top.below.take()?;
        let popped = std::mem::replace(&mut self.top, below);
        self.depth -= 1;
        Some(popped.state)
    }

    pub fn top(&self) -> &DrawingState {
        &self.top.state
    }

    pub fn top_mut(&mut self) -> &mut DrawingState {
        &mut self.top.state
    }
}

impl Drop for StateStack {
    fn drop(&mut self) {
        // unlink iteratively so deep stacks don't recurse
        let mut below = self.top.below.take();
        while let Some(mut frame) = below {
            below = frame.below.take();
        }
    }
}

impl std::fmt::Debug for StateStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStack")
            .field("depth", &self.depth)
            .field("top", self.top())
            .finish()
    }
}
