//! Default drawing attributes and pipeline limits

/// Default line width as a fraction of the display size
pub const LINE_WIDTH_FRACTION: f64 = 1.0 / 850.0;
/// Default font size as a fraction of the display size
pub const FONT_SIZE_FRACTION: f64 = 1.0 / 50.0;
pub const MITER_LIMIT: f64 = 10.4334305246;
/// Segments in an unfilled path before it is flushed early
pub const MAX_UNFILLED_PATH_LENGTH: usize = 500;
pub const FONT_NAME: &str = "HersheySerif";
pub const TEXT_ANGLE: f64 = 0.0;

// Hershey glyph metrics, in units of the em square
pub const HERSHEY_EM: f64 = 33.0;
pub const HERSHEY_ASCENT: f64 = 26.0;
pub const HERSHEY_DESCENT: f64 = 7.0;
pub const HERSHEY_CAPHEIGHT: f64 = 22.0;

// Marker geometry, as fractions of the requested marker size
pub const MAXIMUM_MARKER_DIMENSION: f64 = 5.0 / 8.0;
pub const MARKER_LINE_SCALE: f64 = 0.05 * MAXIMUM_MARKER_DIMENSION;
pub const RELATIVE_DOT_SIZE: f64 = 0.15;

/// Advance per character, as a fraction of the font size, for fonts
/// without a width table
pub const NOMINAL_ADVANCE: f64 = 0.6;
