//! Device-independent rendering pipeline
//!
//! This module is organized into submodules:
//! - `defaults`: Default attribute values and pipeline limits
//! - `geometry`: Vector and angle helpers, curve approximations
//! - `clip`: Rectangle clipping for bounded devices
//! - `path`: Simple paths, closed primitives and path merging
//! - `state`: Drawing state and the saved-state stack
//! - `raster`: Line and circle stepping, canvas filling

pub mod clip;
pub mod defaults;
pub mod geometry;
pub mod path;
pub mod raster;
pub mod state;

// Re-export commonly used items
pub use clip::{ClipOutcome, ClipRect, clip_line};
pub use path::{Path, PathKind, PathShape, Segment, merge_paths};
pub use state::{CapType, DrawingState, FillRule, JoinType, LineType, StateStack};
