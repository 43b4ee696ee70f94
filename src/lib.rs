//! A device-independent 2D vector graphics pipeline.
//!
//! A [`Device`] accepts drawing calls in user coordinates (lines, arcs,
//! Bezier curves, boxes, circles, ellipses, points, labels and markers),
//! accumulates them into paths, and hands each finished path to a
//! [`Backend`] that turns it into output. Paths are kept in the most
//! compact form the backend accepts under the current transform and
//! decomposed into Beziers or polylines otherwise.
//!
//! ```no_run
//! use plotkit::{Device, DeviceParams, MemorySink};
//!
//! let mut device = Device::by_name("svg", &DeviceParams::new())?;
//! device.set_output(MemorySink::new())?;
//! device.open()?;
//! device.space(0.0, 0.0, 100.0, 100.0)?;
//! device.rect(10.0, 10.0, 90.0, 60.0)?;
//! device.close()?;
//! # Ok::<(), plotkit::PlotError>(())
//! ```

pub mod backend;
mod device;
pub mod errors;
pub mod log;
pub mod page;
pub mod params;
pub mod registry;
pub mod render;
pub mod types;

pub use backend::{
    AnyBackend, Backend, Capabilities, Capability, DeviceCoords, FontMetrics, HAlign, MetaBackend,
    NullBackend, PnmBackend, ScalingPolicy, Surface, SvgBackend, TekBackend, VAlign,
};
pub use device::Device;
pub use errors::{PlotError, Result};
pub use page::{OutputModel, PageBuffer};
pub use params::{DeviceParams, ParamValue, ResolvedParams};
pub use registry::{DeviceRegistry, MemorySink, SharedSink, shared_sink};
pub use render::{
    CapType, DrawingState, FillRule, JoinType, LineType, Path, PathKind, PathShape, Segment,
};
pub use types::{BBox, Color, Point, Transform, UnknownColor};
