//! End-to-end behaviour of the device pipeline, observed through a backend
//! that records every hook call.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use plotkit::{
    Backend, Capabilities, Device, DeviceParams, DeviceRegistry, MemorySink, OutputModel, Path,
    PathKind, PlotError, Result, ScalingPolicy, Surface,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    BeginPage(u32),
    ErasePage,
    EndPage,
    Push,
    Pop,
    Paint(PathKind),
    PaintMany(usize),
    Warning(String),
    Error(String),
}

/// Records hook calls into a log shared with the test.
#[derive(Debug)]
struct Recorder {
    model: OutputModel,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
    fn new(model: OutputModel) -> (Self, Arc<Mutex<Vec<Call>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorder = Recorder {
            model,
            calls: Arc::clone(&calls),
        };
        (recorder, calls)
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Backend for Recorder {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            type_name: "recorder",
            output_model: self.model,
            have_mixed_paths: true,
            box_scaling: ScalingPolicy::Any,
            circle_scaling: ScalingPolicy::Any,
            ..Capabilities::GENERIC
        }
    }

    fn begin_page(&mut self, surface: &mut Surface<'_>) -> Result<()> {
        self.log(Call::BeginPage(surface.page_number));
        surface.write_page(&format!("page {}\n", surface.page_number));
        Ok(())
    }

    fn erase_page(&mut self, _surface: &mut Surface<'_>) -> Result<()> {
        self.log(Call::ErasePage);
        Ok(())
    }

    fn end_page(&mut self, _surface: &mut Surface<'_>) -> Result<()> {
        self.log(Call::EndPage);
        Ok(())
    }

    fn push_state(&mut self, _surface: &mut Surface<'_>) {
        self.log(Call::Push);
    }

    fn pop_state(&mut self, _surface: &mut Surface<'_>) {
        self.log(Call::Pop);
    }

    fn paint_path(&mut self, surface: &mut Surface<'_>, path: &Path) -> Result<()> {
        self.log(Call::Paint(path.kind()));
        surface.expand_bbox(path);
        Ok(())
    }

    fn paint_paths(&mut self, _surface: &mut Surface<'_>, paths: &[Path]) -> Result<bool> {
        self.log(Call::PaintMany(paths.len()));
        Ok(true)
    }

    fn warning(&mut self, message: &str) {
        self.log(Call::Warning(message.to_string()));
    }

    fn error(&mut self, message: &str) {
        self.log(Call::Error(message.to_string()));
    }
}

/// A sink that refuses every write and flush.
struct JammedSink;

impl Write for JammedSink {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("paper jam"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::other("paper jam"))
    }
}

/// Debug events from the pipeline go to the test output when RUST_LOG asks for them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn device(model: OutputModel) -> (Device<Recorder>, Arc<Mutex<Vec<Call>>>) {
    init_tracing();
    let (recorder, calls) = Recorder::new(model);
    let params = DeviceParams::new().resolve_with(|_| None);
    let device = Device::with_registry(recorder, params, DeviceRegistry::new()).unwrap();
    (device, calls)
}

fn take(calls: &Arc<Mutex<Vec<Call>>>) -> Vec<Call> {
    std::mem::take(&mut *calls.lock().unwrap())
}

#[test]
fn every_call_fails_on_a_closed_device() {
    let (mut d, calls) = device(OutputModel::NoOutput);
    assert!(matches!(d.line(0.0, 0.0, 1.0, 1.0), Err(PlotError::InvalidOperation { op: "line" })));
    assert!(d.rect(0.0, 0.0, 1.0, 1.0).is_err());
    assert!(d.line_width(2.0).is_err());
    assert!(d.pen_color_name("red").is_err());
    assert!(d.label("x").is_err());
    assert!(d.marker(0.0, 0.0, 3, 1.0).is_err());
    assert!(d.restore().is_err());
    assert!(d.flush().is_err());
    // failures are reported, but no hook that draws runs
    let calls = take(&calls);
    assert_eq!(calls.len(), 8);
    assert!(calls.iter().all(|c| matches!(c, Call::Error(_))));
    assert!(!d.has_opened());
}

#[test]
fn solid_boxes_are_primitives_and_dashed_ones_are_not() {
    let (mut d, calls) = device(OutputModel::NoOutput);
    d.open().unwrap();
    take(&calls);

    d.rect(0.0, 0.0, 10.0, 5.0).unwrap();
    d.end_path().unwrap();
    d.line_dash(&[1.0, 1.0], 0.0).unwrap();
    d.rect(0.0, 0.0, 10.0, 5.0).unwrap();
    d.end_path().unwrap();
    d.line_mod("solid").unwrap();
    d.pen_type(0).unwrap();
    d.fill_type(1).unwrap();
    d.line_mod("dotted").unwrap();
    // an unedged box can stay a primitive whatever the line style
    d.rect(0.0, 0.0, 10.0, 5.0).unwrap();
    d.end_path().unwrap();

    assert_eq!(
        take(&calls),
        vec![
            Call::Paint(PathKind::Box),
            Call::Paint(PathKind::SegmentList),
            Call::Paint(PathKind::Box),
        ]
    );
}

#[test]
fn save_and_restore_round_trip() {
    let (mut d, calls) = device(OutputModel::NoOutput);
    d.open().unwrap();
    d.line_width(3.0).unwrap();
    d.pen_color_name("red").unwrap();
    d.line_dash(&[4.0, 2.0], 0.0).unwrap();
    d.font_name("Times-Roman").unwrap();
    let before = d.state().unwrap().clone();
    take(&calls);

    d.save().unwrap();
    d.line_width(7.0).unwrap();
    d.fill_type(9).unwrap();
    d.pen_color_name("blue").unwrap();
    d.line_dash(&[1.0, 1.0, 3.0], 0.5).unwrap();
    d.font_name("Courier").unwrap();
    assert_ne!(d.state().unwrap().fg_color, before.fg_color);
    d.line(0.0, 0.0, 1.0, 1.0).unwrap();
    d.restore().unwrap();

    let state = d.state().unwrap();
    assert_eq!(state.line_width, 3.0);
    assert_eq!(state.fill_type, 0);
    assert_eq!(state.fg_color, before.fg_color);
    assert_eq!(state.dash_array, vec![4.0, 2.0]);
    assert_eq!(state.dash_offset, 0.0);
    assert_eq!(state.font_name, "Times-Roman");
    assert_eq!(state.true_font_name, before.true_font_name);
    assert_eq!(d.depth(), 1);
    // the pending line is painted before its frame goes away
    assert_eq!(take(&calls), vec![Call::Push, Call::Paint(PathKind::SegmentList), Call::Pop]);
}

#[test]
fn restore_on_the_bottom_frame_changes_nothing() {
    let (mut d, calls) = device(OutputModel::NoOutput);
    d.open().unwrap();
    take(&calls);
    d.line(0.0, 0.0, 1.0, 1.0).unwrap();
    assert!(matches!(d.restore(), Err(PlotError::InvalidOperation { op: "restore" })));
    assert!(d.state().unwrap().path.is_some());
    assert_eq!(
        take(&calls),
        vec![Call::Error("restore: invalid operation".to_string())]
    );
    assert_eq!(d.last_error(), Some("restore: invalid operation"));
}

#[test]
fn invalid_dash_arrays_are_rejected() {
    let (mut d, _calls) = device(OutputModel::NoOutput);
    d.open().unwrap();
    d.line_dash(&[4.0, 2.0], 1.0).unwrap();
    let err = d.line_dash(&[4.0, -2.0], 0.0).unwrap_err();
    assert!(matches!(err, PlotError::InvalidArgument { .. }));
    let state = d.state().unwrap();
    assert_eq!(state.dash_array, vec![4.0, 2.0]);
    assert_eq!(state.dash_offset, 1.0);
}

#[test]
fn erase_resets_the_page_and_counts_frames() {
    let (mut d, calls) = device(OutputModel::OnePageAtATime);
    d.open().unwrap();
    d.rect(1.0, 1.0, 2.0, 2.0).unwrap();
    d.end_path().unwrap();
    assert!(!d.page_bbox().unwrap().is_empty());

    d.erase().unwrap();
    assert!(d.page_bbox().unwrap().is_empty());
    assert_eq!(d.frame_number(), 1);
    assert_eq!(
        take(&calls),
        vec![Call::BeginPage(1), Call::Paint(PathKind::Box), Call::ErasePage]
    );
}

#[test]
fn compound_paths_go_to_the_backend_whole() {
    let (mut d, calls) = device(OutputModel::NoOutput);
    d.open().unwrap();
    take(&calls);
    d.rect(0.0, 0.0, 10.0, 10.0).unwrap();
    d.end_subpath().unwrap();
    d.circle(5.0, 5.0, 2.0).unwrap();
    d.end_subpath().unwrap();
    d.move_to(20.0, 20.0).unwrap();
    assert_eq!(take(&calls), vec![Call::PaintMany(2)]);
}

#[test]
fn close_unwinds_saved_states() {
    let (mut d, calls) = device(OutputModel::NoOutput);
    d.open().unwrap();
    d.save().unwrap();
    d.save().unwrap();
    d.close().unwrap();
    assert_eq!(
        take(&calls),
        vec![
            Call::BeginPage(1),
            Call::Push,
            Call::Push,
            Call::Pop,
            Call::Pop,
            Call::EndPage,
        ]
    );
    assert!(!d.is_open());
    assert_eq!(d.depth(), 0);
}

#[test]
fn one_page_at_a_time_writes_each_page_on_close() {
    let (mut d, _calls) = device(OutputModel::OnePageAtATime);
    let sink = MemorySink::new();
    d.set_output(sink.clone()).unwrap();
    d.open().unwrap();
    d.close().unwrap();
    assert_eq!(sink.contents_lossy(), "page 1\n");
    d.open().unwrap();
    d.close().unwrap();
    assert_eq!(sink.contents_lossy(), "page 1\npage 2\n");
}

#[test]
fn single_page_devices_only_emit_the_first_page() {
    let (mut d, _calls) = device(OutputModel::OnePage);
    let sink = MemorySink::new();
    d.set_output(sink.clone()).unwrap();
    for _ in 0..3 {
        d.open().unwrap();
        d.close().unwrap();
    }
    assert_eq!(sink.contents_lossy(), "page 1\n");
}

#[test]
fn all_at_once_devices_write_when_dropped() {
    let (mut d, _calls) = device(OutputModel::PagesAllAtOnce);
    let sink = MemorySink::new();
    d.set_output(sink.clone()).unwrap();
    d.open().unwrap();
    d.close().unwrap();
    d.open().unwrap();
    assert!(sink.contents().is_empty());
    // dropping an open device closes it first
    drop(d);
    assert_eq!(sink.contents_lossy(), "page 1\npage 2\n");
}

#[test]
fn erasing_keeps_the_page_prologue() {
    let (mut d, _calls) = device(OutputModel::OnePageAtATime);
    let sink = MemorySink::new();
    d.set_output(sink.clone()).unwrap();
    d.open().unwrap();
    d.erase().unwrap();
    d.close().unwrap();
    assert_eq!(sink.contents_lossy(), "page 1\n");
}

#[test]
fn jammed_output_warns_and_leaves_the_device_usable() {
    let (mut d, calls) = device(OutputModel::OnePageAtATime);
    d.set_output(JammedSink).unwrap();
    d.open().unwrap();
    take(&calls);

    let err = d.flush().unwrap_err();
    assert!(matches!(err, PlotError::OutputJammed { .. }));
    assert!(err.is_warning());
    let jammed = Call::Warning("the output stream is jammed".to_string());
    assert_eq!(take(&calls), vec![jammed.clone()]);
    assert!(d.is_open());

    d.line(0.0, 0.0, 1.0, 1.0).unwrap();
    d.erase().unwrap();
    assert_eq!(
        take(&calls),
        vec![Call::Paint(PathKind::SegmentList), Call::ErasePage]
    );

    // writing the finished page jams too, but the page still closes
    assert!(matches!(d.close(), Err(PlotError::OutputJammed { .. })));
    assert!(!d.is_open());
    let calls = take(&calls);
    assert!(calls.contains(&jammed));
    assert!(!calls.iter().any(|c| matches!(c, Call::Error(_))));
    assert_eq!(d.last_error(), Some("the output stream is jammed"));
}
