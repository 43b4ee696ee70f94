//! A drawing device: one backend plus the page buffer, state stack and
//! output sink it draws with.
//!
//! The device owns every piece of mutable drawing state. Backends only see
//! it through a [`Surface`] built for the duration of a hook call. The
//! drawing API is spread over submodules:
//! - `path`: segments, closed shapes and path painting
//! - `attributes`: line, fill, color, font and transform setters
//! - `text`: labels and markers
//! - `integer`: `i32` forms of the drawing calls
//!
//! Every call except construction and `open` fails with
//! [`PlotError::InvalidOperation`] while the device is closed. Failures are
//! also passed to the backend's `warning` or `error` hook and remembered in
//! [`Device::last_error`].

mod attributes;
mod integer;
mod path;
mod text;

use std::io::Write;
use std::sync::Arc;

use glam::DAffine2;

use crate::backend::{AnyBackend, Backend, Capabilities, Capability, Surface};
use crate::errors::{PlotError, Result};
use crate::page::{OutputModel, PageBuffer};
use crate::params::{DeviceParams, ResolvedParams};
use crate::registry::{self, DeviceRegistry, SharedSink, shared_sink};
use crate::render::{DrawingState, FillRule, StateStack};
use crate::types::{BBox, Color, Transform};

pub struct Device<B: Backend = AnyBackend> {
    backend: B,
    caps: Capabilities,
    ndc_to_device: DAffine2,
    params: ResolvedParams,
    registry: Arc<DeviceRegistry>,
    sink: Option<SharedSink>,

    /// Dormant while closed; rebuilt by every `open`
    stack: StateStack,
    page: Option<PageBuffer>,
    /// Closed pages of an all-at-once device, written when it is dropped
    retained: Vec<PageBuffer>,

    open: bool,
    opened: bool,
    page_number: u32,
    frame_number: u32,
    /// The user chose a line width on this page, so new transforms keep it
    linewidth_invoked: bool,
    /// The user chose a font size on this page, so new transforms keep it
    fontsize_invoked: bool,

    max_line_length: usize,
    emulate_color: bool,
    last_error: Option<String>,
}

impl<B: Backend> Device<B> {
    /// A device with default parameters, resolved against the environment.
    pub fn new(backend: B) -> Result<Self> {
        Self::with_params(backend, &DeviceParams::new())
    }

    pub fn with_params(backend: B, params: &DeviceParams) -> Result<Self> {
        Self::with_resolved(backend, params.resolve())
    }

    pub fn with_resolved(backend: B, params: ResolvedParams) -> Result<Self> {
        Self::with_registry(backend, params, DeviceRegistry::global())
    }

    /// A device that joins `registry` while it is open.
    pub fn with_registry(
        mut backend: B,
        params: ResolvedParams,
        registry: Arc<DeviceRegistry>,
    ) -> Result<Self> {
        backend.initialize(&params)?;
        let caps = backend.capabilities();
        let ndc_to_device = backend.ndc_to_device();
        let transform = Transform::new(DAffine2::IDENTITY, ndc_to_device, caps.flipped_y);
        let stack = StateStack::new(DrawingState::new(caps.default_font, transform));
        crate::log::debug!(backend = caps.type_name, "device created");
        Ok(Device {
            max_line_length: params.max_line_length(),
            emulate_color: params.flag("EMULATE_COLOR"),
            backend,
            caps,
            ndc_to_device,
            params,
            registry,
            sink: None,
            stack,
            page: None,
            retained: Vec::new(),
            open: false,
            opened: false,
            page_number: 0,
            frame_number: 0,
            linewidth_invoked: false,
            fontsize_invoked: false,
            last_error: None,
        })
    }

    // ------------------------------------------------------------------
    // Plumbing shared by the drawing API
    // ------------------------------------------------------------------

    /// The backend, and a surface over everything else it may touch.
    fn parts(&mut self) -> (&mut B, Surface<'_>) {
        let surface = Surface {
            state: self.stack.top(),
            page: self.page.as_mut(),
            sink: self.sink.as_ref(),
            page_number: self.page_number,
            frame_number: self.frame_number,
        };
        (&mut self.backend, surface)
    }

    /// Report a failure through the backend's diagnostic hooks.
    fn fail(&mut self, err: PlotError) -> PlotError {
        let message = err.to_string();
        if err.is_warning() {
            self.backend.warning(&message);
        } else {
            self.backend.error(&message);
        }
        self.last_error = Some(message);
        err
    }

    /// Run a drawing call that needs an open device.
    fn run<T>(&mut self, op: &'static str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if !self.open {
            return Err(self.fail(PlotError::invalid_operation(op)));
        }
        f(self).map_err(|e| self.fail(e))
    }

    fn top(&self) -> &DrawingState {
        self.stack.top()
    }

    fn top_mut(&mut self) -> &mut DrawingState {
        self.stack.top_mut()
    }

    fn transform_for(&self, user_to_ndc: DAffine2) -> Transform {
        Transform::new(user_to_ndc, self.ndc_to_device, self.caps.flipped_y)
    }

    /// Colors as the device will show them.
    fn device_color(&self, color: Color) -> Color {
        if self.emulate_color {
            color.grayscale()
        } else {
            color
        }
    }

    fn write_output(&self, bytes: &[u8]) -> Result<()> {
        match &self.sink {
            Some(sink) => registry::write_to(sink, bytes).map_err(PlotError::from),
            None => Ok(()),
        }
    }

    fn flush_output(&mut self) -> Result<()> {
        if self.caps.output_model.is_custom() {
            let (backend, mut surface) = self.parts();
            return backend.flush_output(&mut surface);
        }
        match &self.sink {
            Some(sink) => registry::flush(sink).map_err(PlotError::from),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Page lifecycle
    // ------------------------------------------------------------------

    /// Direct output to `writer`. Only allowed while the device is closed;
    /// page numbering starts over.
    pub fn set_output(&mut self, writer: impl Write + Send + 'static) -> Result<()> {
        self.set_shared_output(shared_sink(writer))
    }

    pub fn set_shared_output(&mut self, sink: SharedSink) -> Result<()> {
        if self.open {
            return Err(self.fail(PlotError::invalid_operation("set_output")));
        }
        self.sink = Some(sink);
        self.page_number = 0;
        Ok(())
    }

    /// Begin a page.
    pub fn open(&mut self) -> Result<()> {
        if self.open {
            return Err(self.fail(PlotError::invalid_operation("open")));
        }
        self.begin_page().map_err(|e| self.fail(e))
    }

    fn begin_page(&mut self) -> Result<()> {
        let model = self.caps.output_model;
        self.page = model.uses_page_buffer().then(PageBuffer::new);
        self.page_number += 1;
        self.frame_number = 0;
        self.linewidth_invoked = false;
        self.fontsize_invoked = false;

        let mut bottom = DrawingState::new(self.caps.default_font, self.transform_for(DAffine2::IDENTITY));
        if self.caps.have_odd_winding_fill == Capability::Unsupported {
            bottom.fill_rule = FillRule::NonzeroWinding;
        }
        let bg = match self.params.bg_color() {
            Some(color) => color,
            None => {
                if let Some(name) = self.params.get_str("BG_COLOR") {
                    self.backend
                        .warning(&format!("substituting \"white\" for undefined color \"{name}\""));
                }
                Color::WHITE
            }
        };
        bottom.bg_color = self.device_color(bg);
        self.stack = StateStack::new(bottom);

        self.open = true;
        self.opened = true;
        if let Some(sink) = &self.sink {
            self.registry.register(sink);
        }
        crate::log::debug!(page = self.page_number, backend = self.caps.type_name, "page opened");

        {
            let (backend, mut surface) = self.parts();
            backend.begin_page(&mut surface)?;
        }
        if let Some(page) = self.page.as_mut() {
            page.freeze();
        }
        self.apply_matrix(DAffine2::IDENTITY)
    }

    /// Finish the page and emit it as the output model requires. The device
    /// is closed afterwards even if some step failed.
    pub fn close(&mut self) -> Result<()> {
        if !self.open {
            return Err(self.fail(PlotError::invalid_operation("close")));
        }
        self.end_page().map_err(|e| self.fail(e))
    }

    fn end_page(&mut self) -> Result<()> {
        let mut result = self.flush_path();
        while !self.stack.at_bottom() {
            result = result.and(self.restore_frame());
        }
        let ended = {
            let (backend, mut surface) = self.parts();
            backend.end_page(&mut surface)
        };
        result = result.and(ended);
        result = result.and(self.emit_page());

        if let Some(sink) = &self.sink {
            self.registry.deregister(sink);
        }
        self.open = false;
        crate::log::debug!(page = self.page_number, "page closed");
        result
    }

    fn emit_page(&mut self) -> Result<()> {
        match self.caps.output_model {
            OutputModel::NoOutput => {
                self.page = None;
                Ok(())
            }
            OutputModel::OnePage => {
                let page = self.page.take();
                if let (1, Some(page)) = (self.page_number, page) {
                    self.write_output(&page.assembled())?;
                }
                self.flush_output()
            }
            OutputModel::OnePageAtATime => {
                if let Some(page) = self.page.take() {
                    self.write_output(&page.assembled())?;
                }
                self.flush_output()
            }
            OutputModel::PagesAllAtOnce => {
                if let Some(page) = self.page.take() {
                    self.retained.push(page);
                }
                Ok(())
            }
            OutputModel::CustomRoutines | OutputModel::CustomRoutinesRealTime => self.flush_output(),
            OutputModel::CustomRoutinesNonStream => Ok(()),
        }
    }

    /// Clear the page and start a new frame on it.
    pub fn erase(&mut self) -> Result<()> {
        self.run("erase", |d| {
            let mut result = d.flush_path();
            if let Some(page) = d.page.as_mut() {
                page.reset();
            }
            let erased = {
                let (backend, mut surface) = d.parts();
                backend.erase_page(&mut surface)
            };
            result = result.and(erased);
            if d.caps.output_model.flushes_on_erase() {
                result = result.and(d.flush_output());
            }
            d.frame_number += 1;
            crate::log::debug!(frame = d.frame_number, "page erased");
            result
        })
    }

    /// Push pending output to the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.run("flush", |d| d.flush_output())
    }

    // ------------------------------------------------------------------
    // Saved states
    // ------------------------------------------------------------------

    /// Push a copy of the current drawing state. A path under construction
    /// stays with the saved state.
    pub fn save(&mut self) -> Result<()> {
        self.run("save", |d| {
            d.save_frame();
            Ok(())
        })
    }

    /// Paint any pending path and return to the last saved state.
    pub fn restore(&mut self) -> Result<()> {
        if !self.open || self.stack.at_bottom() {
            return Err(self.fail(PlotError::invalid_operation("restore")));
        }
        self.restore_frame().map_err(|e| self.fail(e))
    }

    fn save_frame(&mut self) {
        self.stack.save();
        let (backend, mut surface) = self.parts();
        backend.push_state(&mut surface);
    }

    fn restore_frame(&mut self) -> Result<()> {
        let painted = self.flush_path();
        {
            let (backend, mut surface) = self.parts();
            backend.pop_state(&mut surface);
        }
        self.stack.restore();
        painted
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// True once the device has been opened at least once.
    pub fn has_opened(&self) -> bool {
        self.opened
    }

    /// Number of drawing states on the stack; 0 while closed.
    pub fn depth(&self) -> usize {
        if self.open { self.stack.depth() } else { 0 }
    }

    /// The current drawing state, while open.
    pub fn state(&self) -> Option<&DrawingState> {
        self.open.then(|| self.stack.top())
    }

    /// Answer a capability query such as `"WIDE_LINES"`.
    pub fn have_cap(&self, name: &str) -> Capability {
        self.caps.query(name)
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Message of the most recent failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Erasures since the page was opened.
    pub fn frame_number(&self) -> u32 {
        self.frame_number
    }

    /// Device-space extent of what has been painted on the buffered page.
    pub fn page_bbox(&self) -> Option<BBox> {
        self.page.as_ref().map(|page| page.bbox)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn params(&self) -> &ResolvedParams {
        &self.params
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }
}

impl Device<AnyBackend> {
    /// A device for the built-in backend called `name`.
    pub fn by_name(name: &str, params: &DeviceParams) -> Result<Self> {
        Self::with_params(AnyBackend::from_name(name)?, params)
    }
}

impl<B: Backend> Drop for Device<B> {
    fn drop(&mut self) {
        if self.open {
            // already reported through the hooks
            let _ = self.close();
        }
        if !self.retained.is_empty() {
            let pages = std::mem::take(&mut self.retained);
            let written = pages
                .iter()
                .try_for_each(|page| self.write_output(&page.assembled()))
                .and_then(|()| self.flush_output());
            if let Err(e) = written {
                self.fail(e);
            }
        }
        if let Err(e) = self.backend.terminate() {
            self.fail(e);
        }
        if let Some(sink) = &self.sink {
            self.registry.deregister(sink);
        }
        crate::log::debug!(backend = self.caps.type_name, "device dropped");
    }
}

impl<B: Backend + std::fmt::Debug> std::fmt::Debug for Device<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("backend", &self.backend)
            .field("open", &self.open)
            .field("page_number", &self.page_number)
            .field("frame_number", &self.frame_number)
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}
