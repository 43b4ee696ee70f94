//! Output models and page buffers.

use crate::types::{BBox, Point};

/// How a backend produces its bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputModel {
    /// Nothing is ever written
    NoOutput,
    /// Pages are buffered; only the first page is emitted
    OnePage,
    /// Each page is buffered and emitted when it is closed
    OnePageAtATime,
    /// Every page is retained and emitted when the device is dropped
    PagesAllAtOnce,
    /// The backend writes to the sink itself
    CustomRoutines,
    /// The backend writes each segment as soon as it is drawn
    CustomRoutinesRealTime,
    /// The backend draws on something other than a byte stream
    CustomRoutinesNonStream,
}

impl OutputModel {
    /// Pages live in a [`PageBuffer`] owned by the device.
    pub fn uses_page_buffer(self) -> bool {
        matches!(
            self,
            OutputModel::NoOutput
                | OutputModel::OnePage
                | OutputModel::OnePageAtATime
                | OutputModel::PagesAllAtOnce
        )
    }

    /// Page buffers whose contents eventually reach the sink.
    pub fn is_buffered(self) -> bool {
        self.uses_page_buffer() && self != OutputModel::NoOutput
    }

    pub fn is_custom(self) -> bool {
        matches!(
            self,
            OutputModel::CustomRoutines
                | OutputModel::CustomRoutinesRealTime
                | OutputModel::CustomRoutinesNonStream
        )
    }

    /// Drawing may become visible before the page is closed, so erasure
    /// must be flushed too.
    pub fn flushes_on_erase(self) -> bool {
        matches!(
            self,
            OutputModel::CustomRoutinesRealTime | OutputModel::CustomRoutinesNonStream
        )
    }
}

/// Per-page output buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageBuffer {
    data: Vec<u8>,
    /// Length that `reset` returns to
    frozen: usize,
    pub header: Option<Vec<u8>>,
    pub trailer: Option<Vec<u8>>,
    pub bbox: BBox,
    /// Names of the fonts drawn with on this page
    pub fonts_used: Vec<String>,
    pub colors_used: bool,
}

impl PageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    /// Keep everything written so far across later resets.
    pub fn freeze(&mut self) {
        self.frozen = self.data.len();
    }

    /// Drop everything written since the last freeze, and forget the
    /// bounding box and resource flags.
    pub fn reset(&mut self) {
        self.data.truncate(self.frozen);
        self.bbox = BBox::new();
        self.fonts_used.clear();
        self.colors_used = false;
    }

    pub fn replace(&mut self, data: Vec<u8>) {
        self.data = data;
        self.frozen = 0;
    }

    pub fn expand_bbox(&mut self, p: Point) {
        self.bbox.expand_point(p);
    }

    pub fn note_font(&mut self, name: &str) {
        if !self.fonts_used.iter().any(|f| f == name) {
            self.fonts_used.push(name.to_string());
        }
    }

    /// Header, body and trailer, in output order.
    pub fn assembled(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len());
        if let Some(header) = &self.header {
            out.extend_from_slice(header);
        }
        out.extend_from_slice(&self.data);
        if let Some(trailer) = &self.trailer {
            out.extend_from_slice(trailer);
        }
        out
    }
}
