//! Output sinks and the registry of open devices.
//!
//! Backends that fork helper processes need every open device's output
//! flushed first. Devices register their sink on `open` and deregister on
//! `close`; [`DeviceRegistry::flush_all`] holds the registry lock only while
//! it walks the list.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

/// Byte sink shared between a device and the registry
pub type SharedSink = Arc<Mutex<Box<dyn Write + Send>>>;

pub fn shared_sink(writer: impl Write + Send + 'static) -> SharedSink {
    Arc::new(Mutex::new(Box::new(writer)))
}

/// Write to a shared sink, treating a poisoned lock as an I/O error.
pub(crate) fn write_to(sink: &SharedSink, bytes: &[u8]) -> io::Result<()> {
    let mut guard = sink
        .lock()
        .map_err(|_| io::Error::other("output sink lock poisoned"))?;
    guard.write_all(bytes)
}

pub(crate) fn flush(sink: &SharedSink) -> io::Result<()> {
    let mut guard = sink
        .lock()
        .map_err(|_| io::Error::other("output sink lock poisoned"))?;
    guard.flush()
}

/// Sinks of the devices that are currently open
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    open: Mutex<Vec<Weak<Mutex<Box<dyn Write + Send>>>>>,
}

impl DeviceRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The registry devices join unless they are given their own.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<DeviceRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(DeviceRegistry::new))
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Vec<Weak<Mutex<Box<dyn Write + Send>>>>> {
        // a panic elsewhere leaves the list itself intact
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, sink: &SharedSink) {
        let mut entries = self.entries();
        entries.retain(|w| w.strong_count() > 0);
        entries.push(Arc::downgrade(sink));
    }

    pub(crate) fn deregister(&self, sink: &SharedSink) {
        let target = Arc::downgrade(sink);
        let mut entries = self.entries();
        entries.retain(|w| w.strong_count() > 0);
        // A sink shared by several devices is registered once per device.
        if let Some(i) = entries.iter().position(|w| w.ptr_eq(&target)) {
            entries.remove(i);
        }
    }

    /// Number of registered sinks still alive.
    pub fn open_count(&self) -> usize {
        self.entries().iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Flush the output of every open device. All sinks are attempted;
    /// the first failure is returned.
    pub fn flush_all(&self) -> io::Result<()> {
        let entries = self.entries();
        crate::log::debug!(count = entries.len(), "flushing all open devices");
        let mut result = Ok(());
        for sink in entries.iter().filter_map(Weak::upgrade) {
            if let Err(e) = flush(&sink) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

/// In-memory sink whose contents stay readable after the device is done
/// with it
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .map_err(|_| io::Error::other("memory sink lock poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
