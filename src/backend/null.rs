//! The generic backend: accepts everything, draws nothing.

use super::{Backend, Capabilities};

#[derive(Debug, Clone, Default)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        NullBackend
    }
}

impl Backend for NullBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities::GENERIC
    }
}
