//! Error types with diagnostics using miette
//!
//! Every fallible drawing call returns one of these. Invalid-operation and
//! invalid-argument errors leave the device untouched; I/O errors are
//! warning-class and the device stays usable afterwards.

use miette::Diagnostic;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = PlotError> = std::result::Result<T, E>;

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Errors reported by a [`Device`](crate::Device) and its backends
#[derive(Error, Diagnostic, Debug)]
pub enum PlotError {
    #[error("{op}: invalid operation")]
    #[diagnostic(
        code(plotkit::invalid_operation),
        help("drawing calls need an open device, and `restore` needs a saved state to return to")
    )]
    InvalidOperation { op: &'static str },

    #[error("{op}: invalid argument: {reason}")]
    #[diagnostic(code(plotkit::invalid_argument))]
    InvalidArgument { op: &'static str, reason: String },

    #[error("the output stream is jammed")]
    #[diagnostic(
        code(plotkit::output_jammed),
        help("the device is still usable; check the output sink and flush again")
    )]
    OutputJammed {
        #[source]
        source: std::io::Error,
    },

    #[error("the requested singular affine transformation cannot be performed")]
    #[diagnostic(
        code(plotkit::singular_transform),
        help("the three corners passed to `space2` must not be collinear")
    )]
    SingularTransform,

    #[error("backend hook `{hook}` reported failure")]
    #[diagnostic(code(plotkit::backend_failure))]
    BackendFailure { hook: &'static str },

    #[error("unknown backend: {name}")]
    #[diagnostic(code(plotkit::unknown_backend))]
    UnknownBackend {
        name: String,
        #[help]
        suggestion: Option<String>,
    },
}

impl PlotError {
    pub(crate) fn invalid_operation(op: &'static str) -> Self {
        PlotError::InvalidOperation { op }
    }

    pub(crate) fn invalid_argument(op: &'static str, reason: impl Into<String>) -> Self {
        PlotError::InvalidArgument {
            op,
            reason: reason.into(),
        }
    }

    /// True for I/O problems, which are reported as warnings rather than errors.
    pub fn is_warning(&self) -> bool {
        matches!(self, PlotError::OutputJammed { .. })
    }
}

impl From<std::io::Error> for PlotError {
    fn from(source: std::io::Error) -> Self {
        PlotError::OutputJammed { source }
    }
}
