//! Error type for all imaging-library errors.

use thiserror::Error;

/// Errors that can occur inside the library.
///
/// The C entry points never return these directly; they are converted into
/// an [`ArlStatus`](crate::ffi::types::ArlStatus) and a message stored in the
/// calling thread's last-error slot.
#[derive(Error, Debug)]
pub enum ArlError {
    #[error("ARL library is not initialised; call arl_initialize first")]
    NotInitialised,

    #[error("null pointer passed for {0}")]
    NullPointer(&'static str),

    #[error("unsupported number of polarisations {0}; expected 1, 2 or 4")]
    InvalidPolarisationCount(i32),

    #[error("unknown polarisation frame '{0}'")]
    UnknownPolarisationFrame(String),

    #[error("no such configuration '{0}'")]
    UnknownConfiguration(String),

    #[error("buffer too small for {what}: need {needed}, have {available}")]
    BufferTooSmall {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("descriptor for {what} is malformed: {source}")]
    Descriptor {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("decompression requires an index from the compression step")]
    MissingCoalesceIndex,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("deconvolution failed: {0}")]
    Deconvolution(String),

    #[error("could not allocate {bytes} bytes for {what}")]
    AllocationFailed { what: &'static str, bytes: usize },
}
