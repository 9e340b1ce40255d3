//! C ABI of the library.
//!
//! Entry points keep the void signatures of `arlwrap.h`; the outcome of
//! each call is recorded in a per-thread status slot read with
//! [`arl_last_status`] and [`arl_last_error`]. Entry points added beyond
//! that header also return the status directly.
//!
//! All buffers are borrowed from the caller unless obtained from the
//! `*_alloc` functions. Output counts (`nvis`, `size`) give the capacity on
//! entry and the written count on success; a failed call writes nothing.

pub mod alloc;
pub mod calibration;
pub(crate) mod convert;
pub mod deconvolution;
pub mod helpers;
pub mod imaging;
pub mod lifecycle;
pub mod status;
pub mod types;
pub mod visibility;

pub use alloc::*;
pub use calibration::*;
pub use deconvolution::*;
pub use helpers::*;
pub use imaging::*;
pub use lifecycle::*;
pub use status::{arl_clear_error, arl_last_error, arl_last_status};
pub use types::*;
pub use visibility::*;
