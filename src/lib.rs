//! ARL FFI - radio interferometric imaging behind a C interface.
//!
//! This crate implements the imaging library that `arlwrap.h` binds to:
//!
//! - Visibility synthesis for named antenna configurations
//! - Fourier prediction and inversion (2D, w-stacked, image and Fourier partitions)
//! - Direct prediction and insertion of point-source sky components
//! - Hogbom and multi-scale CLEAN, clean beam fitting and restoration
//! - Conversion between per-sample and block visibilities
//! - Antenna gain simulation, application and solution
//! - FFI layer with `#[repr(C)]` layouts matching the header
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │     FFI Layer (arlffi.h)            │
//! │  C layouts, status slot, entries    │
//! └─────────────────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────┐
//! │   Runtime (context + rayon pool)    │
//! └─────────────────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────┐
//! │          Pure Rust Library          │
//! │  ┌───────────┐  ┌───────────────┐  │
//! │  │ Imaging   │  │ Deconvolution │  │
//! │  │ (FFT/grid)│  │ (CLEAN)       │  │
//! │  └───────────┘  └───────────────┘  │
//! │  ┌───────────┐  ┌───────────────┐  │
//! │  │Simulation │  │ Calibration   │  │
//! │  └───────────┘  └───────────────┘  │
//! │  ┌───────────────────────────────┐  │
//! │  │ Data model (ndarray)          │  │
//! │  └───────────────────────────────┘  │
//! └─────────────────────────────────────┘
//! ```
//!
//! # FFI Usage
//!
//! ```c
//! arl_initialize();
//!
//! ARLVis vis;
//! arl_visibility_alloc(&vis, ntimes * nbases * nfreqs, 1);
//! arl_create_visibility(&lowconfig, &vis);
//! if (arl_last_status() != ARL_STATUS_OK)
//!     fprintf(stderr, "%s\n", arl_last_error());
//!
//! int shape[4];
//! helper_get_image_shape(freqs, cellsize, shape);
//! Image model;
//! arl_image_alloc(&model, shape);
//! arl_create_test_image(freqs, cellsize, vis.phasecentre, &model);
//! arl_predict_2d(&vis, &model, &vis);
//!
//! arl_image_free(&model);
//! arl_visibility_free(&vis);
//! arl_finalize();
//! ```

pub mod calibration;
pub mod coalesce;
pub mod data;
pub mod deconvolution;
pub mod error;
pub mod ffi;
pub mod imaging;
pub mod runtime;
pub mod simulation;

// Re-export commonly used items
pub use data::{BlockVisibility, GainTable, Image, PhaseCentre, PolarisationFrame, Visibility, Wcs};
pub use deconvolution::{DeconvolveConfig, DeconvolutionAlgorithm};
pub use error::ArlError;
pub use runtime::{ArlConfig, ArlContext};

// Re-export FFI items for cbindgen
pub use ffi::alloc::*;
pub use ffi::calibration::*;
pub use ffi::deconvolution::*;
pub use ffi::helpers::*;
pub use ffi::imaging::*;
pub use ffi::lifecycle::*;
pub use ffi::status::{arl_clear_error, arl_last_error, arl_last_status};
pub use ffi::types::*;
pub use ffi::visibility::*;
