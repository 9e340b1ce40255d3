//! Gain table entry points.
//!
//! Block visibilities are laid out as for `arl_create_blockvisibility`; the
//! `ARLConf` gives their time and channel counts.

use std::ffi::c_int;

use ndarray::Array1;

use super::convert::{block_from_c, block_to_c, gaintable_from_c, gaintable_to_c, setup_from_c};
use super::status::ffi_entry;
use super::types::{ARLConf, ARLGt, ARLVis, ArlStatus};
use crate::calibration::{apply_gaintable, create_gaintable_from_blockvisibility, solve_gaintable};
use crate::error::ArlError;
use crate::simulation::simulate_gaintable;

/// Identity gains for every antenna, time and channel of `blockvis`.
///
/// `gt` must declare `nrows = ntimes`, the antenna and channel counts, and
/// the receptor count of the visibility frame (1 for one polarisation,
/// otherwise 2).
///
/// # Safety
/// All pointers must be valid and `gt`'s arrays sized as declared.
#[no_mangle]
pub unsafe extern "C" fn arl_create_gaintable_from_blockvisibility(
    lowconf: *mut ARLConf,
    blockvis: *const ARLVis,
    gt: *mut ARLGt,
) -> ArlStatus {
    ffi_entry("arl_create_gaintable_from_blockvisibility", |_| {
        let setup = setup_from_c(lowconf)?;
        let block = block_from_c(blockvis, setup.ntimes(), setup.nchan(), setup.nant)?;
        let table = create_gaintable_from_blockvisibility(&block, block.polarisation_frame.nrec());
        gaintable_to_c(&table, gt)
    })
}

/// Overwrite the gains in `gt` with random phase and amplitude errors.
///
/// Errors are smoothed over `smooth_channels` adjacent channels (1 for
/// none). With two receptors, `leakage` is the standard deviation of the
/// cross-hand terms.
///
/// # Safety
/// `lowconf` and `gt` must be valid and `gt`'s arrays sized as declared.
#[no_mangle]
pub unsafe extern "C" fn arl_simulate_gaintable(
    lowconf: *mut ARLConf,
    gt: *mut ARLGt,
    phase_error: f64,
    amplitude_error: f64,
    smooth_channels: c_int,
    leakage: f64,
    seed: u64,
) -> ArlStatus {
    ffi_entry("arl_simulate_gaintable", |_| {
        let setup = setup_from_c(lowconf)?;
        let smooth_channels = usize::try_from(smooth_channels).map_err(|_| {
            ArlError::InvalidArgument(format!("smooth_channels {smooth_channels} must be positive"))
        })?;
        let frequency = Array1::from(setup.frequency.clone());
        let mut table = gaintable_from_c(gt, &frequency, setup.polarisation_frame)?;
        simulate_gaintable(&mut table, phase_error, amplitude_error, smooth_channels, leakage, seed)?;
        gaintable_to_c(&table, gt)
    })
}

/// Apply the gains in `gt` to `blockvis` in place, or remove them when
/// `inverse` is set.
///
/// # Safety
/// All pointers must be valid.
#[no_mangle]
pub unsafe extern "C" fn arl_apply_gaintable(
    lowconf: *mut ARLConf,
    blockvis: *mut ARLVis,
    gt: *const ARLGt,
    inverse: bool,
) -> ArlStatus {
    ffi_entry("arl_apply_gaintable", |ctx| {
        let setup = setup_from_c(lowconf)?;
        let mut block = block_from_c(blockvis, setup.ntimes(), setup.nchan(), setup.nant)?;
        let table = gaintable_from_c(gt, &block.frequency, block.polarisation_frame)?;
        ctx.install(|| apply_gaintable(&mut block, &table, inverse))?;
        block_to_c(&block, blockvis)
    })
}

/// Solve for the gains that take `modelvis` to `blockvis`, writing them to
/// `gt`.
///
/// # Safety
/// All pointers must be valid and `gt`'s arrays sized as for
/// [`arl_create_gaintable_from_blockvisibility`].
#[no_mangle]
pub unsafe extern "C" fn arl_solve_gaintable(
    lowconf: *mut ARLConf,
    blockvis: *const ARLVis,
    modelvis: *const ARLVis,
    phase_only: bool,
    niter: c_int,
    tol: f64,
    gt: *mut ARLGt,
) -> ArlStatus {
    ffi_entry("arl_solve_gaintable", |ctx| {
        let setup = setup_from_c(lowconf)?;
        let block = block_from_c(blockvis, setup.ntimes(), setup.nchan(), setup.nant)?;
        let model = block_from_c(modelvis, setup.ntimes(), setup.nchan(), setup.nant)?;
        if niter <= 0 {
            return Err(ArlError::InvalidArgument(format!("niter {niter} must be positive")));
        }
        let table = ctx.install(|| solve_gaintable(&block, &model, phase_only, niter as usize, tol))?;
        gaintable_to_c(&table, gt)
    })
}
