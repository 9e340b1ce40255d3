//! Deconvolution and restoration entry points.

use super::convert::{check_image_to_c, image_from_c, image_to_c};
use super::status::ffi_entry;
use super::types::ARLImage;
use crate::deconvolution::{deconvolve_cube, restore_cube};

/// CLEAN `dirty` with `psf` using the context's deconvolution settings.
///
/// The clean component model is written to `restored` and the residual to
/// `residual`; run `arl_restore_cube` on the two for a restored image.
///
/// # Safety
/// All pointers must be valid `Image` structures; outputs must have room
/// for an image of the dirty image's shape.
#[no_mangle]
pub unsafe extern "C" fn arl_deconvolve_cube(
    dirty: *mut ARLImage,
    psf: *mut ARLImage,
    restored: *mut ARLImage,
    residual: *mut ARLImage,
) {
    ffi_entry("arl_deconvolve_cube", |ctx| {
        let dirty = image_from_c(dirty)?;
        let psf = image_from_c(psf)?;
        let config = &ctx.config().deconvolve;
        log::info!(
            "arl_deconvolve_cube: {} for {} iterations, gain {}",
            config.algorithm.name(),
            config.niter,
            config.gain
        );
        let (model, residual_image) = ctx.install(|| deconvolve_cube(&dirty, &psf, config))?;
        check_image_to_c(&model, restored)?;
        check_image_to_c(&residual_image, residual)?;
        image_to_c(&model, restored)?;
        image_to_c(&residual_image, residual)
    });
}

/// Convolve `model` with the clean beam fitted to `psf` and add `residual`
/// (which may be NULL), writing the result to `restored`.
///
/// # Safety
/// `model`, `psf` and `restored` must be valid `Image` structures;
/// `residual` must be null or valid.
#[no_mangle]
pub unsafe extern "C" fn arl_restore_cube(
    model: *mut ARLImage,
    psf: *mut ARLImage,
    residual: *mut ARLImage,
    restored: *mut ARLImage,
) {
    ffi_entry("arl_restore_cube", |ctx| {
        let model = image_from_c(model)?;
        let psf = image_from_c(psf)?;
        let residual = if residual.is_null() {
            None
        } else {
            Some(image_from_c(residual)?)
        };
        let image = ctx.install(|| restore_cube(&model, &psf, residual.as_ref()))?;
        image_to_c(&image, restored)
    });
}
