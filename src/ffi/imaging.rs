//! Imaging entry points: advice, test images, predict and invert.

use std::ffi::{c_char, c_int};

use super::convert::{
    check_image_to_c, image_from_c, image_to_c, read_c_str, read_optional_descriptor, require, require_mut,
    setup_from_c, visibility_from_c, visibility_to_c,
};
use super::status::ffi_entry;
use super::types::{ARLConf, ARLImage, ARLVis, ARLadvice, ArlStatus};
use crate::data::{create_named_configuration, PhaseCentre, PolarisationFrame, Wcs};
use crate::error::ArlError;
use crate::imaging::{
    advise_wide_field, create_image_from_visibility, predict_2d, AdviceParams, ImagingContext, InsertMethod,
    WideFieldAdvice, DEFAULT_NPIXEL,
};
use crate::runtime::ArlContext;
use crate::simulation::{create_low_test_image_from_gleam, create_test_image};

/// Flux limit \[Jy\] of the sky drawn by `arl_create_low_test_image_from_gleam`.
const GLEAM_FLUX_LIMIT: f64 = 0.1;

unsafe fn invert_with(
    ctx: &ArlContext,
    imaging: ImagingContext,
    visin: *const ARLVis,
    img_in: *const ARLImage,
    dopsf: bool,
    out: *mut ARLImage,
    sumwt: *mut f64,
) -> Result<(), ArlError> {
    let vis = visibility_from_c(visin)?;
    let template = image_from_c(img_in)?;
    if sumwt.is_null() {
        return Err(ArlError::NullPointer("sumwt"));
    }
    let (image, weights) = ctx.install(|| imaging.invert(&vis, &template, dopsf))?;
    check_image_to_c(&image, out)?;
    image_to_c(&image, out)?;
    let sumwt = std::slice::from_raw_parts_mut(sumwt, weights.len());
    for (dst, src) in sumwt.iter_mut().zip(weights.iter()) {
        *dst = *src;
    }
    Ok(())
}

/// Recommend `vis_slices`, `npixel` and `cellsize` for imaging `res_vis`.
///
/// `adv->guard_band_image`, `adv->delA` and `adv->wprojection_planes` are
/// read; the antenna diameter comes from the configuration named in
/// `lowconf`.
///
/// # Safety
/// All pointers must be valid.
#[no_mangle]
pub unsafe extern "C" fn arl_advise_wide_field(lowconf: *mut ARLConf, res_vis: *mut ARLVis, adv: *mut ARLadvice) {
    ffi_entry("arl_advise_wide_field", |ctx| {
        let setup = setup_from_c(lowconf)?;
        let config = create_named_configuration(&setup.name, setup.rmax)?;
        let vis = visibility_from_c(res_vis)?;
        let adv = require_mut(adv, "ARLadvice")?;
        let params = AdviceParams {
            diameter: config.diameter,
            guard_band_image: adv.guard_band_image,
            del_a: adv.delA,
            wprojection_planes: adv.wprojection_planes.max(1) as usize,
            ..Default::default()
        };
        let advice = ctx.install(|| advise_wide_field(&vis, &params))?;
        advice_to_c(&advice, adv)
    });
}

/// Copy `advice` into `adv`, leaving it untouched if a count does not fit
/// in a C int.
fn advice_to_c(advice: &WideFieldAdvice, adv: &mut ARLadvice) -> Result<(), ArlError> {
    let to_c_int = |n: usize, what: &str| {
        c_int::try_from(n).map_err(|_| ArlError::InvalidArgument(format!("advised {what} {n} does not fit in a C int")))
    };
    let vis_slices = to_c_int(advice.vis_slices, "vis_slices")?;
    let npixel = to_c_int(advice.npixel, "npixel")?;
    adv.vis_slices = vis_slices;
    adv.npixel = npixel;
    adv.cellsize = advice.cellsize;
    Ok(())
}

/// The extended Stokes I test image at one frequency.
///
/// # Safety
/// `frequency` must point to one double, `phasecentre` must be a
/// NUL-terminated phase centre descriptor and `res_img` a valid output
/// `Image` sized by `helper_get_image_shape`.
#[no_mangle]
pub unsafe extern "C" fn arl_create_test_image(
    frequency: *const f64,
    cellsize: f64,
    phasecentre: *mut c_char,
    res_img: *mut ARLImage,
) {
    ffi_entry("arl_create_test_image", |ctx| {
        let frequency = *require(frequency, "frequency")?;
        let phase_centre = PhaseCentre::from_json(read_c_str(phasecentre, "phasecentre")?)?;
        let image =
            ctx.install(|| create_test_image(&[frequency], cellsize, phase_centre, PolarisationFrame::StokesI))?;
        image_to_c(&image, res_img)
    });
}

/// A point-source sky over the frequencies of `lowconf`, shape
/// `[nfreqs, 1, npixel, npixel]`.
///
/// # Safety
/// All pointers must be valid; `phasecentre` must be a NUL-terminated
/// phase centre descriptor.
#[no_mangle]
pub unsafe extern "C" fn arl_create_low_test_image_from_gleam(
    lowconf: *mut ARLConf,
    cellsize: f64,
    npixel: c_int,
    phasecentre: *mut c_char,
    res_img: *mut ARLImage,
) {
    ffi_entry("arl_create_low_test_image_from_gleam", |ctx| {
        let setup = setup_from_c(lowconf)?;
        if npixel <= 0 {
            return Err(ArlError::InvalidArgument(format!("npixel {npixel} must be positive")));
        }
        let phase_centre = PhaseCentre::from_json(read_c_str(phasecentre, "phasecentre")?)?;
        let image = ctx.install(|| {
            create_low_test_image_from_gleam(
                &setup.frequency,
                &setup.channel_bandwidth,
                cellsize,
                npixel as usize,
                phase_centre,
                GLEAM_FLUX_LIMIT,
                PolarisationFrame::StokesI,
                InsertMethod::Nearest,
                false,
            )
        })?;
        image_to_c(&image, res_img)
    });
}

/// Add the visibilities predicted from `img` to those of `visin`, writing
/// the sum to `visout`.
///
/// # Safety
/// All pointers must be valid.
#[no_mangle]
pub unsafe extern "C" fn arl_predict_2d(visin: *const ARLVis, img: *const ARLImage, visout: *mut ARLVis) {
    ffi_entry("arl_predict_2d", |ctx| {
        let vis = visibility_from_c(visin)?;
        let model = image_from_c(img)?;
        let predicted = ctx.install(|| predict_2d(&vis, &model))?;
        visibility_to_c(&predicted, visout)
    });
}

/// Dirty image (or PSF when `dopsf`) of `visin` on the grid of `img_in`.
///
/// `sumwt` receives `nchan * npol` summed weights.
///
/// # Safety
/// All pointers must be valid.
#[no_mangle]
pub unsafe extern "C" fn arl_invert_2d(
    visin: *const ARLVis,
    img_in: *const ARLImage,
    dopsf: bool,
    out: *mut ARLImage,
    sumwt: *mut f64,
) {
    ffi_entry("arl_invert_2d", |ctx| {
        invert_with(ctx, ImagingContext::TwoD, visin, img_in, dopsf, out, sumwt)
    });
}

/// As [`arl_invert_2d`], with w-stacking over the configured number of w
/// slices.
///
/// # Safety
/// All pointers must be valid.
#[no_mangle]
pub unsafe extern "C" fn arl_invert_function(
    visin: *const ARLVis,
    img_in: *const ARLImage,
    dopsf: bool,
    out: *mut ARLImage,
    sumwt: *mut f64,
) -> ArlStatus {
    ffi_entry("arl_invert_function", |ctx| {
        let imaging = ImagingContext::WStack {
            vis_slices: ctx.config().vis_slices,
        };
        invert_with(ctx, imaging, visin, img_in, dopsf, out, sumwt)
    })
}

/// A zeroed image matched to `vis`, written into `model`.
///
/// Settings already present in `model` are kept: `data_shape[3]` as the
/// number of pixels (512 if unset), `data_shape[0]` as the number of
/// channels, the cellsize of a valid WCS descriptor, and the polarisation
/// frame descriptor (Stokes I if unset).
///
/// # Safety
/// `vis` must be a valid `ARLVis` and `model` a valid output `Image`.
#[no_mangle]
pub unsafe extern "C" fn arl_create_image_from_visibility(vis: *const ARLVis, model: *mut ARLImage) {
    ffi_entry("arl_create_image_from_visibility", |ctx| {
        let vis = visibility_from_c(vis)?;
        let target = require(model, "Image")?;
        let npixel = match target.data_shape[3] {
            n if n > 0 => n as usize,
            _ => DEFAULT_NPIXEL,
        };
        let nchan = (target.data_shape[0] > 0).then_some(target.data_shape[0] as usize);
        let cellsize = read_optional_descriptor(target.wcs, "Image.wcs")?
            .and_then(|text| Wcs::from_json(&text).ok())
            .map(|wcs| wcs.cellsize())
            .filter(|&c| c > 0.0);
        let frame = match read_optional_descriptor(target.polarisation_frame, "Image.polarisation_frame")? {
            Some(name) => PolarisationFrame::from_name(&name)?,
            None => PolarisationFrame::StokesI,
        };
        let image = ctx.install(|| create_image_from_visibility(&vis, npixel, cellsize, nchan, frame))?;
        image_to_c(&image, model)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advice(vis_slices: usize, npixel: usize) -> WideFieldAdvice {
        WideFieldAdvice {
            vis_slices,
            npixel,
            cellsize: 1e-3,
            primary_beam_fov: 0.1,
            image_fov: 0.2,
            uvmax: 500.0,
            wmax: 200.0,
            w_sampling: 4.0,
        }
    }

    fn blank() -> ARLadvice {
        ARLadvice {
            vis_slices: -1,
            npixel: -1,
            cellsize: 0.0,
            guard_band_image: 4.0,
            delA: 0.02,
            wprojection_planes: 1,
        }
    }

    #[test]
    fn test_advice_to_c() {
        let mut adv = blank();
        advice_to_c(&advice(61, 1024), &mut adv).unwrap();
        assert_eq!((adv.vis_slices, adv.npixel, adv.cellsize), (61, 1024, 1e-3));
    }

    #[test]
    fn test_advice_too_large_for_c_int() {
        let huge = c_int::MAX as usize + 1;
        for oversized in [advice(huge, 256), advice(3, huge)] {
            let mut adv = blank();
            assert!(matches!(
                advice_to_c(&oversized, &mut adv),
                Err(ArlError::InvalidArgument(_))
            ));
            assert_eq!((adv.vis_slices, adv.npixel, adv.cellsize), (-1, -1, 0.0));
        }
    }
}
