//! Shape and geometry queries used to size buffers before the real calls.

use std::ffi::{c_char, c_int};

use super::convert::{
    check_descriptor, read_c_str, require, require_mut, setup_from_c, visibility_from_c, write_descriptor,
};
use super::status::ffi_entry;
use super::types::{ant_t, ARLConf, ARLImage, ARLVis};
use crate::data::{create_named_configuration, PolarisationFrame};
use crate::error::ArlError;
use crate::imaging::{create_image_from_visibility, DEFAULT_NPIXEL};
use crate::simulation::test_image_shape;

unsafe fn write_shape(out: *mut c_int, shape: [usize; 4]) -> Result<(), ArlError> {
    let out = require_mut(out as *mut [c_int; 4], "shape")?;
    *out = shape.map(|n| n as c_int);
    Ok(())
}

unsafe fn count_antennas(name: *const c_char, rmax: Option<f64>, out: *mut ant_t) -> Result<(), ArlError> {
    let name = read_c_str(name, "configuration name")?;
    let out = require_mut(out, "ant_t")?;
    let config = create_named_configuration(name, rmax)?;
    out.nant = config.nant() as c_int;
    out.nbases = config.nbases() as c_int;
    log::debug!("{name}: {} antennas, {} baselines", out.nant, out.nbases);
    Ok(())
}

/// Shape of the image `arl_create_test_image` produces for one frequency.
///
/// # Safety
/// `frequency` must point to one double and `shape` to four ints.
#[no_mangle]
pub unsafe extern "C" fn helper_get_image_shape(frequency: *const f64, cellsize: f64, shape: *mut c_int) {
    ffi_entry("helper_get_image_shape", |_| {
        require(frequency, "frequency")?;
        if !(cellsize > 0.0) {
            return Err(ArlError::InvalidArgument(format!("cellsize {cellsize} must be positive")));
        }
        write_shape(shape, test_image_shape(1, PolarisationFrame::StokesI))
    });
}

/// Shape of the image `arl_create_low_test_image_from_gleam` produces.
///
/// # Safety
/// `lowconf` must be a valid `ARLConf` and `shape` must point to four ints.
#[no_mangle]
pub unsafe extern "C" fn helper_get_image_shape_multifreq(
    lowconf: *mut ARLConf,
    cellsize: f64,
    npixel: c_int,
    shape: *mut c_int,
) {
    ffi_entry("helper_get_image_shape_multifreq", |_| {
        let setup = setup_from_c(lowconf)?;
        if npixel <= 0 || !(cellsize > 0.0) {
            return Err(ArlError::InvalidArgument(format!(
                "npixel {npixel} and cellsize {cellsize} must be positive"
            )));
        }
        let n = npixel as usize;
        write_shape(shape, [setup.nchan(), 1, n, n])
    });
}

/// Antenna and baseline counts of a named configuration.
///
/// # Safety
/// `name` must be a NUL-terminated string and `out` a valid `ant_t`.
#[no_mangle]
pub unsafe extern "C" fn helper_get_nbases(name: *mut c_char, out: *mut ant_t) {
    ffi_entry("helper_get_nbases", |_| count_antennas(name, None, out));
}

/// As [`helper_get_nbases`], keeping stations within `rmax` metres of the
/// array centre.
///
/// # Safety
/// `name` must be a NUL-terminated string and `out` a valid `ant_t`.
#[no_mangle]
pub unsafe extern "C" fn helper_get_nbases_rmax(name: *mut c_char, rmax: f64, out: *mut ant_t) {
    ffi_entry("helper_get_nbases_rmax", |_| {
        if !(rmax > 0.0) {
            return Err(ArlError::InvalidArgument(format!("rmax {rmax} must be positive")));
        }
        count_antennas(name, Some(rmax), out)
    });
}

/// Fill `image`'s WCS and polarisation frame to match `vis`.
///
/// The image is Stokes I with `data_shape[3]` pixels a side (512 if
/// unset); `data_shape` is written only when it is unset. The pixel buffer
/// is not touched.
///
/// # Safety
/// `vis` must be a valid `ARLVis` and `image` a valid `Image` with
/// descriptor buffers of `ARL_DESCRIPTOR_CAPACITY` bytes.
#[no_mangle]
pub unsafe extern "C" fn helper_set_image_params(vis: *const ARLVis, image: *mut ARLImage) {
    ffi_entry("helper_set_image_params", |_| {
        let vis = visibility_from_c(vis)?;
        let image = require_mut(image, "Image")?;
        let npixel = match image.data_shape[3] {
            n if n > 0 => n as usize,
            _ => DEFAULT_NPIXEL,
        };
        let template = create_image_from_visibility(&vis, npixel, None, None, PolarisationFrame::StokesI)?;

        let wcs = template.wcs.to_json();
        let frame = template.polarisation_frame.name();
        check_descriptor(image.wcs, "Image.wcs", &wcs)?;
        check_descriptor(image.polarisation_frame, "Image.polarisation_frame", frame)?;
        write_descriptor(image.wcs, &wcs);
        write_descriptor(image.polarisation_frame, frame);
        if image.data_shape.iter().any(|&n| n <= 0) {
            image.data_shape = template.shape().map(|n| n as c_int);
        }
        Ok(())
    });
}
