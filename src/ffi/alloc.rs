//! Library-owned buffers for callers that do not manage their own.
//!
//! Memory comes from the C allocator, zeroed, so it can also be released
//! with `free()` by the caller. Descriptor buffers are
//! [`ARL_DESCRIPTOR_CAPACITY`] bytes.

use std::ffi::{c_char, c_int, c_void};

use super::convert::{checked_product, image_shape, require, require_mut};
use super::status::ffi_call;
use super::types::{vis_entry_size, ARLImage, ARLVis, ArlStatus, ARL_DESCRIPTOR_CAPACITY};
use crate::error::ArlError;

unsafe fn calloc(count: usize, size: usize, what: &'static str) -> Result<*mut c_void, ArlError> {
    let bytes = count.checked_mul(size).ok_or(ArlError::AllocationFailed {
        what,
        bytes: usize::MAX,
    })?;
    // calloc(0, _) may return NULL; always ask for at least one element.
    let ptr = libc::calloc(count.max(1), size.max(1));
    if ptr.is_null() {
        return Err(ArlError::AllocationFailed { what, bytes });
    }
    Ok(ptr)
}

unsafe fn free_and_null<T>(ptr: &mut *mut T) {
    if !ptr.is_null() {
        libc::free(*ptr as *mut c_void);
        *ptr = std::ptr::null_mut();
    }
}

/// Allocate zeroed storage for `nvis` records of `npol` polarisations and a
/// phase centre descriptor, and point `vis` at it.
///
/// Any pointers already in `vis` are overwritten, not freed.
///
/// # Safety
/// `vis` must be a valid pointer to an `ARLVis`.
#[no_mangle]
pub unsafe extern "C" fn arl_visibility_alloc(vis: *mut ARLVis, nvis: usize, npol: c_int) -> ArlStatus {
    ffi_call("arl_visibility_alloc", || {
        let vis = require_mut(vis, "ARLVis")?;
        let entry = vis_entry_size(npol)?;
        let data = calloc(nvis, entry, "ARLVis.data")?;
        let phasecentre = match calloc(ARL_DESCRIPTOR_CAPACITY, 1, "ARLVis.phasecentre") {
            Ok(p) => p,
            Err(e) => {
                libc::free(data);
                return Err(e);
            }
        };
        vis.nvis = nvis;
        vis.npol = npol;
        vis.data = data;
        vis.phasecentre = phasecentre as *mut c_char;
        log::debug!("arl_visibility_alloc: {nvis} records of {entry} bytes");
        Ok(())
    })
}

/// Release storage obtained from [`arl_visibility_alloc`] and reset the
/// pointers to NULL. A null `vis` is ignored.
///
/// # Safety
/// `vis` must be null or point to an `ARLVis` whose pointers are null or
/// were allocated with the C allocator.
#[no_mangle]
pub unsafe extern "C" fn arl_visibility_free(vis: *mut ARLVis) {
    if let Some(vis) = vis.as_mut() {
        free_and_null(&mut vis.data);
        free_and_null(&mut vis.phasecentre);
        vis.nvis = 0;
    }
}

/// Allocate a zeroed image of `shape` (`[nchan, npol, ny, nx]`) with WCS and
/// polarisation frame descriptor buffers, and point `image` at it.
///
/// # Safety
/// `image` must be a valid pointer to an `Image` and `shape` to four ints.
#[no_mangle]
pub unsafe extern "C" fn arl_image_alloc(image: *mut ARLImage, shape: *const c_int) -> ArlStatus {
    ffi_call("arl_image_alloc", || {
        let image = require_mut(image, "Image")?;
        let shape = *require(shape as *const [c_int; 4], "image shape")?;
        let n = checked_product(&image_shape(&shape)?, "Image")?;

        let data = calloc(n, std::mem::size_of::<f64>(), "Image.data")?;
        let wcs = match calloc(ARL_DESCRIPTOR_CAPACITY, 1, "Image.wcs") {
            Ok(p) => p,
            Err(e) => {
                libc::free(data);
                return Err(e);
            }
        };
        let frame = match calloc(ARL_DESCRIPTOR_CAPACITY, 1, "Image.polarisation_frame") {
            Ok(p) => p,
            Err(e) => {
                libc::free(data);
                libc::free(wcs);
                return Err(e);
            }
        };
        image.size = n;
        image.data_shape = shape;
        image.data = data;
        image.wcs = wcs as *mut c_char;
        image.polarisation_frame = frame as *mut c_char;
        log::debug!("arl_image_alloc: {shape:?}");
        Ok(())
    })
}

/// Release storage obtained from [`arl_image_alloc`] and reset the pointers
/// to NULL. A null `image` is ignored.
///
/// # Safety
/// `image` must be null or point to an `Image` whose pointers are null or
/// were allocated with the C allocator.
#[no_mangle]
pub unsafe extern "C" fn arl_image_free(image: *mut ARLImage) {
    if let Some(image) = image.as_mut() {
        free_and_null(&mut image.data);
        free_and_null(&mut image.wcs);
        free_and_null(&mut image.polarisation_frame);
        image.size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::types::ARLVisEntryP4;

    fn empty_vis() -> ARLVis {
        ARLVis {
            nvis: 0,
            npol: 0,
            data: std::ptr::null_mut(),
            phasecentre: std::ptr::null_mut(),
        }
    }

    #[test]
    fn test_visibility_alloc_free() {
        let mut vis = empty_vis();
        unsafe {
            assert_eq!(arl_visibility_alloc(&mut vis, 10, 4), ArlStatus::Ok);
            assert_eq!((vis.nvis, vis.npol), (10, 4));
            let records = std::slice::from_raw_parts(vis.data as *const ARLVisEntryP4, 10);
            assert!(records.iter().all(|r| r.a1 == 0 && r.time == 0.0));
            assert_eq!(*vis.phasecentre, 0);

            arl_visibility_free(&mut vis);
            assert!(vis.data.is_null() && vis.phasecentre.is_null());
            assert_eq!(vis.nvis, 0);
            arl_visibility_free(&mut vis);
            arl_visibility_free(std::ptr::null_mut());
        }
    }

    #[test]
    fn test_visibility_alloc_rejects_npol() {
        let mut vis = empty_vis();
        let status = unsafe { arl_visibility_alloc(&mut vis, 10, 3) };
        assert_eq!(status, ArlStatus::InvalidArgument);
        assert!(vis.data.is_null());
    }

    #[test]
    fn test_image_alloc_free() {
        let mut image = ARLImage {
            size: 0,
            data_shape: [0; 4],
            data: std::ptr::null_mut(),
            wcs: std::ptr::null_mut(),
            polarisation_frame: std::ptr::null_mut(),
        };
        let shape: [c_int; 4] = [2, 1, 8, 8];
        unsafe {
            assert_eq!(arl_image_alloc(&mut image, shape.as_ptr()), ArlStatus::Ok);
            assert_eq!(image.size, 128);
            assert_eq!(image.data_shape, shape);
            let pixels = std::slice::from_raw_parts(image.data as *const f64, 128);
            assert!(pixels.iter().all(|&p| p == 0.0));
            arl_image_free(&mut image);
            assert!(image.data.is_null() && image.wcs.is_null() && image.polarisation_frame.is_null());
        }

        let bad: [c_int; 4] = [1, 1, 0, 8];
        assert_eq!(
            unsafe { arl_image_alloc(&mut image, bad.as_ptr()) },
            ArlStatus::InvalidArgument
        );
    }
}
