//! C-compatible type definitions for FFI.
//!
//! The layouts match `arlwrap.h`. Visibility records are reached only
//! through [`VisRecords`] / [`VisRecordsMut`], which check `npol` before
//! reinterpreting `ARLVis.data`.

#![allow(non_camel_case_types, non_snake_case)]

use std::ffi::{c_char, c_int, c_void};
use std::mem::{offset_of, size_of};

use num_complex::Complex32;
use static_assertions::const_assert_eq;

use crate::error::ArlError;
use crate::runtime::ArlConfig;

/// Capacity in bytes of every descriptor buffer (`phasecentre`, `wcs`,
/// `polarisation_frame`) written by the library, including the NUL.
pub const ARL_DESCRIPTOR_CAPACITY: usize = 1024;

/// Result of the last call made on this thread.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArlStatus {
    /// Operation succeeded.
    Ok = 0,
    /// Null pointer was passed.
    NullPointer = 1,
    /// Invalid argument, shape or descriptor.
    InvalidArgument = 2,
    /// An output buffer is smaller than the result.
    BufferTooSmall = 3,
    /// Invalid UTF-8 string.
    InvalidUtf8 = 4,
    /// The library has not been initialised.
    NotInitialised = 5,
    /// Internal failure, including a caught panic.
    InternalError = 6,
}

impl From<&ArlError> for ArlStatus {
    fn from(err: &ArlError) -> Self {
        match err {
            ArlError::NotInitialised => ArlStatus::NotInitialised,
            ArlError::NullPointer(_) => ArlStatus::NullPointer,
            ArlError::BufferTooSmall { .. } => ArlStatus::BufferTooSmall,
            ArlError::InvalidUtf8(_) => ArlStatus::InvalidUtf8,
            ArlError::InvalidPolarisationCount(_)
            | ArlError::UnknownPolarisationFrame(_)
            | ArlError::UnknownConfiguration(_)
            | ArlError::ShapeMismatch(_)
            | ArlError::InvalidArgument(_)
            | ArlError::Descriptor { .. }
            | ArlError::MissingCoalesceIndex => ArlStatus::InvalidArgument,
            ArlError::ThreadPool(_)
            | ArlError::Deconvolution(_)
            | ArlError::AllocationFailed { .. } => ArlStatus::InternalError,
        }
    }
}

/// A set of visibility records.
///
/// `data` points to `nvis` records of the layout selected by `npol`
/// (`ARLVisEntryP1`, `ARLVisEntryP2` or `ARLVisEntryP4`). For outputs,
/// `nvis` gives the capacity on entry and the written count on return.
#[repr(C)]
#[derive(Debug)]
pub struct ARLVis {
    pub nvis: usize,
    pub npol: c_int,
    pub data: *mut c_void,
    pub phasecentre: *mut c_char,
}

/// One single-polarisation visibility record.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ARLVisEntryP1 {
    pub uvw: [f64; 3],
    pub time: f64,
    pub freq: f64,
    pub bw: f64,
    pub intgt: f64,
    pub a1: c_int,
    pub a2: c_int,
    pub vis: [Complex32; 1],
    pub wght: [f32; 1],
    pub imgwght: [f32; 1],
}

/// One dual-polarisation visibility record.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ARLVisEntryP2 {
    pub uvw: [f64; 3],
    pub time: f64,
    pub freq: f64,
    pub bw: f64,
    pub intgt: f64,
    pub a1: c_int,
    pub a2: c_int,
    pub vis: [Complex32; 2],
    pub wght: [f32; 2],
    pub imgwght: [f32; 2],
}

/// One full-polarisation visibility record.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ARLVisEntryP4 {
    pub uvw: [f64; 3],
    pub time: f64,
    pub freq: f64,
    pub bw: f64,
    pub intgt: f64,
    pub a1: c_int,
    pub a2: c_int,
    pub vis: [Complex32; 4],
    pub wght: [f32; 4],
    pub imgwght: [f32; 4],
}

const_assert_eq!(size_of::<ARLVisEntryP1>(), 80);
const_assert_eq!(size_of::<ARLVisEntryP2>(), 96);
const_assert_eq!(size_of::<ARLVisEntryP4>(), 128);
const_assert_eq!(offset_of!(ARLVisEntryP4, time), 24);
const_assert_eq!(offset_of!(ARLVisEntryP4, intgt), 48);
const_assert_eq!(offset_of!(ARLVisEntryP4, a1), 56);
const_assert_eq!(offset_of!(ARLVisEntryP4, vis), 64);
const_assert_eq!(offset_of!(ARLVisEntryP4, wght), 96);
const_assert_eq!(offset_of!(ARLVisEntryP4, imgwght), 112);
const_assert_eq!(offset_of!(ARLVisEntryP2, wght), 80);
const_assert_eq!(offset_of!(ARLVisEntryP1, imgwght), 76);

/// Common access to the three record layouts.
pub trait VisEntry: Copy + Default {
    const NPOL: usize;

    fn header(&self) -> EntryHeader;
    fn set_header(&mut self, header: &EntryHeader);
    fn vis(&self) -> &[Complex32];
    fn vis_mut(&mut self) -> &mut [Complex32];
    fn wght(&self) -> &[f32];
    fn wght_mut(&mut self) -> &mut [f32];
    fn imgwght(&self) -> &[f32];
    fn imgwght_mut(&mut self) -> &mut [f32];
}

/// The polarisation-independent fields of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EntryHeader {
    pub uvw: [f64; 3],
    pub time: f64,
    pub freq: f64,
    pub bw: f64,
    pub intgt: f64,
    pub a1: c_int,
    pub a2: c_int,
}

macro_rules! impl_vis_entry {
    ($entry:ty, $npol:expr) => {
        impl VisEntry for $entry {
            const NPOL: usize = $npol;

            fn header(&self) -> EntryHeader {
                EntryHeader {
                    uvw: self.uvw,
                    time: self.time,
                    freq: self.freq,
                    bw: self.bw,
                    intgt: self.intgt,
                    a1: self.a1,
                    a2: self.a2,
                }
            }

            fn set_header(&mut self, h: &EntryHeader) {
                self.uvw = h.uvw;
                self.time = h.time;
                self.freq = h.freq;
                self.bw = h.bw;
                self.intgt = h.intgt;
                self.a1 = h.a1;
                self.a2 = h.a2;
            }

            fn vis(&self) -> &[Complex32] {
                &self.vis
            }

            fn vis_mut(&mut self) -> &mut [Complex32] {
                &mut self.vis
            }

            fn wght(&self) -> &[f32] {
                &self.wght
            }

            fn wght_mut(&mut self) -> &mut [f32] {
                &mut self.wght
            }

            fn imgwght(&self) -> &[f32] {
                &self.imgwght
            }

            fn imgwght_mut(&mut self) -> &mut [f32] {
                &mut self.imgwght
            }
        }
    };
}

impl_vis_entry!(ARLVisEntryP1, 1);
impl_vis_entry!(ARLVisEntryP2, 2);
impl_vis_entry!(ARLVisEntryP4, 4);

/// Record size in bytes for a polarisation count.
pub fn vis_entry_size(npol: c_int) -> Result<usize, ArlError> {
    match npol {
        1 => Ok(size_of::<ARLVisEntryP1>()),
        2 => Ok(size_of::<ARLVisEntryP2>()),
        4 => Ok(size_of::<ARLVisEntryP4>()),
        n => Err(ArlError::InvalidPolarisationCount(n)),
    }
}

/// Read-only typed view of `ARLVis.data`.
#[derive(Debug, Clone, Copy)]
pub enum VisRecords<'a> {
    P1(&'a [ARLVisEntryP1]),
    P2(&'a [ARLVisEntryP2]),
    P4(&'a [ARLVisEntryP4]),
}

/// Mutable typed view of `ARLVis.data`.
#[derive(Debug)]
pub enum VisRecordsMut<'a> {
    P1(&'a mut [ARLVisEntryP1]),
    P2(&'a mut [ARLVisEntryP2]),
    P4(&'a mut [ARLVisEntryP4]),
}

impl<'a> VisRecords<'a> {
    /// View the `nvis` records of `vis`.
    ///
    /// # Safety
    /// `vis.data` must point to `vis.nvis` records of the layout given by
    /// `vis.npol`, valid for `'a`.
    pub unsafe fn from_raw(vis: &ARLVis) -> Result<Self, ArlError> {
        Self::with_len(vis, vis.nvis)
    }

    /// View the first `len` records of `vis`.
    ///
    /// # Safety
    /// As [`from_raw`](Self::from_raw), with `len` records.
    pub unsafe fn with_len(vis: &ARLVis, len: usize) -> Result<Self, ArlError> {
        vis_entry_size(vis.npol)?;
        if len > 0 && vis.data.is_null() {
            return Err(ArlError::NullPointer("ARLVis.data"));
        }
        Ok(match vis.npol {
            1 => VisRecords::P1(slice_or_empty(vis.data as *const ARLVisEntryP1, len)),
            2 => VisRecords::P2(slice_or_empty(vis.data as *const ARLVisEntryP2, len)),
            _ => VisRecords::P4(slice_or_empty(vis.data as *const ARLVisEntryP4, len)),
        })
    }

    pub fn len(&self) -> usize {
        match self {
            VisRecords::P1(r) => r.len(),
            VisRecords::P2(r) => r.len(),
            VisRecords::P4(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn npol(&self) -> usize {
        match self {
            VisRecords::P1(_) => 1,
            VisRecords::P2(_) => 2,
            VisRecords::P4(_) => 4,
        }
    }
}

impl<'a> VisRecordsMut<'a> {
    /// Mutable view of the first `len` records of `vis`.
    ///
    /// # Safety
    /// `vis.data` must point to at least `len` writable records of the
    /// layout given by `vis.npol`, valid for `'a` and not aliased.
    pub unsafe fn with_len(vis: &ARLVis, len: usize) -> Result<Self, ArlError> {
        vis_entry_size(vis.npol)?;
        if len > 0 && vis.data.is_null() {
            return Err(ArlError::NullPointer("ARLVis.data"));
        }
        Ok(match vis.npol {
            1 => VisRecordsMut::P1(slice_mut_or_empty(vis.data as *mut ARLVisEntryP1, len)),
            2 => VisRecordsMut::P2(slice_mut_or_empty(vis.data as *mut ARLVisEntryP2, len)),
            _ => VisRecordsMut::P4(slice_mut_or_empty(vis.data as *mut ARLVisEntryP4, len)),
        })
    }

    pub fn len(&self) -> usize {
        match self {
            VisRecordsMut::P1(r) => r.len(),
            VisRecordsMut::P2(r) => r.len(),
            VisRecordsMut::P4(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero every field of every record.
    pub fn clear(&mut self) {
        match self {
            VisRecordsMut::P1(r) => r.fill(ARLVisEntryP1::default()),
            VisRecordsMut::P2(r) => r.fill(ARLVisEntryP2::default()),
            VisRecordsMut::P4(r) => r.fill(ARLVisEntryP4::default()),
        }
    }

    /// Copy records of the same layout from `src`.
    pub fn copy_from(&mut self, src: &VisRecords<'_>) -> Result<(), ArlError> {
        match (self, src) {
            (VisRecordsMut::P1(d), VisRecords::P1(s)) if d.len() == s.len() => d.copy_from_slice(s),
            (VisRecordsMut::P2(d), VisRecords::P2(s)) if d.len() == s.len() => d.copy_from_slice(s),
            (VisRecordsMut::P4(d), VisRecords::P4(s)) if d.len() == s.len() => d.copy_from_slice(s),
            (dst, src) => {
                return Err(ArlError::ShapeMismatch(format!(
                    "cannot copy {} records of {} polarisations into {} records",
                    src.len(),
                    src.npol(),
                    dst.len()
                )))
            }
        }
        Ok(())
    }
}

unsafe fn slice_or_empty<'a, T>(ptr: *const T, len: usize) -> &'a [T] {
    if len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, len)
    }
}

unsafe fn slice_mut_or_empty<'a, T>(ptr: *mut T, len: usize) -> &'a mut [T] {
    if len == 0 {
        &mut []
    } else {
        std::slice::from_raw_parts_mut(ptr, len)
    }
}

/// An image cube of doubles, shape `[nchan, npol, ny, nx]`.
///
/// Exported to C as `Image`. For outputs, `size` gives the capacity of
/// `data` in elements on entry and the written count on return.
#[repr(C)]
#[derive(Debug)]
pub struct ARLImage {
    pub size: usize,
    pub data_shape: [c_int; 4],
    pub data: *mut c_void,
    pub wcs: *mut c_char,
    pub polarisation_frame: *mut c_char,
}

/// Observation set-up used to synthesise visibilities.
#[repr(C)]
#[derive(Debug)]
pub struct ARLConf {
    pub confname: *mut c_char,
    /// Phase centre right ascension \[degrees\].
    pub pc_ra: f64,
    /// Phase centre declination \[degrees\].
    pub pc_dec: f64,
    /// Hour angles \[radians\].
    pub times: *mut f64,
    pub ntimes: c_int,
    /// \[Hz\]
    pub freqs: *mut f64,
    pub nfreqs: c_int,
    /// \[Hz\]
    pub channel_bandwidth: *mut f64,
    pub nchanwidth: c_int,
    pub nbases: c_int,
    pub nant: c_int,
    pub npol: c_int,
    /// Maximum station distance from the array centre \[metres\]; 0 keeps all.
    pub rmax: f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ant_t {
    pub nant: c_int,
    pub nbases: c_int,
}

/// Wide-field imaging advice.
///
/// `guard_band_image`, `delA` and `wprojection_planes` are inputs;
/// `vis_slices`, `npixel` and `cellsize` are written.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ARLadvice {
    pub vis_slices: c_int,
    pub npixel: c_int,
    pub cellsize: f64,
    pub guard_band_image: f64,
    pub delA: f64,
    pub wprojection_planes: c_int,
}

/// A gain table.
///
/// `gain` holds a `nrec x nrec` Jones matrix per row, antenna and channel,
/// `nrows * nant * nchan * nrec * nrec` values in all. `weight` holds
/// `nrows * nant * nchan * nrec`, `residual` holds `nrows * nchan * nrec`,
/// and `time` holds `nrows`.
#[repr(C)]
#[derive(Debug)]
pub struct ARLGt {
    pub nrows: c_int,
    pub nant: c_int,
    pub nchan: c_int,
    pub nrec: c_int,
    pub time: *mut f64,
    pub gain: *mut Complex32,
    pub weight: *mut f32,
    pub residual: *mut f32,
}

/// Configuration for `arl_initialize_with_config`. Zero fields take the
/// environment or built-in defaults.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ARLRuntimeConfig {
    /// Number of worker threads (0 = auto-detect).
    pub worker_count: usize,
    /// Number of w slices for wide-field prediction (0 = default).
    pub vis_slices: c_int,
}

impl From<ARLRuntimeConfig> for ArlConfig {
    fn from(c: ARLRuntimeConfig) -> Self {
        let mut config = ArlConfig::from_env();
        if c.worker_count > 0 {
            config.worker_count = c.worker_count;
        }
        if c.vis_slices > 0 {
            config.vis_slices = c.vis_slices as usize;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ArlStatus::from(&ArlError::NotInitialised), ArlStatus::NotInitialised);
        assert_eq!(
            ArlStatus::from(&ArlError::BufferTooSmall {
                what: "x",
                needed: 2,
                available: 1
            }),
            ArlStatus::BufferTooSmall
        );
        assert_eq!(
            ArlStatus::from(&ArlError::InvalidPolarisationCount(3)),
            ArlStatus::InvalidArgument
        );
        assert_eq!(
            ArlStatus::from(&ArlError::Deconvolution("x".into())),
            ArlStatus::InternalError
        );
    }

    #[test]
    fn test_records_view_checks_npol() {
        let mut entries = [ARLVisEntryP2::default(); 3];
        let vis = ARLVis {
            nvis: 3,
            npol: 2,
            data: entries.as_mut_ptr() as *mut c_void,
            phasecentre: std::ptr::null_mut(),
        };
        let records = unsafe { VisRecords::from_raw(&vis) }.unwrap();
        assert_eq!((records.len(), records.npol()), (3, 2));

        let bad = ARLVis { npol: 3, ..vis };
        assert!(matches!(
            unsafe { VisRecords::from_raw(&bad) },
            Err(ArlError::InvalidPolarisationCount(3))
        ));
        let null = ARLVis {
            nvis: 1,
            npol: 1,
            data: std::ptr::null_mut(),
            phasecentre: std::ptr::null_mut(),
        };
        assert!(matches!(
            unsafe { VisRecords::from_raw(&null) },
            Err(ArlError::NullPointer(_))
        ));
    }

    #[test]
    fn test_copy_from_requires_same_layout() {
        let mut src = [ARLVisEntryP1::default(); 2];
        src[1].a2 = 5;
        let mut dst = [ARLVisEntryP1::default(); 2];
        let src_vis = ARLVis {
            nvis: 2,
            npol: 1,
            data: src.as_mut_ptr() as *mut c_void,
            phasecentre: std::ptr::null_mut(),
        };
        let dst_vis = ARLVis {
            nvis: 2,
            npol: 1,
            data: dst.as_mut_ptr() as *mut c_void,
            phasecentre: std::ptr::null_mut(),
        };
        unsafe {
            let records = VisRecords::from_raw(&src_vis).unwrap();
            VisRecordsMut::with_len(&dst_vis, 2)
                .unwrap()
                .copy_from(&records)
                .unwrap();
        }
        assert_eq!(dst[1].a2, 5);
    }

    #[test]
    fn test_runtime_config_zero_means_default() {
        let config: ArlConfig = ARLRuntimeConfig {
            worker_count: 3,
            vis_slices: 0,
        }
        .into();
        assert_eq!(config.worker_count, 3);
        assert!(config.vis_slices > 0);
    }
}
