//! Conversion between the C structures and the Rust data model.
//!
//! Readers validate everything they touch. Writers check every capacity
//! before the first byte is written, so a failed call leaves its outputs
//! as they were.

use std::ffi::{c_char, c_int, CStr};

use ndarray::prelude::*;
use num_complex::{Complex32, Complex64};

use super::types::{
    ARLConf, ARLGt, ARLImage, ARLVis, VisEntry, VisRecords, VisRecordsMut, ARL_DESCRIPTOR_CAPACITY,
};
use crate::data::{
    BlockVisibility, GainTable, Image, PhaseCentre, PolarisationFrame, Visibility, Wcs,
};
use crate::error::ArlError;

/// Observation set-up read from an `ARLConf`.
#[derive(Debug, Clone)]
pub struct ObservationSetup {
    pub name: String,
    pub phase_centre: PhaseCentre,
    /// Hour angles \[radians\].
    pub times: Vec<f64>,
    pub frequency: Vec<f64>,
    pub channel_bandwidth: Vec<f64>,
    pub polarisation_frame: PolarisationFrame,
    pub rmax: Option<f64>,
    /// Antenna count declared by the caller, if any.
    pub nant: Option<usize>,
}

impl ObservationSetup {
    pub fn ntimes(&self) -> usize {
        self.times.len()
    }

    pub fn nchan(&self) -> usize {
        self.frequency.len()
    }
}

/// Dereference a required input pointer.
pub(crate) unsafe fn require<'a, T>(ptr: *const T, what: &'static str) -> Result<&'a T, ArlError> {
    ptr.as_ref().ok_or(ArlError::NullPointer(what))
}

/// Dereference a required output pointer.
pub(crate) unsafe fn require_mut<'a, T>(ptr: *mut T, what: &'static str) -> Result<&'a mut T, ArlError> {
    ptr.as_mut().ok_or(ArlError::NullPointer(what))
}

/// Read a NUL-terminated string argument.
pub(crate) unsafe fn read_c_str<'a>(ptr: *const c_char, what: &'static str) -> Result<&'a str, ArlError> {
    if ptr.is_null() {
        return Err(ArlError::NullPointer(what));
    }
    CStr::from_ptr(ptr).to_str().map_err(|_| ArlError::InvalidUtf8(what))
}

/// Read a descriptor buffer that may be empty or uninitialised.
///
/// Returns `None` for a null pointer, an empty string, or a buffer with no
/// NUL within [`ARL_DESCRIPTOR_CAPACITY`] bytes.
pub(crate) unsafe fn read_optional_descriptor(
    ptr: *const c_char,
    what: &'static str,
) -> Result<Option<String>, ArlError> {
    if ptr.is_null() {
        return Ok(None);
    }
    let ptr = ptr as *const u8;
    let Some(len) = (0..ARL_DESCRIPTOR_CAPACITY).find(|&i| *ptr.add(i) == 0) else {
        return Ok(None);
    };
    if len == 0 {
        return Ok(None);
    }
    let bytes = std::slice::from_raw_parts(ptr, len);
    let text = std::str::from_utf8(bytes).map_err(|_| ArlError::InvalidUtf8(what))?;
    Ok(Some(text.to_string()))
}

/// Check that `text` fits a descriptor buffer.
pub(crate) fn check_descriptor(ptr: *const c_char, what: &'static str, text: &str) -> Result<(), ArlError> {
    if ptr.is_null() {
        return Err(ArlError::NullPointer(what));
    }
    if text.len() + 1 > ARL_DESCRIPTOR_CAPACITY {
        return Err(ArlError::BufferTooSmall {
            what,
            needed: text.len() + 1,
            available: ARL_DESCRIPTOR_CAPACITY,
        });
    }
    Ok(())
}

/// Copy `text` and a terminating NUL into a checked descriptor buffer.
pub(crate) unsafe fn write_descriptor(ptr: *mut c_char, text: &str) {
    std::ptr::copy_nonoverlapping(text.as_ptr(), ptr as *mut u8, text.len());
    *ptr.add(text.len()) = 0;
}

unsafe fn read_doubles(ptr: *const f64, len: c_int, what: &'static str) -> Result<Vec<f64>, ArlError> {
    if len <= 0 {
        return Err(ArlError::InvalidArgument(format!("{what} must have at least one value, got {len}")));
    }
    if ptr.is_null() {
        return Err(ArlError::NullPointer(what));
    }
    Ok(std::slice::from_raw_parts(ptr, len as usize).to_vec())
}

/// Read an `ARLConf`.
pub(crate) unsafe fn setup_from_c(conf: *const ARLConf) -> Result<ObservationSetup, ArlError> {
    let conf = require(conf, "ARLConf")?;
    let name = read_c_str(conf.confname, "ARLConf.confname")?.to_string();
    let times = read_doubles(conf.times, conf.ntimes, "ARLConf.times")?;
    let frequency = read_doubles(conf.freqs, conf.nfreqs, "ARLConf.freqs")?;
    let channel_bandwidth = read_doubles(conf.channel_bandwidth, conf.nchanwidth, "ARLConf.channel_bandwidth")?;
    if channel_bandwidth.len() != frequency.len() {
        return Err(ArlError::ShapeMismatch(format!(
            "{} channel bandwidths for {} frequencies",
            channel_bandwidth.len(),
            frequency.len()
        )));
    }
    Ok(ObservationSetup {
        name,
        phase_centre: PhaseCentre::new(conf.pc_ra, conf.pc_dec),
        times,
        frequency,
        channel_bandwidth,
        polarisation_frame: PolarisationFrame::for_visibility_npol(conf.npol)?,
        rmax: (conf.rmax > 0.0).then_some(conf.rmax),
        nant: (conf.nant > 0).then_some(conf.nant as usize),
    })
}

fn to_c32(v: Complex64) -> Complex32 {
    Complex32::new(v.re as f32, v.im as f32)
}

fn to_c64(v: Complex32) -> Complex64 {
    Complex64::new(v.re as f64, v.im as f64)
}

fn fill_visibility<E: VisEntry>(entries: &[E], vis: &mut Visibility) {
    for (row, e) in entries.iter().enumerate() {
        let h = e.header();
        for k in 0..3 {
            vis.uvw[[row, k]] = h.uvw[k];
        }
        vis.time[row] = h.time;
        vis.frequency[row] = h.freq;
        vis.channel_bandwidth[row] = h.bw;
        vis.integration_time[row] = h.intgt;
        vis.antenna1[row] = h.a1;
        vis.antenna2[row] = h.a2;
        for p in 0..E::NPOL {
            vis.vis[[row, p]] = to_c64(e.vis()[p]);
            vis.weight[[row, p]] = e.wght()[p] as f64;
            vis.imaging_weight[[row, p]] = e.imgwght()[p] as f64;
        }
    }
}

fn fill_entries<E: VisEntry>(vis: &Visibility, entries: &mut [E]) {
    for (row, e) in entries.iter_mut().enumerate() {
        e.set_header(&super::types::EntryHeader {
            uvw: [vis.uvw[[row, 0]], vis.uvw[[row, 1]], vis.uvw[[row, 2]]],
            time: vis.time[row],
            freq: vis.frequency[row],
            bw: vis.channel_bandwidth[row],
            intgt: vis.integration_time[row],
            a1: vis.antenna1[row],
            a2: vis.antenna2[row],
        });
        for p in 0..E::NPOL {
            e.vis_mut()[p] = to_c32(vis.vis[[row, p]]);
            e.wght_mut()[p] = vis.weight[[row, p]] as f32;
            e.imgwght_mut()[p] = vis.imaging_weight[[row, p]] as f32;
        }
    }
}

/// Read an `ARLVis` as per-sample visibilities.
///
/// The frame is the default for the record's polarisation count.
pub(crate) unsafe fn visibility_from_c(vis: *const ARLVis) -> Result<Visibility, ArlError> {
    let vis = require(vis, "ARLVis")?;
    let records = VisRecords::from_raw(vis)?;
    let frame = PolarisationFrame::for_visibility_npol(vis.npol)?;
    let phase_centre = PhaseCentre::from_json(read_c_str(vis.phasecentre, "ARLVis.phasecentre")?)?;

    let mut out = Visibility::zeros(records.len(), frame, phase_centre);
    match records {
        VisRecords::P1(r) => fill_visibility(r, &mut out),
        VisRecords::P2(r) => fill_visibility(r, &mut out),
        VisRecords::P4(r) => fill_visibility(r, &mut out),
    }
    Ok(out)
}

/// Check that `out` can receive `nvis` records of `npol` polarisations.
pub(crate) fn check_vis_output(out: &ARLVis, nvis: usize, npol: usize, what: &'static str) -> Result<(), ArlError> {
    if out.npol != 0 && out.npol as usize != npol {
        return Err(ArlError::ShapeMismatch(format!(
            "{what} declares {} polarisations, result has {npol}",
            out.npol
        )));
    }
    if out.nvis < nvis {
        return Err(ArlError::BufferTooSmall {
            what,
            needed: nvis,
            available: out.nvis,
        });
    }
    if nvis > 0 && out.data.is_null() {
        return Err(ArlError::NullPointer(what));
    }
    Ok(())
}

/// Check that `out` can receive `vis`, without writing anything.
pub(crate) unsafe fn check_visibility_to_c(vis: &Visibility, out: *const ARLVis) -> Result<(), ArlError> {
    let out = require(out, "output ARLVis")?;
    check_vis_output(out, vis.nvis(), vis.npol(), "output ARLVis.data")?;
    check_descriptor(out.phasecentre, "output ARLVis.phasecentre", &vis.phase_centre.to_json())
}

/// Write per-sample visibilities into `out`.
pub(crate) unsafe fn visibility_to_c(vis: &Visibility, out: *mut ARLVis) -> Result<(), ArlError> {
    check_visibility_to_c(vis, out)?;
    let out = require_mut(out, "output ARLVis")?;
    let descriptor = vis.phase_centre.to_json();

    out.npol = vis.npol() as c_int;
    match VisRecordsMut::with_len(out, vis.nvis())? {
        VisRecordsMut::P1(r) => fill_entries(vis, r),
        VisRecordsMut::P2(r) => fill_entries(vis, r),
        VisRecordsMut::P4(r) => fill_entries(vis, r),
    }
    write_descriptor(out.phasecentre, &descriptor);
    out.nvis = vis.nvis();
    Ok(())
}

/// Read an `ARLVis` holding a block of `ntimes * nbases * nchan` records
/// in `[time][baseline][channel]` order.
///
/// Axis values are taken from the first record along each axis, and every
/// other record must repeat them. When `nant` is not given it is one more
/// than the largest antenna index.
pub(crate) unsafe fn block_from_c(
    vis: *const ARLVis,
    ntimes: usize,
    nchan: usize,
    nant: Option<usize>,
) -> Result<BlockVisibility, ArlError> {
    let flat = visibility_from_c(vis)?;
    let nvis = flat.nvis();
    if ntimes == 0 || nchan == 0 || nvis == 0 || nvis % (ntimes * nchan) != 0 {
        return Err(ArlError::ShapeMismatch(format!(
            "{nvis} records do not form a block of {ntimes} times and {nchan} channels"
        )));
    }
    let nbl = nvis / (ntimes * nchan);
    let row = |t: usize, b: usize, c: usize| (t * nbl + b) * nchan + c;

    let baselines: Vec<(usize, usize)> = (0..nbl)
        .map(|b| {
            let r = row(0, b, 0);
            (flat.antenna1[r].max(0) as usize, flat.antenna2[r].max(0) as usize)
        })
        .collect();
    let max_ant = baselines.iter().map(|&(a1, a2)| a1.max(a2) + 1).max().unwrap_or(0);
    let nant = nant.unwrap_or(max_ant).max(max_ant);
    let time: Array1<f64> = (0..ntimes).map(|t| flat.time[row(t, 0, 0)]).collect();
    let frequency: Array1<f64> = (0..nchan).map(|c| flat.frequency[row(0, 0, c)]).collect();

    for t in 0..ntimes {
        for (b, &(a1, a2)) in baselines.iter().enumerate() {
            for c in 0..nchan {
                let r = row(t, b, c);
                let pair = (flat.antenna1[r].max(0) as usize, flat.antenna2[r].max(0) as usize);
                if flat.time[r] != time[t] || pair != (a1, a2) || flat.frequency[r] != frequency[c] {
                    return Err(ArlError::ShapeMismatch(format!(
                        "record {r} (time {}, baseline {}-{}, frequency {}) is out of block order, \
                         expected time {}, baseline {a1}-{a2}, frequency {}",
                        flat.time[r], pair.0, pair.1, flat.frequency[r], time[t], frequency[c]
                    )));
                }
            }
        }
    }

    let mut block = BlockVisibility::zeros(
        nant,
        baselines,
        time,
        (0..ntimes).map(|t| flat.integration_time[row(t, 0, 0)]).collect(),
        frequency,
        (0..nchan).map(|c| flat.channel_bandwidth[row(0, 0, c)]).collect(),
        flat.polarisation_frame,
        flat.phase_centre,
    );
    for t in 0..ntimes {
        for b in 0..nbl {
            for k in 0..3 {
                block.uvw[[t, b, k]] = flat.uvw[[row(t, b, 0), k]];
            }
            for c in 0..nchan {
                let r = row(t, b, c);
                block.vis.slice_mut(s![t, b, c, ..]).assign(&flat.vis.row(r));
                block.weight.slice_mut(s![t, b, c, ..]).assign(&flat.weight.row(r));
                block
                    .imaging_weight
                    .slice_mut(s![t, b, c, ..])
                    .assign(&flat.imaging_weight.row(r));
            }
        }
    }
    Ok(block)
}

/// Lay a block out as records in `[time][baseline][channel]` order.
pub(crate) fn block_records(block: &BlockVisibility) -> Visibility {
    let npol = block.npol();
    let mut flat = Visibility::zeros(block.ncells(), block.polarisation_frame, block.phase_centre);
    for t in 0..block.ntimes() {
        for (b, &(a1, a2)) in block.baselines.iter().enumerate() {
            for c in 0..block.nchan() {
                let r = block.flat_index(t, b, c);
                for k in 0..3 {
                    flat.uvw[[r, k]] = block.uvw[[t, b, k]];
                }
                flat.time[r] = block.time[t];
                flat.integration_time[r] = block.integration_time[t];
                flat.frequency[r] = block.frequency[c];
                flat.channel_bandwidth[r] = block.channel_bandwidth[c];
                flat.antenna1[r] = a1 as i32;
                flat.antenna2[r] = a2 as i32;
                for p in 0..npol {
                    flat.vis[[r, p]] = block.vis[[t, b, c, p]];
                    flat.weight[[r, p]] = block.weight[[t, b, c, p]];
                    flat.imaging_weight[[r, p]] = block.imaging_weight[[t, b, c, p]];
                }
            }
        }
    }
    flat
}

/// Write a block into `out` as `[time][baseline][channel]` records.
pub(crate) unsafe fn block_to_c(block: &BlockVisibility, out: *mut ARLVis) -> Result<(), ArlError> {
    visibility_to_c(&block_records(block), out)
}

/// Read an `Image`.
pub(crate) unsafe fn image_from_c(image: *const ARLImage) -> Result<Image, ArlError> {
    let image = require(image, "Image")?;
    let shape = image_shape(&image.data_shape)?;
    let n = checked_product(&shape, "Image")?;
    if image.size < n {
        return Err(ArlError::ShapeMismatch(format!(
            "Image.size {} is smaller than shape {shape:?}",
            image.size
        )));
    }
    if image.data.is_null() {
        return Err(ArlError::NullPointer("Image.data"));
    }
    let wcs = Wcs::from_json(read_c_str(image.wcs, "Image.wcs")?)?;
    let frame = PolarisationFrame::from_name(read_c_str(image.polarisation_frame, "Image.polarisation_frame")?)?;
    let pixels = std::slice::from_raw_parts(image.data as *const f64, n);
    let data = Array4::from_shape_vec(shape, pixels.to_vec())
        .map_err(|e| ArlError::ShapeMismatch(format!("image data: {e}")))?;
    Image::new(data, wcs, frame)
}

/// Number of elements in an array of `dims`, or an error if it does not
/// fit in `usize`.
pub(crate) fn checked_product(dims: &[usize], what: &str) -> Result<usize, ArlError> {
    dims.iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| ArlError::InvalidArgument(format!("{what} dimensions {dims:?} overflow")))
}

/// A fully positive image shape.
pub(crate) fn image_shape(shape: &[c_int; 4]) -> Result<[usize; 4], ArlError> {
    if shape.iter().any(|&n| n <= 0) {
        return Err(ArlError::InvalidArgument(format!("image shape {shape:?} is not positive")));
    }
    Ok(shape.map(|n| n as usize))
}

/// Check that `out` can receive `image`, without writing anything.
pub(crate) unsafe fn check_image_to_c(image: &Image, out: *const ARLImage) -> Result<(), ArlError> {
    let out = require(out, "output Image")?;
    let n = image.data.len();
    if out.size < n {
        return Err(ArlError::BufferTooSmall {
            what: "output Image.data",
            needed: n,
            available: out.size,
        });
    }
    if out.data.is_null() {
        return Err(ArlError::NullPointer("output Image.data"));
    }
    let wcs = image.wcs.to_json();
    let frame = image.polarisation_frame.name();
    check_descriptor(out.wcs, "output Image.wcs", &wcs)?;
    check_descriptor(out.polarisation_frame, "output Image.polarisation_frame", frame)
}

/// Write an image into `out`, overwriting its shape and size.
pub(crate) unsafe fn image_to_c(image: &Image, out: *mut ARLImage) -> Result<(), ArlError> {
    check_image_to_c(image, out)?;
    let out = require_mut(out, "output Image")?;
    let n = image.data.len();
    let wcs = image.wcs.to_json();
    let frame = image.polarisation_frame.name();

    let pixels = std::slice::from_raw_parts_mut(out.data as *mut f64, n);
    for (dst, src) in pixels.iter_mut().zip(image.data.iter()) {
        *dst = *src;
    }
    write_descriptor(out.wcs, &wcs);
    write_descriptor(out.polarisation_frame, frame);
    out.data_shape = image.shape().map(|n| n as c_int);
    out.size = n;
    Ok(())
}

/// Read an `ARLGt` whose gains apply to channels at `frequency`.
pub(crate) unsafe fn gaintable_from_c(
    gt: *const ARLGt,
    frequency: &Array1<f64>,
    frame: PolarisationFrame,
) -> Result<GainTable, ArlError> {
    let gt = require(gt, "ARLGt")?;
    let dims = [gt.nrows, gt.nant, gt.nchan, gt.nrec];
    if dims.iter().any(|&n| n <= 0) {
        return Err(ArlError::InvalidArgument(format!("gain table dimensions {dims:?} are not positive")));
    }
    let [ntimes, nant, nchan, nrec] = dims.map(|n| n as usize);
    if nchan != frequency.len() {
        return Err(ArlError::ShapeMismatch(format!(
            "gain table has {nchan} channels, visibilities have {}",
            frequency.len()
        )));
    }
    if gt.time.is_null() || gt.gain.is_null() || gt.weight.is_null() || gt.residual.is_null() {
        return Err(ArlError::NullPointer("ARLGt arrays"));
    }
    let ngain = checked_product(&[ntimes, nant, nchan, nrec, nrec], "ARLGt gains")?;
    let nweight = checked_product(&[ntimes, nant, nchan, nrec], "ARLGt weights")?;
    let nresidual = checked_product(&[ntimes, nchan, nrec], "ARLGt residuals")?;
    let time = Array1::from(std::slice::from_raw_parts(gt.time, ntimes).to_vec());
    let mut table = GainTable::unity(time, frequency.clone(), nant, nrec, frame);
    let gains = std::slice::from_raw_parts(gt.gain, ngain);
    let weights = std::slice::from_raw_parts(gt.weight, nweight);
    let residuals = std::slice::from_raw_parts(gt.residual, nresidual);
    for (dst, src) in table.gain.iter_mut().zip(gains) {
        *dst = to_c64(*src);
    }
    for (dst, src) in table.weight.iter_mut().zip(weights) {
        *dst = *src as f64;
    }
    for (dst, src) in table.residual.iter_mut().zip(residuals) {
        *dst = *src as f64;
    }
    Ok(table)
}

/// Write a gain table into `out`, whose dimensions must match exactly.
pub(crate) unsafe fn gaintable_to_c(table: &GainTable, out: *mut ARLGt) -> Result<(), ArlError> {
    let out = require_mut(out, "output ARLGt")?;
    let expected = [table.ntimes(), table.nant(), table.nchan(), table.nrec()];
    let declared = [out.nrows, out.nant, out.nchan, out.nrec];
    if declared.iter().zip(expected).any(|(&d, e)| d < 0 || d as usize != e) {
        return Err(ArlError::ShapeMismatch(format!(
            "output ARLGt is {declared:?}, gain table is {expected:?}"
        )));
    }
    if out.time.is_null() || out.gain.is_null() || out.weight.is_null() || out.residual.is_null() {
        return Err(ArlError::NullPointer("output ARLGt arrays"));
    }
    let time = std::slice::from_raw_parts_mut(out.time, table.ntimes());
    for (dst, src) in time.iter_mut().zip(table.time.iter()) {
        *dst = *src;
    }
    let gains = std::slice::from_raw_parts_mut(out.gain, table.gain.len());
    for (dst, src) in gains.iter_mut().zip(table.gain.iter()) {
        *dst = to_c32(*src);
    }
    let weights = std::slice::from_raw_parts_mut(out.weight, table.weight.len());
    for (dst, src) in weights.iter_mut().zip(table.weight.iter()) {
        *dst = *src as f32;
    }
    let residuals = std::slice::from_raw_parts_mut(out.residual, table.residual.len());
    for (dst, src) in residuals.iter_mut().zip(table.residual.iter()) {
        *dst = *src as f32;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::create_named_configuration;
    use crate::simulation::create_blockvisibility;
    use crate::ffi::types::{ARLVisEntryP1, ARLVisEntryP4};
    use std::ffi::c_void;

    #[test]
    fn test_block_round_trip_through_records() {
        let config = create_named_configuration("VLAA", None).unwrap();
        let mut block = create_blockvisibility(
            &config,
            &[-0.1, 0.0, 0.1],
            &[1e8, 1.1e8],
            &[1e6, 1e6],
            PhaseCentre::new(15.0, -45.0),
            PolarisationFrame::Linear,
            1.0,
        )
        .unwrap();
        block.vis[[1, 5, 1, 2]] = Complex64::new(0.5, -0.25);

        let n = block.ncells();
        let mut entries = vec![ARLVisEntryP4::default(); n];
        let mut pc = vec![0 as c_char; ARL_DESCRIPTOR_CAPACITY];
        let mut vis = ARLVis {
            nvis: n,
            npol: 0,
            data: entries.as_mut_ptr() as *mut c_void,
            phasecentre: pc.as_mut_ptr(),
        };
        unsafe {
            block_to_c(&block, &mut vis).unwrap();
            assert_eq!((vis.nvis, vis.npol), (n, 4));
            let back = block_from_c(&vis, 3, 2, Some(config.nant())).unwrap();
            assert_eq!(back.baselines, block.baselines);
            assert_eq!(back.time, block.time);
            assert_eq!(back.frequency, block.frequency);
            assert_eq!(back.vis[[1, 5, 1, 2]], Complex64::new(0.5, -0.25));
            assert_eq!(back.phase_centre, block.phase_centre);
            assert!(block_from_c(&vis, 4, 2, None).is_err());
        }
    }

    #[test]
    fn test_block_rejects_records_out_of_order() {
        let config = create_named_configuration("VLAA", None).unwrap();
        let block = create_blockvisibility(
            &config,
            &[-0.1, 0.1],
            &[1e8, 1.1e8],
            &[1e6, 1e6],
            PhaseCentre::new(15.0, -45.0),
            PolarisationFrame::StokesI,
            1.0,
        )
        .unwrap();
        let n = block.ncells();
        let mut entries = vec![ARLVisEntryP1::default(); n];
        let mut pc = vec![0 as c_char; ARL_DESCRIPTOR_CAPACITY];
        let mut vis = ARLVis {
            nvis: n,
            npol: 0,
            data: entries.as_mut_ptr() as *mut c_void,
            phasecentre: pc.as_mut_ptr(),
        };
        unsafe { block_to_c(&block, &mut vis) }.unwrap();
        assert!(unsafe { block_from_c(&vis, 2, 2, None) }.is_ok());

        // Channels of one baseline swapped.
        entries.swap(2, 3);
        assert!(matches!(
            unsafe { block_from_c(&vis, 2, 2, None) },
            Err(ArlError::ShapeMismatch(_))
        ));
        entries.swap(2, 3);

        // A record of the second integration carrying the wrong antenna.
        let last = n - 1;
        entries[last].a2 += 1;
        assert!(matches!(
            unsafe { block_from_c(&vis, 2, 2, None) },
            Err(ArlError::ShapeMismatch(_))
        ));
        entries[last].a2 -= 1;

        // A record of the second integration carrying the first time.
        entries[n / 2 + 1].time = entries[0].time;
        assert!(matches!(
            unsafe { block_from_c(&vis, 2, 2, None) },
            Err(ArlError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_output_checked_before_writing() {
        let vis = Visibility::zeros(4, PolarisationFrame::StokesI, PhaseCentre::new(0.0, -30.0));
        let mut entries = vec![crate::ffi::types::ARLVisEntryP1::default(); 2];
        let mut pc = vec![0 as c_char; ARL_DESCRIPTOR_CAPACITY];
        let mut out = ARLVis {
            nvis: 2,
            npol: 0,
            data: entries.as_mut_ptr() as *mut c_void,
            phasecentre: pc.as_mut_ptr(),
        };
        let err = unsafe { visibility_to_c(&vis, &mut out) }.unwrap_err();
        assert!(matches!(err, ArlError::BufferTooSmall { needed: 4, available: 2, .. }));
        assert_eq!((out.nvis, out.npol), (2, 0));
        assert_eq!(pc[0], 0);

        out.nvis = 4;
        out.npol = 2;
        assert!(matches!(
            unsafe { visibility_to_c(&vis, &mut out) },
            Err(ArlError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_optional_descriptor() {
        let empty = vec![0 as c_char; ARL_DESCRIPTOR_CAPACITY];
        assert_eq!(unsafe { read_optional_descriptor(empty.as_ptr(), "x") }.unwrap(), None);
        let unterminated = vec![b'a' as c_char; ARL_DESCRIPTOR_CAPACITY];
        assert_eq!(unsafe { read_optional_descriptor(unterminated.as_ptr(), "x") }.unwrap(), None);
        let mut text = vec![0 as c_char; ARL_DESCRIPTOR_CAPACITY];
        text[0] = b'h' as c_char;
        text[1] = b'i' as c_char;
        assert_eq!(
            unsafe { read_optional_descriptor(text.as_ptr(), "x") }.unwrap(),
            Some("hi".to_string())
        );
        assert_eq!(unsafe { read_optional_descriptor(std::ptr::null(), "x") }.unwrap(), None);
    }

    #[test]
    fn test_image_shape_overflow_is_rejected() {
        assert_eq!(checked_product(&[4, 1, 256, 256], "Image").unwrap(), 262_144);
        assert!(matches!(
            checked_product(&[usize::MAX, 2], "Image"),
            Err(ArlError::InvalidArgument(_))
        ));

        // Never dereferenced: the shape is rejected before the data pointer.
        let mut pixel = 0.0f64;
        let image = ARLImage {
            size: usize::MAX,
            data_shape: [c_int::MAX; 4],
            data: &mut pixel as *mut f64 as *mut c_void,
            wcs: std::ptr::null_mut(),
            polarisation_frame: std::ptr::null_mut(),
        };
        assert!(matches!(
            unsafe { image_from_c(&image) },
            Err(ArlError::InvalidArgument(_))
        ));
    }
}
