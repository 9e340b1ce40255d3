//! End-to-end tests through the C entry points.

use std::ffi::{c_int, c_longlong, CStr, CString};
use std::mem::size_of;

use approx::assert_abs_diff_eq;
use arlffi::*;
use num_complex::Complex32;
use serial_test::serial;

const VLAA_NANT: usize = 27;
const VLAA_NBASES: usize = 351;

struct Observation {
    _name: CString,
    _times: Vec<f64>,
    _freqs: Vec<f64>,
    _bandwidths: Vec<f64>,
    conf: ARLConf,
}

impl Observation {
    fn vlaa(nfreqs: usize, npol: c_int) -> Self {
        let name = CString::new("VLAA").unwrap();
        let mut times = vec![-0.1, 0.0, 0.1];
        let mut freqs: Vec<f64> = (0..nfreqs).map(|i| 1e8 + 1e7 * i as f64).collect();
        let mut bandwidths = vec![1e6; nfreqs];
        let conf = ARLConf {
            confname: name.as_ptr() as *mut _,
            pc_ra: 15.0,
            pc_dec: -45.0,
            times: times.as_mut_ptr(),
            ntimes: times.len() as c_int,
            freqs: freqs.as_mut_ptr(),
            nfreqs: nfreqs as c_int,
            channel_bandwidth: bandwidths.as_mut_ptr(),
            nchanwidth: nfreqs as c_int,
            nbases: VLAA_NBASES as c_int,
            nant: VLAA_NANT as c_int,
            npol,
            rmax: 0.0,
        };
        Self {
            _name: name,
            _times: times,
            _freqs: freqs,
            _bandwidths: bandwidths,
            conf,
        }
    }

    fn nvis(&self) -> usize {
        (self.conf.ntimes * self.conf.nfreqs) as usize * VLAA_NBASES
    }
}

struct OwnedVis(ARLVis);

impl OwnedVis {
    fn new(nvis: usize, npol: c_int) -> Self {
        let mut vis = ARLVis {
            nvis: 0,
            npol: 0,
            data: std::ptr::null_mut(),
            phasecentre: std::ptr::null_mut(),
        };
        assert_eq!(unsafe { arl_visibility_alloc(&mut vis, nvis, npol) }, ArlStatus::Ok);
        Self(vis)
    }

    fn p1(&self) -> &[ARLVisEntryP1] {
        unsafe { std::slice::from_raw_parts(self.0.data as *const ARLVisEntryP1, self.0.nvis) }
    }

    fn p1_mut(&mut self) -> &mut [ARLVisEntryP1] {
        unsafe { std::slice::from_raw_parts_mut(self.0.data as *mut ARLVisEntryP1, self.0.nvis) }
    }

    fn p4(&self) -> &[ARLVisEntryP4] {
        unsafe { std::slice::from_raw_parts(self.0.data as *const ARLVisEntryP4, self.0.nvis) }
    }
}

impl Drop for OwnedVis {
    fn drop(&mut self) {
        unsafe { arl_visibility_free(&mut self.0) };
    }
}

struct OwnedImage(ARLImage);

impl OwnedImage {
    fn new(shape: [c_int; 4]) -> Self {
        let mut image = ARLImage {
            size: 0,
            data_shape: [0; 4],
            data: std::ptr::null_mut(),
            wcs: std::ptr::null_mut(),
            polarisation_frame: std::ptr::null_mut(),
        };
        assert_eq!(unsafe { arl_image_alloc(&mut image, shape.as_ptr()) }, ArlStatus::Ok);
        Self(image)
    }

    fn pixels(&self) -> &[f64] {
        unsafe { std::slice::from_raw_parts(self.0.data as *const f64, self.0.size) }
    }

    fn pixels_mut(&mut self) -> &mut [f64] {
        unsafe { std::slice::from_raw_parts_mut(self.0.data as *mut f64, self.0.size) }
    }

    fn peak(&self) -> (usize, f64) {
        self.pixels()
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, v)| if v > best.1 { (i, v) } else { best })
    }
}

impl Drop for OwnedImage {
    fn drop(&mut self) {
        unsafe { arl_image_free(&mut self.0) };
    }
}

fn init() {
    let config = ARLRuntimeConfig {
        worker_count: 2,
        vis_slices: 5,
    };
    unsafe { arl_initialize_with_config(&config) };
    assert!(arl_is_initialized());
}

fn assert_ok() {
    let message = unsafe { CStr::from_ptr(arl_last_error()) }.to_string_lossy().into_owned();
    assert_eq!(arl_last_status(), ArlStatus::Ok, "{message}");
}

/// A per-sample Stokes I observation and a 128 pixel image matched to it,
/// with a unit point source at the centre.
fn point_source_setup() -> (OwnedVis, OwnedImage) {
    let mut obs = Observation::vlaa(1, 1);
    let mut vis = OwnedVis::new(obs.nvis(), 1);
    unsafe { arl_create_visibility(&mut obs.conf, &mut vis.0) };
    assert_ok();

    let mut model = OwnedImage::new([1, 1, 128, 128]);
    unsafe { arl_create_image_from_visibility(&vis.0, &mut model.0) };
    assert_ok();
    model.pixels_mut()[64 * 128 + 64] = 1.0;
    (vis, model)
}

#[test]
fn test_layout_matches_header() {
    assert_eq!(size_of::<ARLVis>(), 32);
    assert_eq!(size_of::<ARLVisEntryP1>(), 80);
    assert_eq!(size_of::<ARLVisEntryP2>(), 96);
    assert_eq!(size_of::<ARLVisEntryP4>(), 128);
    assert_eq!(size_of::<ARLImage>(), 48);
    assert_eq!(size_of::<ARLConf>(), 88);
    assert_eq!(size_of::<ant_t>(), 8);
    assert_eq!(size_of::<ARLadvice>(), 40);
}

#[test]
#[serial]
fn test_calls_before_initialise_fail() {
    arl_finalize();
    assert!(!arl_is_initialized());

    let name = CString::new("VLAA").unwrap();
    let mut ant = ant_t::default();
    unsafe { helper_get_nbases(name.as_ptr() as *mut _, &mut ant) };
    assert_eq!(arl_last_status(), ArlStatus::NotInitialised);
    assert_eq!(ant, ant_t::default());

    init();
    unsafe { helper_get_nbases(name.as_ptr() as *mut _, &mut ant) };
    assert_ok();
    assert_eq!((ant.nant as usize, ant.nbases as usize), (VLAA_NANT, VLAA_NBASES));

    arl_clear_error();
    arl_finalize();
    unsafe { helper_get_nbases(name.as_ptr() as *mut _, &mut ant) };
    assert_eq!(arl_last_status(), ArlStatus::NotInitialised);
}

#[test]
#[serial]
fn test_shape_helpers() {
    init();
    let freq = 1e8;
    let mut first = [0 as c_int; 4];
    let mut second = [0 as c_int; 4];
    unsafe {
        helper_get_image_shape(&freq, 0.001, first.as_mut_ptr());
        helper_get_image_shape(&freq, 0.001, second.as_mut_ptr());
    }
    assert_ok();
    assert_eq!(first, [1, 1, 256, 256]);
    assert_eq!(first, second);

    let mut obs = Observation::vlaa(3, 1);
    let mut shape = [0 as c_int; 4];
    unsafe { helper_get_image_shape_multifreq(&mut obs.conf, 0.001, 128, shape.as_mut_ptr()) };
    assert_ok();
    assert_eq!(shape, [3, 1, 128, 128]);

    let unknown = CString::new("NOWHERE").unwrap();
    let mut ant = ant_t::default();
    unsafe { helper_get_nbases(unknown.as_ptr() as *mut _, &mut ant) };
    assert_eq!(arl_last_status(), ArlStatus::InvalidArgument);

    let name = CString::new("VLAA").unwrap();
    unsafe { helper_get_nbases_rmax(name.as_ptr() as *mut _, 1e5, &mut ant) };
    assert_ok();
    assert_eq!(ant.nant as usize, VLAA_NANT);
}

#[test]
#[serial]
fn test_copy_visibility() {
    init();
    let mut obs = Observation::vlaa(2, 1);
    let mut vis = OwnedVis::new(obs.nvis(), 1);
    unsafe { arl_create_visibility(&mut obs.conf, &mut vis.0) };
    assert_ok();
    vis.p1_mut()[10].vis[0] = Complex32::new(2.0, -1.0);

    let mut copy = OwnedVis::new(obs.nvis(), 1);
    unsafe { arl_copy_visibility(&vis.0, &mut copy.0, false) };
    assert_ok();
    assert_eq!((copy.0.nvis, copy.0.npol), (vis.0.nvis, vis.0.npol));
    assert_eq!(copy.p1(), vis.p1());
    let pc_in = unsafe { CStr::from_ptr(vis.0.phasecentre) };
    let pc_out = unsafe { CStr::from_ptr(copy.0.phasecentre) };
    assert_eq!(pc_in, pc_out);

    unsafe { arl_copy_visibility(&vis.0, &mut copy.0, true) };
    assert_ok();
    assert_eq!(copy.0.nvis, vis.0.nvis);
    assert!(copy.p1().iter().all(|r| *r == ARLVisEntryP1::default()));
    assert_ne!(vis.p1()[10].vis[0], Complex32::new(0.0, 0.0));
}

#[test]
#[serial]
fn test_small_output_is_left_untouched() {
    init();
    let mut obs = Observation::vlaa(1, 1);
    let mut vis = OwnedVis::new(10, 1);
    unsafe { arl_create_visibility(&mut obs.conf, &mut vis.0) };
    assert_eq!(arl_last_status(), ArlStatus::BufferTooSmall);
    assert!(!unsafe { CStr::from_ptr(arl_last_error()) }.to_bytes().is_empty());
    assert_eq!(vis.0.nvis, 10);
    assert!(vis.p1().iter().all(|r| *r == ARLVisEntryP1::default()));
    assert_eq!(unsafe { *vis.0.phasecentre }, 0);
}

#[test]
#[serial]
fn test_predict_and_invert_point_source() {
    init();
    let (mut vis, model) = point_source_setup();
    unsafe { arl_predict_2d(&vis.0, &model.0, &mut vis.0) };
    assert_ok();
    for r in vis.p1() {
        assert_abs_diff_eq!(r.vis[0].re, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(r.vis[0].im, 0.0, epsilon = 1e-5);
    }

    let mut dirty = OwnedImage::new([1, 1, 128, 128]);
    let mut sumwt = [0.0f64; 1];
    unsafe { arl_invert_2d(&vis.0, &model.0, false, &mut dirty.0, sumwt.as_mut_ptr()) };
    assert_ok();
    assert_abs_diff_eq!(sumwt[0], vis.0.nvis as f64, epsilon = 1e-6);
    let (at, value) = dirty.peak();
    assert_eq!(at, 64 * 128 + 64);
    assert_abs_diff_eq!(value, 1.0, epsilon = 0.05);
    let frame = unsafe { CStr::from_ptr(dirty.0.polarisation_frame) };
    assert_eq!(frame.to_str().unwrap(), "stokesI");

    let mut psf = OwnedImage::new([1, 1, 128, 128]);
    unsafe { arl_invert_function(&vis.0, &model.0, true, &mut psf.0, sumwt.as_mut_ptr()) };
    assert_ok();
    assert_abs_diff_eq!(psf.pixels()[64 * 128 + 64], 1.0, epsilon = 1e-6);
}

#[test]
#[serial]
fn test_deconvolve_and_restore() {
    init();
    let (mut vis, model) = point_source_setup();
    unsafe { arl_predict_2d(&vis.0, &model.0, &mut vis.0) };
    let mut dirty = OwnedImage::new([1, 1, 128, 128]);
    let mut psf = OwnedImage::new([1, 1, 128, 128]);
    let mut sumwt = [0.0f64; 1];
    unsafe {
        arl_invert_2d(&vis.0, &model.0, false, &mut dirty.0, sumwt.as_mut_ptr());
        arl_invert_2d(&vis.0, &model.0, true, &mut psf.0, sumwt.as_mut_ptr());
    }
    assert_ok();

    let mut components = OwnedImage::new([1, 1, 128, 128]);
    let mut residual = OwnedImage::new([1, 1, 128, 128]);
    unsafe { arl_deconvolve_cube(&mut dirty.0, &mut psf.0, &mut components.0, &mut residual.0) };
    assert_ok();
    let total: f64 = components.pixels().iter().sum();
    assert!(total > 0.5, "clean components sum to {total}");
    let residual_peak = residual.pixels().iter().fold(0.0f64, |m, v| m.max(v.abs()));
    assert!(residual_peak < dirty.peak().1);

    let mut restored = OwnedImage::new([1, 1, 128, 128]);
    unsafe { arl_restore_cube(&mut components.0, &mut psf.0, &mut residual.0, &mut restored.0) };
    assert_ok();
    let (at, value) = restored.peak();
    assert_eq!(at, 64 * 128 + 64);
    assert!(value > 0.5 && value < 1.5, "restored peak {value}");

    unsafe { arl_restore_cube(&mut components.0, &mut psf.0, std::ptr::null_mut(), &mut restored.0) };
    assert_ok();
}

#[test]
#[serial]
fn test_predict_function_and_block_round_trip() {
    init();
    let mut obs = Observation::vlaa(2, 4);
    let nvis = obs.nvis();
    let mut block = OwnedVis::new(nvis, 4);
    unsafe { arl_create_blockvisibility(&mut obs.conf, &mut block.0) };
    assert_ok();
    assert_eq!(block.0.nvis, nvis);
    assert_eq!((block.p4()[0].a1, block.p4()[0].a2), (0, 1));

    let mut model = OwnedImage::new([2, 1, 64, 64]);
    unsafe { helper_set_image_params(&block.0, &mut model.0) };
    assert_ok();
    model.pixels_mut()[32 * 64 + 32] = 1.0;
    model.pixels_mut()[64 * 64 + 32 * 64 + 32] = 1.0;

    let mut vis = OwnedVis::new(nvis, 4);
    let mut predicted_block = OwnedVis::new(nvis, 4);
    let mut cindex: Vec<c_longlong> = vec![-1; nvis];
    unsafe {
        arl_predict_function(
            &mut obs.conf,
            &block.0,
            &model.0,
            &mut vis.0,
            &mut predicted_block.0,
            cindex.as_mut_ptr(),
        )
    };
    assert_ok();
    assert!(cindex.iter().enumerate().all(|(i, &r)| r == i as c_longlong));
    for r in vis.p4() {
        assert_abs_diff_eq!(r.vis[0].re, 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(r.vis[3].re, 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(r.vis[1].norm(), 0.0, epsilon = 1e-6);
    }

    let mut back = OwnedVis::new(nvis, 4);
    unsafe {
        arl_convert_visibility_to_blockvisibility(
            &mut obs.conf,
            &vis.0,
            &block.0,
            cindex.as_mut_ptr(),
            &mut back.0,
        )
    };
    assert_ok();
    assert_eq!(back.0.nvis, nvis);
    assert_eq!(back.p4(), predicted_block.p4());

    unsafe { arl_predict_function_blockvis(&mut obs.conf, &mut block.0, &model.0) };
    assert_ok();
    assert_eq!(block.p4(), predicted_block.p4());

    unsafe {
        arl_convert_visibility_to_blockvisibility(
            &mut obs.conf,
            &vis.0,
            &block.0,
            std::ptr::null_mut(),
            &mut back.0,
        )
    };
    assert_eq!(arl_last_status(), ArlStatus::InvalidArgument);
}

#[test]
#[serial]
fn test_advice() {
    init();
    let mut obs = Observation::vlaa(1, 1);
    let mut vis = OwnedVis::new(obs.nvis(), 1);
    unsafe { arl_create_visibility(&mut obs.conf, &mut vis.0) };
    let mut adv = ARLadvice {
        guard_band_image: 4.0,
        delA: 0.02,
        wprojection_planes: 1,
        ..Default::default()
    };
    unsafe { arl_advise_wide_field(&mut obs.conf, &mut vis.0, &mut adv) };
    assert_ok();
    assert!(adv.vis_slices >= 1);
    assert!(adv.npixel > 0 && (adv.npixel as u32).is_power_of_two());
    assert!(adv.cellsize > 0.0);
}

#[test]
#[serial]
fn test_gain_solution_recovers_simulated_gains() {
    init();
    let mut obs = Observation::vlaa(1, 1);
    let nvis = obs.nvis();
    let mut model = OwnedVis::new(nvis, 1);
    unsafe { arl_create_blockvisibility(&mut obs.conf, &mut model.0) };
    assert_ok();
    for r in model.p1_mut() {
        r.vis[0] = Complex32::new(1.0, 0.0);
    }

    let (ntimes, nant, nchan) = (3, VLAA_NANT, 1);
    let n = ntimes * nant * nchan;
    let mut time = vec![0.0; ntimes];
    let mut gain = vec![Complex32::new(0.0, 0.0); n];
    let mut weight = vec![0.0f32; n];
    let mut residual = vec![0.0f32; ntimes * nchan];
    let mut truth = ARLGt {
        nrows: ntimes as c_int,
        nant: nant as c_int,
        nchan: nchan as c_int,
        nrec: 1,
        time: time.as_mut_ptr(),
        gain: gain.as_mut_ptr(),
        weight: weight.as_mut_ptr(),
        residual: residual.as_mut_ptr(),
    };
    unsafe {
        assert_eq!(
            arl_create_gaintable_from_blockvisibility(&mut obs.conf, &model.0, &mut truth),
            ArlStatus::Ok
        );
        assert_eq!(
            arl_simulate_gaintable(&mut obs.conf, &mut truth, 0.1, 0.05, 1, 0.0, 42),
            ArlStatus::Ok
        );
    }
    let true_gains = gain.clone();

    let mut observed = OwnedVis::new(nvis, 1);
    unsafe {
        arl_copy_visibility(&model.0, &mut observed.0, false);
        assert_eq!(arl_apply_gaintable(&mut obs.conf, &mut observed.0, &truth, false), ArlStatus::Ok);
    }

    let mut s_time = vec![0.0; ntimes];
    let mut s_gain = vec![Complex32::new(0.0, 0.0); n];
    let mut s_weight = vec![0.0f32; n];
    let mut s_residual = vec![0.0f32; ntimes * nchan];
    let mut solved = ARLGt {
        nrows: ntimes as c_int,
        nant: nant as c_int,
        nchan: nchan as c_int,
        nrec: 1,
        time: s_time.as_mut_ptr(),
        gain: s_gain.as_mut_ptr(),
        weight: s_weight.as_mut_ptr(),
        residual: s_residual.as_mut_ptr(),
    };
    let status = unsafe { arl_solve_gaintable(&mut obs.conf, &observed.0, &model.0, false, 100, 1e-8, &mut solved) };
    assert_eq!(status, ArlStatus::Ok);

    // Only gain products are constrained by the data.
    for t in 0..ntimes {
        for (i, j) in [(0, 1), (3, 17), (20, 26)] {
            let at = |a: usize| t * nant + a;
            let expected = true_gains[at(i)] * true_gains[at(j)].conj();
            let got = s_gain[at(i)] * s_gain[at(j)].conj();
            assert_abs_diff_eq!(got.re, expected.re, epsilon = 1e-3);
            assert_abs_diff_eq!(got.im, expected.im, epsilon = 1e-3);
        }
    }
    assert!(s_residual.iter().all(|&r| r < 1e-3));
}
