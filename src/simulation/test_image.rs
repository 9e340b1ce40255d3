//! Deterministic sky models for tests and demonstrations.

use ndarray::prelude::*;
use num_complex::Complex64;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use super::beam::create_low_test_beam;
use crate::data::{convert_polarisation, Image, PhaseCentre, PolarisationFrame, Skycomponent, Wcs};
use crate::error::ArlError;
use crate::imaging::{insert_skycomponent, InsertMethod};

/// Side length of the extended test image.
pub const TEST_IMAGE_NPIXEL: usize = 256;

/// Seed of the synthetic point-source catalogue.
pub const GLEAM_SEED: u64 = 180_555;

/// Reference frequency of catalogue fluxes \[Hz\].
const GLEAM_REFERENCE_FREQUENCY: f64 = 151e6;

/// Shape of the image [`create_test_image`] returns for `nchan` channels.
pub fn test_image_shape(nchan: usize, polarisation_frame: PolarisationFrame) -> [usize; 4] {
    [
        nchan,
        polarisation_frame.npol(),
        TEST_IMAGE_NPIXEL,
        TEST_IMAGE_NPIXEL,
    ]
}

/// An M31-like extended source: a tilted exponential disk with a bright
/// bulge and two compact companions, all positive.
fn m31_plane() -> Array2<f64> {
    let n = TEST_IMAGE_NPIXEL as f64;
    let c = n / 2.0;
    let (sin_pa, cos_pa) = 38f64.to_radians().sin_cos();

    Array2::from_shape_fn((TEST_IMAGE_NPIXEL, TEST_IMAGE_NPIXEL), |(y, x)| {
        let dx = x as f64 - c;
        let dy = y as f64 - c;
        let major = dx * cos_pa + dy * sin_pa;
        let minor = -dx * sin_pa + dy * cos_pa;

        let disk = (-((major / 60.0).powi(2) + (minor / 18.0).powi(2)).sqrt() * 3.0).exp();
        let bulge = 3.0 * (-0.5 * (dx * dx + dy * dy) / 36.0).exp();
        let m32 = 0.8 * (-0.5 * ((dx - 22.0).powi(2) + (dy + 30.0).powi(2)) / 9.0).exp();
        let m110 = 0.5 * (-0.5 * ((dx + 45.0).powi(2) + (dy - 55.0).powi(2)) / 25.0).exp();
        let value = disk + bulge + m32 + m110;
        if value > 1e-6 {
            value
        } else {
            0.0
        }
    })
}

/// Fill the intensity planes of `data` from a Stokes I plane.
fn insert_stokes_i(data: &mut Array4<f64>, chan: usize, frame: PolarisationFrame, plane: ArrayView2<f64>) {
    for &p in frame.parallel_hands() {
        data.slice_mut(s![chan, p, .., ..]).assign(&plane);
    }
}

/// The extended test image, replicated over `frequency`.
///
/// Polarised frames receive the intensity on their parallel hands.
pub fn create_test_image(
    frequency: &[f64],
    cellsize: f64,
    phase_centre: PhaseCentre,
    polarisation_frame: PolarisationFrame,
) -> Result<Image, ArlError> {
    if frequency.is_empty() {
        return Err(ArlError::InvalidArgument("no frequencies given".to_string()));
    }
    if !(cellsize > 0.0) {
        return Err(ArlError::InvalidArgument(format!(
            "cellsize must be positive, got {cellsize}"
        )));
    }

    let channel_width = if frequency.len() > 1 {
        frequency[1] - frequency[0]
    } else {
        0.001 * frequency[0]
    };
    let wcs = Wcs::new(
        phase_centre,
        cellsize,
        TEST_IMAGE_NPIXEL,
        frequency[0],
        channel_width,
    );

    let plane = m31_plane();
    let mut data = Array4::zeros(test_image_shape(frequency.len(), polarisation_frame));
    for chan in 0..frequency.len() {
        insert_stokes_i(&mut data, chan, polarisation_frame, plane.view());
    }

    log::info!(
        "create_test_image: {:?} pixels, cellsize {cellsize:e} rad, frame {polarisation_frame}",
        data.shape()
    );
    Image::new(data, wcs, polarisation_frame)
}

/// Draw the catalogue sources within `radius` radians of the phase centre,
/// as `(l, m, flux, spectral_index)`.
///
/// Counts follow Euclidean statistics, `N(>S) ~ S^-1.5`, normalised to about
/// 20000 sources per steradian above 0.1 Jy. Positions are uniform over the
/// spherical cap.
fn gleam_catalogue(flux_limit: f64, radius: f64) -> Result<Vec<(f64, f64, f64, f64)>, ArlError> {
    const DENSITY_ABOVE_100MJY: f64 = 20_000.0;
    const MAX_SOURCES: f64 = 200_000.0;
    const MAX_FLUX: f64 = 100.0;

    let cos_radius = radius.min(std::f64::consts::FRAC_PI_2).cos();
    let solid_angle = std::f64::consts::TAU * (1.0 - cos_radius);
    let expected = DENSITY_ABOVE_100MJY * solid_angle * (flux_limit / 0.1).powf(-1.5);
    let count = expected.round().clamp(0.0, MAX_SOURCES) as usize;

    let spectral = Normal::new(-0.7, 0.2)
        .map_err(|e| ArlError::InvalidArgument(format!("spectral index distribution: {e}")))?;
    let mut rng = ChaCha8Rng::seed_from_u64(GLEAM_SEED);

    let sources = (0..count)
        .map(|_| {
            let cos_theta: f64 = rng.gen_range(cos_radius..=1.0);
            let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
            let (sin_phi, cos_phi) = rng.gen_range(0.0..std::f64::consts::TAU).sin_cos();
            let u: f64 = rng.gen_range(f64::EPSILON..1.0);
            let flux = (flux_limit * u.powf(-1.0 / 1.5)).min(MAX_FLUX);
            let spectral_index = spectral.sample(&mut rng);
            (sin_theta * cos_phi, sin_theta * sin_phi, flux, spectral_index)
        })
        .collect();
    Ok(sources)
}

/// Point sources brighter than `flux_limit` Jy within `radius` radians of
/// `phase_centre`, drawn from a fixed synthetic low-frequency catalogue.
///
/// Spectra are power laws about 151 MHz tabulated at `frequency`. The
/// Stokes I flux is converted to `polarisation_frame`.
pub fn create_low_test_skycomponents_from_gleam(
    flux_limit: f64,
    polarisation_frame: PolarisationFrame,
    frequency: &[f64],
    phase_centre: PhaseCentre,
    radius: f64,
) -> Result<Vec<Skycomponent>, ArlError> {
    if frequency.is_empty() {
        return Err(ArlError::InvalidArgument("no frequencies given".to_string()));
    }
    if !(flux_limit > 0.0) || !(radius > 0.0) {
        return Err(ArlError::InvalidArgument(format!(
            "flux limit {flux_limit} and radius {radius} must be positive"
        )));
    }

    let frequency = Array1::from(frequency.to_vec());
    let mut components = Vec::new();
    for (k, (l, m, flux, spectral_index)) in gleam_catalogue(flux_limit, radius)?.into_iter().enumerate() {
        let Some(direction) = phase_centre.offset_by_lm(l, m) else {
            continue;
        };
        let mut spectrum = Array2::zeros((frequency.len(), polarisation_frame.npol()));
        for (chan, &freq) in frequency.iter().enumerate() {
            let stokes_i = Complex64::new(flux * (freq / GLEAM_REFERENCE_FREQUENCY).powf(spectral_index), 0.0);
            let products = convert_polarisation(PolarisationFrame::StokesI, polarisation_frame, &[stokes_i])?;
            for (pol, p) in products.iter().enumerate() {
                spectrum[[chan, pol]] = p.re;
            }
        }
        components.push(Skycomponent::new(
            direction,
            frequency.clone(),
            spectrum,
            format!("GLEAM_{k:06}"),
            polarisation_frame,
        )?);
    }
    log::info!(
        "create_low_test_skycomponents_from_gleam: {} sources above {flux_limit} Jy within {radius} rad",
        components.len()
    );
    Ok(components)
}

/// A low-frequency point-source sky drawn from a fixed synthetic catalogue.
///
/// The components of [`create_low_test_skycomponents_from_gleam`] that fall
/// on the `npixel` square image are inserted with `insert_method`; with
/// `apply_beam` the sky is attenuated by [`create_low_test_beam`]. The
/// result has shape `[nchan, npol, npixel, npixel]`.
#[allow(clippy::too_many_arguments)]
pub fn create_low_test_image_from_gleam(
    frequency: &[f64],
    channel_bandwidth: &[f64],
    cellsize: f64,
    npixel: usize,
    phase_centre: PhaseCentre,
    flux_limit: f64,
    polarisation_frame: PolarisationFrame,
    insert_method: InsertMethod,
    apply_beam: bool,
) -> Result<Image, ArlError> {
    if frequency.is_empty() || channel_bandwidth.is_empty() {
        return Err(ArlError::InvalidArgument(
            "frequencies and channel bandwidths are required".to_string(),
        ));
    }
    if npixel == 0 || !(cellsize > 0.0) || !(flux_limit > 0.0) {
        return Err(ArlError::InvalidArgument(format!(
            "npixel {npixel}, cellsize {cellsize:e} and flux limit {flux_limit} must be positive"
        )));
    }

    let wcs = Wcs::new(phase_centre, cellsize, npixel, frequency[0], channel_bandwidth[0]);
    let mut image = Image::zeros(
        [frequency.len(), polarisation_frame.npol(), npixel, npixel],
        wcs,
        polarisation_frame,
    )?;

    // Half the diagonal reaches the corners.
    let radius = npixel as f64 * cellsize * std::f64::consts::FRAC_1_SQRT_2;
    let components =
        create_low_test_skycomponents_from_gleam(flux_limit, polarisation_frame, frequency, phase_centre, radius)?;
    let inserted = insert_skycomponent(&mut image, &components, insert_method)?;

    if apply_beam {
        let beam = create_low_test_beam(&image)?;
        image.data *= &beam.data;
    }

    log::info!(
        "create_low_test_image_from_gleam: {inserted} sources above {flux_limit} Jy in {npixel}x{npixel} pixels"
    );
    Ok(image)
}
