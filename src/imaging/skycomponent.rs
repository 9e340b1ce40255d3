//! Point sources: direct Fourier prediction and insertion into images.

use std::f64::consts::PI;

use ndarray::prelude::*;
use num_complex::Complex64;
use rayon::prelude::*;

use crate::data::{
    convert_polarisation, BlockVisibility, Image, PhaseCentre, PolarisationFrame, Skycomponent, Visibility,
    SPEED_OF_LIGHT,
};
use crate::error::ArlError;

/// How a component's flux is spread over image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMethod {
    /// All flux on the nearest pixel.
    #[default]
    Nearest,
    /// Separable Lanczos interpolation with a = 3.
    Lanczos,
}

const LANCZOS_A: isize = 3;

/// `exp(-2 pi i (u l + v m + w (n - 1)))` for baseline `uvw` in wavelengths.
#[inline]
pub fn point_phasor(uvw: [f64; 3], lmn: [f64; 3]) -> Complex64 {
    let [u, v, w] = uvw;
    let [l, m, n] = lmn;
    Complex64::from_polar(1.0, -2.0 * PI * (u * l + v * m + w * (n - 1.0)))
}

/// A component ready for prediction against one phase centre and frame.
struct Prepared<'a> {
    comp: &'a Skycomponent,
    lmn: [f64; 3],
    /// Flux per component channel, converted to the visibility frame.
    flux: Vec<Vec<Complex64>>,
}

impl Prepared<'_> {
    fn flux_at(&self, freq: f64) -> &[Complex64] {
        &self.flux[self.comp.nearest_channel(freq)]
    }
}

fn prepare<'a>(
    comps: &'a [Skycomponent],
    phase_centre: &PhaseCentre,
    frame: PolarisationFrame,
) -> Result<Vec<Prepared<'a>>, ArlError> {
    comps
        .iter()
        .map(|comp| {
            let flux = comp
                .flux
                .rows()
                .into_iter()
                .map(|row| {
                    let values: Vec<Complex64> = row.iter().map(|&f| Complex64::new(f, 0.0)).collect();
                    convert_polarisation(comp.polarisation_frame, frame, &values)
                })
                .collect::<Result<_, _>>()?;
            let lmn = comp.direction.lmn_relative_to(phase_centre);
            log::debug!(
                "predict_skycomponent: component '{}' at (l, m, n) = ({:.6}, {:.6}, {:.6})",
                comp.name,
                lmn[0],
                lmn[1],
                lmn[2]
            );
            Ok(Prepared { comp, lmn, flux })
        })
        .collect()
}

/// Sum of all components for one sample.
fn sum_components(prepared: &[Prepared<'_>], uvw: [f64; 3], freq: f64, npol: usize) -> Vec<Complex64> {
    let mut out = vec![Complex64::new(0.0, 0.0); npol];
    for comp in prepared {
        let phasor = point_phasor(uvw, comp.lmn);
        for (o, f) in out.iter_mut().zip(comp.flux_at(freq)) {
            *o += f * phasor;
        }
    }
    out
}

/// Add the visibilities of `comps` to a copy of `vis` by direct Fourier
/// transform.
///
/// Each sample takes the component channel nearest its frequency; fluxes
/// are converted to the visibility frame.
pub fn predict_skycomponent_visibility(vis: &Visibility, comps: &[Skycomponent]) -> Result<Visibility, ArlError> {
    log::info!(
        "predict_skycomponent_visibility: predicting {} components for {} visibilities",
        comps.len(),
        vis.nvis()
    );
    let prepared = prepare(comps, &vis.phase_centre, vis.polarisation_frame)?;
    let npol = vis.npol();
    let mut out = vis.clone();
    out.vis
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(row, mut values)| {
            let sum = sum_components(&prepared, vis.uvw_lambda(row), vis.frequency[row], npol);
            for (v, s) in values.iter_mut().zip(sum) {
                *v += s;
            }
        });
    Ok(out)
}

/// As [`predict_skycomponent_visibility`] for a block.
pub fn predict_skycomponent_blockvisibility(
    block: &BlockVisibility,
    comps: &[Skycomponent],
) -> Result<BlockVisibility, ArlError> {
    log::info!(
        "predict_skycomponent_blockvisibility: predicting {} components for {} cells",
        comps.len(),
        block.ncells()
    );
    let prepared = prepare(comps, &block.phase_centre, block.polarisation_frame)?;
    let npol = block.npol();
    let mut out = block.clone();
    out.vis
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(t, mut integration)| {
            for (b, mut baseline) in integration.axis_iter_mut(Axis(0)).enumerate() {
                let uvw = block.uvw.slice(s![t, b, ..]);
                for (c, mut values) in baseline.axis_iter_mut(Axis(0)).enumerate() {
                    let freq = block.frequency[c];
                    let scale = freq / SPEED_OF_LIGHT;
                    let uvw_lambda = [uvw[0] * scale, uvw[1] * scale, uvw[2] * scale];
                    let sum = sum_components(&prepared, uvw_lambda, freq, npol);
                    for (v, s) in values.iter_mut().zip(sum) {
                        *v += s;
                    }
                }
            }
        });
    Ok(out)
}

#[inline]
fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Lanczos weights for the taps `floor(x) - a + 1 ..= floor(x) + a`,
/// normalised to unit sum.
fn lanczos_taps(x: f64) -> (isize, Vec<f64>) {
    let base = x.floor() as isize;
    let first = base - LANCZOS_A + 1;
    let a = LANCZOS_A as f64;
    let mut weights: Vec<f64> = (0..2 * LANCZOS_A)
        .map(|k| {
            let d = x - (first + k) as f64;
            if d.abs() < a {
                sinc(d) * sinc(d / a)
            } else {
                0.0
            }
        })
        .collect();
    let total: f64 = weights.iter().sum();
    if total != 0.0 {
        weights.iter_mut().for_each(|w| *w /= total);
    }
    (first, weights)
}

/// Add the flux of `comps` to `image`.
///
/// Each image channel takes the component channel nearest its frequency.
/// Components behind the tangent plane or off the image are skipped; with
/// [`InsertMethod::Lanczos`] taps that fall off the image are dropped.
/// Returns the number of components inserted.
pub fn insert_skycomponent(
    image: &mut Image,
    comps: &[Skycomponent],
    method: InsertMethod,
) -> Result<usize, ArlError> {
    let [nchan, npol, ny, nx] = image.shape();
    let frame = image.polarisation_frame;
    let mut inserted = 0;
    for comp in comps {
        let Some((x, y)) = image.wcs.sky_to_pixel(&comp.direction) else {
            continue;
        };
        let (xi, yi) = (x.round(), y.round());
        if xi < 0.0 || yi < 0.0 || xi >= nx as f64 || yi >= ny as f64 {
            continue;
        }

        for chan in 0..nchan {
            let values: Vec<Complex64> = comp
                .flux_at(image.wcs.channel_frequency(chan))
                .iter()
                .map(|&f| Complex64::new(f, 0.0))
                .collect();
            let flux = convert_polarisation(comp.polarisation_frame, frame, &values)?;

            match method {
                InsertMethod::Nearest => {
                    for (pol, f) in flux.iter().enumerate().take(npol) {
                        image.data[[chan, pol, yi as usize, xi as usize]] += f.re;
                    }
                }
                InsertMethod::Lanczos => {
                    let (x0, wx) = lanczos_taps(x);
                    let (y0, wy) = lanczos_taps(y);
                    for (j, wyj) in wy.iter().enumerate() {
                        let py = y0 + j as isize;
                        if py < 0 || py >= ny as isize {
                            continue;
                        }
                        for (i, wxi) in wx.iter().enumerate() {
                            let px = x0 + i as isize;
                            if px < 0 || px >= nx as isize {
                                continue;
                            }
                            for (pol, f) in flux.iter().enumerate().take(npol) {
                                image.data[[chan, pol, py as usize, px as usize]] += f.re * wyj * wxi;
                            }
                        }
                    }
                }
            }
        }
        inserted += 1;
    }
    log::debug!(
        "insert_skycomponent: inserted {inserted} of {} components ({method:?})",
        comps.len()
    );
    Ok(inserted)
}
