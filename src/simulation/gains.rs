//! Random antenna gain errors.

use num_complex::Complex64;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, LogNormal, Normal};

use crate::data::GainTable;
use crate::error::ArlError;

/// Default seed for simulated gains.
pub const DEFAULT_GAIN_SEED: u64 = 180_555;

/// Running mean of `values` over windows of `n`, `values.len() - n + 1` long.
fn moving_average(values: &[f64], n: usize) -> Vec<f64> {
    values
        .windows(n)
        .map(|w| w.iter().sum::<f64>() / n as f64)
        .collect()
}

/// Draw `nchan` values per antenna from `dist`, smoothed over
/// `smooth_channels` adjacent channels.
fn draw_spectrum<D: Distribution<f64>>(
    dist: &D,
    rng: &mut ChaCha8Rng,
    nchan: usize,
    smooth_channels: usize,
) -> Vec<f64> {
    let raw: Vec<f64> = (0..nchan + smooth_channels - 1)
        .map(|_| dist.sample(&mut *rng))
        .collect();
    if smooth_channels > 1 {
        moving_average(&raw, smooth_channels)
    } else {
        raw
    }
}

/// Replace the gains in `gt` with random errors.
///
/// Phases are normal with standard deviation `phase_error` radians and
/// amplitudes log-normal with shape `amplitude_error`. Each antenna draws one
/// spectrum per time, shared by its receptors; with `smooth_channels > 1` the
/// spectrum is a running mean over that many channels, and smoothed
/// amplitudes are rescaled to unit mean. A zero error leaves that part of the
/// gain at unity.
///
/// For two receptors the cross-hand terms are `g_pp * e`, with the real and
/// imaginary parts of `e` normal with standard deviation `leakage`; without
/// leakage they are zero.
pub fn simulate_gaintable(
    gt: &mut GainTable,
    phase_error: f64,
    amplitude_error: f64,
    smooth_channels: usize,
    leakage: f64,
    seed: u64,
) -> Result<(), ArlError> {
    if !(phase_error >= 0.0) || !(amplitude_error >= 0.0) || !(leakage >= 0.0) {
        return Err(ArlError::InvalidArgument(format!(
            "gain errors must be non-negative, got phase {phase_error} amplitude {amplitude_error} leakage {leakage}"
        )));
    }
    if smooth_channels == 0 {
        return Err(ArlError::InvalidArgument(
            "smooth_channels must be at least 1".to_string(),
        ));
    }
    log::debug!(
        "simulate_gaintable: simulating amplitude error = {amplitude_error:.4}, phase error = {phase_error:.4}, \
         leakage = {leakage:.4}, smoothing over {smooth_channels} channels"
    );

    let phases = Normal::new(0.0, phase_error)
        .map_err(|e| ArlError::InvalidArgument(format!("phase distribution: {e}")))?;
    let amps = LogNormal::new(0.0, amplitude_error)
        .map_err(|e| ArlError::InvalidArgument(format!("amplitude distribution: {e}")))?;
    let leaks = Normal::new(0.0, leakage)
        .map_err(|e| ArlError::InvalidArgument(format!("leakage distribution: {e}")))?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let (ntimes, nant, nchan, nrec, _) = gt.gain.dim();

    let mut phase = vec![vec![0.0; nchan]; ntimes * nant];
    if phase_error > 0.0 {
        for spectrum in phase.iter_mut() {
            *spectrum = draw_spectrum(&phases, &mut rng, nchan, smooth_channels);
        }
    }
    let mut amp = vec![vec![1.0; nchan]; ntimes * nant];
    if amplitude_error > 0.0 {
        for spectrum in amp.iter_mut() {
            *spectrum = draw_spectrum(&amps, &mut rng, nchan, smooth_channels);
            if smooth_channels > 1 {
                let mean = spectrum.iter().sum::<f64>() / nchan as f64;
                spectrum.iter_mut().for_each(|a| *a /= mean);
            }
        }
    }

    let zero = Complex64::new(0.0, 0.0);
    for t in 0..ntimes {
        for a in 0..nant {
            for c in 0..nchan {
                let g = Complex64::from_polar(amp[t * nant + a][c], phase[t * nant + a][c]);
                for p in 0..nrec {
                    for q in 0..nrec {
                        gt.gain[[t, a, c, p, q]] = if p == q { g } else { zero };
                    }
                }
            }
        }
    }

    if nrec > 1 && leakage > 0.0 {
        for (p, q) in [(0, 1), (1, 0)] {
            for t in 0..ntimes {
                for a in 0..nant {
                    for c in 0..nchan {
                        let e = Complex64::new(leaks.sample(&mut rng), leaks.sample(&mut rng));
                        gt.gain[[t, a, c, p, q]] = gt.gain[[t, a, c, p, p]] * e;
                    }
                }
            }
        }
    }
    Ok(())
}
