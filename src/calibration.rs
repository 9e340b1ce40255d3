//! Antenna gain calibration.
//!
//! Each antenna carries a receptor Jones matrix `J`; the coherency matrix of
//! baseline `(i, j)` is observed as `J_i V J_j^H`. Solutions are diagonal:
//! they are found per (time, channel, receptor) from the parallel-hand
//! products by iterative substitution, averaging successive iterates on even
//! iterations.

use std::fmt;

use nalgebra::Matrix2;
use num_complex::Complex64;
use rayon::prelude::*;

use crate::data::{BlockVisibility, GainTable};
use crate::error::ArlError;

/// An identity gain table on the time and frequency axes of `block`.
pub fn create_gaintable_from_blockvisibility(block: &BlockVisibility, nrec: usize) -> GainTable {
    GainTable::unity(
        block.time.clone(),
        block.frequency.clone(),
        block.nant,
        nrec,
        block.polarisation_frame,
    )
}

fn check_table(block: &BlockVisibility, gt: &GainTable) -> Result<(), ArlError> {
    if gt.nant() != block.nant {
        return Err(ArlError::ShapeMismatch(format!(
            "gain table has {} antennas, visibilities have {}",
            gt.nant(),
            block.nant
        )));
    }
    if gt.nchan() != block.nchan() {
        return Err(ArlError::ShapeMismatch(format!(
            "gain table has {} channels, visibilities have {}",
            gt.nchan(),
            block.nchan()
        )));
    }
    let needed = block
        .polarisation_frame
        .receptor_pairs()
        .iter()
        .map(|&(p, q)| p.max(q) + 1)
        .max()
        .unwrap_or(1);
    if gt.nrec() < needed {
        return Err(ArlError::ShapeMismatch(format!(
            "frame {} needs {needed} receptors, gain table has {}",
            block.polarisation_frame,
            gt.nrec()
        )));
    }
    if gt.ntimes() == 0 {
        return Err(ArlError::InvalidArgument("gain table has no solution times".to_string()));
    }
    Ok(())
}

/// The Jones matrix of `(t, ant, chan)`, inverted when `inverse` is set.
///
/// Singular matrices invert to zero.
fn jones_matrix(gt: &GainTable, t: usize, ant: usize, chan: usize, inverse: bool) -> Matrix2<Complex64> {
    let j = gt.jones(t, ant, chan);
    let m = Matrix2::new(j[[0, 0]], j[[0, 1]], j[[1, 0]], j[[1, 1]]);
    if inverse {
        m.try_inverse().unwrap_or_else(Matrix2::zeros)
    } else {
        m
    }
}

/// Apply the gains of each baseline's antennas to the visibilities in
/// `block`, or remove them when `inverse` is set.
///
/// Each integration uses the solution interval nearest in time. With one
/// receptor the factor is `g_i conj(g_j)`; with two, the coherency matrix
/// becomes `J_i V J_j^H` (or `J_i^-1 V J_j^-H`). Correlations the frame does
/// not carry are taken as zero. Gains that cannot be inverted zero the
/// baseline.
pub fn apply_gaintable(block: &mut BlockVisibility, gt: &GainTable, inverse: bool) -> Result<(), ArlError> {
    check_table(block, gt)?;
    let pairs = block.polarisation_frame.receptor_pairs();
    let zero = Complex64::new(0.0, 0.0);
    let nchan = block.nchan();

    for t in 0..block.ntimes() {
        let gt_t = gt.nearest_time(block.time[t]);
        if gt.nrec() == 1 {
            for (b, &(a1, a2)) in block.baselines.iter().enumerate() {
                for c in 0..nchan {
                    let g = gt.gain[[gt_t, a1, c, 0, 0]] * gt.gain[[gt_t, a2, c, 0, 0]].conj();
                    let factor = if !inverse {
                        g
                    } else if g.norm_sqr() > 0.0 {
                        g.inv()
                    } else {
                        zero
                    };
                    for p in 0..pairs.len() {
                        block.vis[[t, b, c, p]] *= factor;
                    }
                }
            }
            continue;
        }

        let jones: Vec<Matrix2<Complex64>> = (0..block.nant)
            .flat_map(|a| (0..nchan).map(move |c| (a, c)))
            .map(|(a, c)| jones_matrix(gt, gt_t, a, c, inverse))
            .collect();
        for (b, &(a1, a2)) in block.baselines.iter().enumerate() {
            for c in 0..nchan {
                let mut coherency = Matrix2::<Complex64>::zeros();
                for (p, &(r1, r2)) in pairs.iter().enumerate() {
                    coherency[(r1, r2)] = block.vis[[t, b, c, p]];
                }
                let corrupted = jones[a1 * nchan + c] * coherency * jones[a2 * nchan + c].adjoint();
                for (p, &(r1, r2)) in pairs.iter().enumerate() {
                    block.vis[[t, b, c, p]] = corrupted[(r1, r2)];
                }
            }
        }
    }
    log::debug!(
        "apply_gaintable: applied {}gains to {} integrations",
        if inverse { "inverse " } else { "" },
        block.ntimes()
    );
    Ok(())
}

/// One baseline's observed and model products for a single receptor.
struct Sample {
    a1: usize,
    a2: usize,
    data: Complex64,
    model: Complex64,
    weight: f64,
}

struct Solution {
    gains: Vec<Complex64>,
    weights: Vec<f64>,
    residual: f64,
    iterations: usize,
}

fn solve_antenna_gains(
    nant: usize,
    samples: &[Sample],
    phase_only: bool,
    niter: usize,
    tol: f64,
) -> Solution {
    let unit = Complex64::new(1.0, 0.0);
    let zero = Complex64::new(0.0, 0.0);
    let normalise = |g: Complex64| {
        let amp = g.norm();
        if amp > 0.0 {
            g / amp
        } else {
            g
        }
    };

    let mut gains = vec![unit; nant];
    let mut new_gains = vec![unit; nant];
    let mut top = vec![zero; nant];
    let mut bot = vec![0.0; nant];
    let mut iterations = 0;

    for iteration in 1..=niter {
        iterations = iteration;
        top.iter_mut().for_each(|v| *v = zero);
        bot.iter_mut().for_each(|v| *v = 0.0);
        for s in samples {
            let (gi, gj) = (gains[s.a1], gains[s.a2]);
            top[s.a1] += s.data * gj * s.model.conj() * s.weight;
            bot[s.a1] += gj.norm_sqr() * s.model.norm_sqr() * s.weight;
            top[s.a2] += s.data.conj() * gi * s.model * s.weight;
            bot[s.a2] += gi.norm_sqr() * s.model.norm_sqr() * s.weight;
        }
        for a in 0..nant {
            new_gains[a] = if bot[a] > 0.0 { top[a] / bot[a] } else { gains[a] };
            if phase_only {
                new_gains[a] = normalise(new_gains[a]);
            }
        }

        if iteration % 2 == 0 {
            let change = gains
                .iter()
                .zip(&new_gains)
                .fold(0.0_f64, |m, (g, n)| m.max((n - g).norm()));
            for (g, n) in gains.iter_mut().zip(&new_gains) {
                *g = 0.5 * (*g + n);
                if phase_only {
                    *g = normalise(*g);
                }
            }
            if change < tol {
                break;
            }
        } else {
            gains.copy_from_slice(&new_gains);
        }
    }

    // Reference the phases to antenna 0.
    let reference = gains[0];
    if reference.norm() > 0.0 {
        let rotation = reference.conj() / reference.norm();
        gains.iter_mut().for_each(|g| *g *= rotation);
    }

    let (mut num, mut den) = (0.0, 0.0);
    for s in samples {
        let predicted = gains[s.a1] * gains[s.a2].conj() * s.model;
        num += s.weight * (s.data - predicted).norm_sqr();
        den += s.weight * s.model.norm_sqr();
    }
    let residual = if den > 0.0 { (num / den).sqrt() } else { 0.0 };

    Solution {
        gains,
        weights: bot,
        residual,
        iterations,
    }
}

/// Solve for antenna gains that take `model` to the observed `block`.
///
/// One solution is found per integration of `block`. With `phase_only`
/// the gain amplitudes are held at one. Iteration stops after `niter`
/// steps or when no gain changes by more than `tol`.
pub fn solve_gaintable(
    block: &BlockVisibility,
    model: &BlockVisibility,
    phase_only: bool,
    niter: usize,
    tol: f64,
) -> Result<GainTable, ArlError> {
    if block.vis.dim() != model.vis.dim() || block.baselines != model.baselines {
        return Err(ArlError::ShapeMismatch(format!(
            "observed {:?} and model {:?} visibilities differ",
            block.vis.dim(),
            model.vis.dim()
        )));
    }
    if niter == 0 {
        return Err(ArlError::InvalidArgument("niter must be positive".to_string()));
    }

    let frame = block.polarisation_frame;
    let mut gt = create_gaintable_from_blockvisibility(block, frame.nrec());
    let pairs = frame.receptor_pairs();
    let hands: Vec<(usize, usize)> = frame
        .parallel_hands()
        .iter()
        .map(|&p| (p, pairs[p].0))
        .collect();

    let cells: Vec<(usize, usize, usize, usize)> = (0..block.ntimes())
        .flat_map(|t| (0..block.nchan()).map(move |c| (t, c)))
        .flat_map(|(t, c)| hands.iter().map(move |&(p, r)| (t, c, p, r)))
        .collect();

    let solutions: Vec<Solution> = cells
        .par_iter()
        .map(|&(t, c, p, _)| {
            let samples: Vec<Sample> = block
                .baselines
                .iter()
                .enumerate()
                .filter(|(_, &(a1, a2))| a1 != a2)
                .map(|(b, &(a1, a2))| Sample {
                    a1,
                    a2,
                    data: block.vis[[t, b, c, p]],
                    model: model.vis[[t, b, c, p]],
                    weight: block.weight[[t, b, c, p]],
                })
                .collect();
            solve_antenna_gains(block.nant, &samples, phase_only, niter, tol)
        })
        .collect();

    let mut worst = 0.0_f64;
    for (&(t, c, _, r), solution) in cells.iter().zip(solutions) {
        for a in 0..block.nant {
            gt.gain[[t, a, c, r, r]] = solution.gains[a];
            gt.weight[[t, a, c, r]] = solution.weights[a];
        }
        gt.residual[[t, c, r]] = solution.residual;
        worst = worst.max(solution.residual);
        log::trace!(
            "solve_gaintable: time {t} channel {c} receptor {r}: {} iterations, residual {:.3e}",
            solution.iterations,
            solution.residual
        );
    }
    log::info!(
        "solve_gaintable: solved {} cells ({}), worst residual {worst:.3e}",
        cells.len(),
        if phase_only { "phase only" } else { "amplitude and phase" }
    );
    log::debug!("solve_gaintable: {}", qa_gaintable(&gt));
    Ok(gt)
}

/// Summary statistics of a gain table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainTableQa {
    /// Largest parallel-hand gain amplitude.
    pub max_abs: f64,
    /// Smallest parallel-hand gain amplitude.
    pub min_abs: f64,
    /// RMS parallel-hand gain amplitude.
    pub rms: f64,
    /// Median parallel-hand gain amplitude.
    pub median_abs: f64,
    /// Largest cross-hand (leakage) amplitude, 0 for one receptor.
    pub max_leakage: f64,
    /// Largest fit residual.
    pub max_residual: f64,
    /// Fraction of gains with positive weight.
    pub weighted_fraction: f64,
}

impl fmt::Display for GainTableQa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "|g| max {:.4} min {:.4} rms {:.4} median {:.4}, leakage max {:.4}, residual max {:.3e}, {:.1}% weighted",
            self.max_abs,
            self.min_abs,
            self.rms,
            self.median_abs,
            self.max_leakage,
            self.max_residual,
            100.0 * self.weighted_fraction
        )
    }
}

/// Assess the quality of a gain table.
pub fn qa_gaintable(gt: &GainTable) -> GainTableQa {
    let (ntimes, nant, nchan, nrec, _) = gt.gain.dim();
    let mut amps = Vec::with_capacity(ntimes * nant * nchan * nrec);
    let mut max_leakage = 0.0_f64;
    for ((_, _, _, p, q), g) in gt.gain.indexed_iter() {
        if p == q {
            amps.push(g.norm());
        } else {
            max_leakage = max_leakage.max(g.norm());
        }
    }
    amps.sort_by(f64::total_cmp);

    let n = amps.len();
    let median_abs = match n {
        0 => 0.0,
        _ if n % 2 == 1 => amps[n / 2],
        _ => 0.5 * (amps[n / 2 - 1] + amps[n / 2]),
    };
    let rms = if n > 0 {
        (amps.iter().map(|a| a * a).sum::<f64>() / n as f64).sqrt()
    } else {
        0.0
    };
    let weighted = gt.weight.iter().filter(|&&w| w > 0.0).count();
    GainTableQa {
        max_abs: amps.last().copied().unwrap_or(0.0),
        min_abs: amps.first().copied().unwrap_or(0.0),
        rms,
        median_abs,
        max_leakage,
        max_residual: gt.residual.iter().copied().fold(0.0, f64::max),
        weighted_fraction: if gt.weight.is_empty() {
            0.0
        } else {
            weighted as f64 / gt.weight.len() as f64
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{create_named_configuration, PhaseCentre, PolarisationFrame};
    use crate::simulation::{create_blockvisibility, simulate_gaintable};
    use approx::assert_abs_diff_eq;

    fn model_block(frame: PolarisationFrame) -> BlockVisibility {
        let config = create_named_configuration("VLAA", None).unwrap();
        let mut block = create_blockvisibility(
            &config,
            &[-0.1, 0.1],
            &[1e8, 1.1e8],
            &[1e6, 1e6],
            PhaseCentre::new(15.0, -35.0),
            frame,
            1.0,
        )
        .unwrap();
        // A unit point source at the phase centre on the parallel hands.
        for &p in frame.parallel_hands() {
            block
                .vis
                .slice_mut(ndarray::s![.., .., .., p])
                .fill(Complex64::new(1.0, 0.0));
        }
        block
    }

    #[test]
    fn test_apply_then_inverse_is_identity() {
        let model = model_block(PolarisationFrame::Linear);
        let mut gt = create_gaintable_from_blockvisibility(&model, 2);
        simulate_gaintable(&mut gt, 0.3, 0.1, 1, 0.05, 7).unwrap();

        let mut block = model.copy(false);
        apply_gaintable(&mut block, &gt, false).unwrap();
        assert!(block
            .vis
            .iter()
            .zip(model.vis.iter())
            .any(|(a, b)| (a - b).norm() > 1e-3));
        apply_gaintable(&mut block, &gt, true).unwrap();
        for (a, b) in block.vis.iter().zip(model.vis.iter()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-12);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_solve_recovers_gains() {
        let model = model_block(PolarisationFrame::StokesI);
        let mut truth = create_gaintable_from_blockvisibility(&model, 1);
        simulate_gaintable(&mut truth, 0.5, 0.1, 1, 0.0, 11).unwrap();
        let mut observed = model.copy(false);
        apply_gaintable(&mut observed, &truth, false).unwrap();

        let solved = solve_gaintable(&observed, &model, false, 200, 1e-12).unwrap();
        for t in 0..solved.ntimes() {
            for c in 0..solved.nchan() {
                let g0 = truth.gain[[t, 0, c, 0, 0]];
                let rotation = g0.conj() / g0.norm();
                for a in 0..solved.nant() {
                    let expected = truth.gain[[t, a, c, 0, 0]] * rotation;
                    let got = solved.gain[[t, a, c, 0, 0]];
                    assert_abs_diff_eq!(got.re, expected.re, epsilon = 1e-6);
                    assert_abs_diff_eq!(got.im, expected.im, epsilon = 1e-6);
                }
                assert!(solved.residual[[t, c, 0]] < 1e-6);
            }
        }

        // Correcting with the solution restores the model.
        apply_gaintable(&mut observed, &solved, true).unwrap();
        for (a, b) in observed.vis.iter().zip(model.vis.iter()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-5);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_phase_only_solution_has_unit_amplitude() {
        let model = model_block(PolarisationFrame::LinearNp);
        let mut truth = create_gaintable_from_blockvisibility(&model, 2);
        simulate_gaintable(&mut truth, 0.4, 0.0, 1, 0.0, 3).unwrap();
        let mut observed = model.copy(false);
        apply_gaintable(&mut observed, &truth, false).unwrap();

        let solved = solve_gaintable(&observed, &model, true, 200, 1e-12).unwrap();
        for ((_, _, _, p, q), g) in solved.gain.indexed_iter() {
            if p == q {
                assert_abs_diff_eq!(g.norm(), 1.0, epsilon = 1e-9);
            } else {
                assert_eq!(*g, Complex64::new(0.0, 0.0));
            }
        }
        assert!(solved.residual.iter().all(|&r| r < 1e-6));
        assert_abs_diff_eq!(solved.gain[[0, 0, 0, 1, 1]].im, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_leakage_mixes_hands() {
        // Unpolarised source: XX = YY = 1, XY = YX = 0.
        let model = model_block(PolarisationFrame::Linear);
        let mut gt = create_gaintable_from_blockvisibility(&model, 2);
        let (t, a1, a2, c) = (0, 0, 1, 0);
        gt.gain[[t, a1, c, 0, 1]] = Complex64::new(0.1, 0.0);
        gt.gain[[t, a2, c, 1, 0]] = Complex64::new(0.0, 0.2);

        let mut block = model.copy(false);
        apply_gaintable(&mut block, &gt, false).unwrap();
        let b = block.baselines.iter().position(|&bl| bl == (a1, a2)).unwrap();
        let v = block.vis.slice(ndarray::s![t, b, c, ..]).to_vec();
        // J1 V J2^H with J1 = [[1, 0.1], [0, 1]], J2 = [[1, 0], [0.2i, 1]].
        let expected = [
            Complex64::new(1.0, 0.0),
            Complex64::new(0.1, -0.2),
            Complex64::new(0.0, 0.0),
            Complex64::new(1.0, 0.0),
        ];
        for (got, want) in v.iter().zip(expected) {
            assert_abs_diff_eq!(got.re, want.re, epsilon = 1e-12);
            assert_abs_diff_eq!(got.im, want.im, epsilon = 1e-12);
        }

        // Removing the same gains restores the model.
        apply_gaintable(&mut block, &gt, true).unwrap();
        for (a, b) in block.vis.iter().zip(model.vis.iter()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-12);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_singular_gain_zeroes_on_inverse() {
        let model = model_block(PolarisationFrame::Linear);
        let mut gt = create_gaintable_from_blockvisibility(&model, 2);
        gt.gain.slice_mut(ndarray::s![.., 3, .., .., ..]).fill(Complex64::new(0.0, 0.0));
        let mut block = model.copy(false);
        apply_gaintable(&mut block, &gt, true).unwrap();
        for (b, &(a1, a2)) in block.baselines.iter().enumerate() {
            let touched = a1 == 3 || a2 == 3;
            let v = block.vis[[0, b, 0, 0]];
            assert_eq!(v == Complex64::new(0.0, 0.0), touched, "baseline {a1}-{a2}");
        }
    }

    #[test]
    fn test_qa_gaintable() {
        let model = model_block(PolarisationFrame::Linear);
        let mut gt = create_gaintable_from_blockvisibility(&model, 2);
        let qa = qa_gaintable(&gt);
        assert_eq!((qa.max_abs, qa.min_abs, qa.rms, qa.median_abs), (1.0, 1.0, 1.0, 1.0));
        assert_eq!(qa.max_leakage, 0.0);
        assert_eq!(qa.weighted_fraction, 1.0);

        gt.gain[[0, 2, 1, 0, 0]] = Complex64::new(0.0, 3.0);
        gt.gain[[1, 4, 0, 1, 0]] = Complex64::new(0.3, 0.4);
        gt.residual[[1, 0, 1]] = 0.25;
        gt.weight[[0, 0, 0, 0]] = 0.0;
        let qa = qa_gaintable(&gt);
        assert_abs_diff_eq!(qa.max_abs, 3.0);
        assert_abs_diff_eq!(qa.min_abs, 1.0);
        assert_abs_diff_eq!(qa.median_abs, 1.0);
        assert_abs_diff_eq!(qa.max_leakage, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(qa.max_residual, 0.25);
        assert!(qa.weighted_fraction < 1.0);
        assert!(qa.to_string().contains("leakage max 0.5000"));
    }

    #[test]
    fn test_mismatched_model_rejected() {
        let model = model_block(PolarisationFrame::StokesI);
        let other = model_block(PolarisationFrame::Linear);
        assert!(matches!(
            solve_gaintable(&model, &other, false, 10, 1e-8),
            Err(ArlError::ShapeMismatch(_))
        ));
    }
}
