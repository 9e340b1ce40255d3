//! Multi-scale CLEAN (Cornwell 2008).
//!
//! The residual is smoothed with a set of tapered scale kernels and each
//! minor cycle removes a scaled kernel at the scale and position with the
//! largest coupling-normalised residual.

use ndarray::prelude::*;

use super::{argmax_abs, overlap, peak, DeconvolutionAlgorithm, DeconvolveConfig, Deconvolver};
use crate::error::ArlError;
use crate::imaging::fft::convolve;
use crate::imaging::kernel::grdsf;

/// Fraction of a smoothed window that must remain inside the clean window.
const WINDOW_LEVEL: f64 = 0.9;

/// Multi-scale CLEAN over `config.scales`.
#[derive(Debug, Clone)]
pub struct MultiScaleClean {
    config: DeconvolveConfig,
}

impl MultiScaleClean {
    pub fn new(config: DeconvolveConfig) -> Self {
        Self { config }
    }
}

/// A tapered scale kernel of width `scale` pixels centred on `(ny / 2, nx / 2)`,
/// normalised to unit sum. Scale 0 is a delta function.
pub fn scale_kernel(scale: f64, ny: usize, nx: usize) -> Array2<f64> {
    let (cy, cx) = (ny / 2, nx / 2);
    let mut kernel = Array2::zeros((ny, nx));
    if scale <= 0.0 {
        kernel[[cy, cx]] = 1.0;
        return kernel;
    }

    let radius = scale / 2.0;
    let half = radius.ceil() as isize;
    for dy in -half..=half {
        for dx in -half..=half {
            let (y, x) = (cy as isize + dy, cx as isize + dx);
            if y < 0 || x < 0 || y >= ny as isize || x >= nx as isize {
                continue;
            }
            let r = ((dy * dy + dx * dx) as f64).sqrt() / radius;
            kernel[[y as usize, x as usize]] = (grdsf(r) * (1.0 - r * r)).max(0.0);
        }
    }
    let sum = kernel.sum();
    if sum > 0.0 {
        kernel /= sum;
    } else {
        kernel[[cy, cx]] = 1.0;
    }
    kernel
}

/// Precomputed scale products for one plane.
struct ScaleStack {
    scales: Vec<f64>,
    kernels: Vec<Array2<f64>>,
}

impl ScaleStack {
    fn new(scales: &[f64], ny: usize, nx: usize) -> Self {
        Self {
            scales: scales.to_vec(),
            kernels: scales.iter().map(|&s| scale_kernel(s, ny, nx)).collect(),
        }
    }

    fn len(&self) -> usize {
        self.scales.len()
    }

    /// `image` convolved with scale `i`.
    fn smooth(&self, i: usize, image: &Array2<f64>) -> Array2<f64> {
        if self.scales[i] <= 0.0 {
            image.clone()
        } else {
            convolve(image, &self.kernels[i])
        }
    }
}

impl Deconvolver for MultiScaleClean {
    fn id(&self) -> DeconvolutionAlgorithm {
        DeconvolutionAlgorithm::MultiScale
    }

    fn deconvolve_plane(
        &self,
        dirty: ArrayView2<f64>,
        psf: ArrayView2<f64>,
        window: Option<ArrayView2<f64>>,
    ) -> Result<(Array2<f64>, Array2<f64>), ArlError> {
        let (_, pmax) = peak(&psf);
        if !(pmax > 0.0) {
            return Err(ArlError::Deconvolution(format!("PSF peak {pmax} is not positive")));
        }
        if dirty.dim() != psf.dim() {
            return Err(ArlError::ShapeMismatch(format!(
                "dirty plane {:?} and PSF plane {:?} differ",
                dirty.dim(),
                psf.dim()
            )));
        }

        let cfg = &self.config;
        let (ny, nx) = dirty.dim();
        let centre = (ny / 2, nx / 2);
        let lpsf = psf.mapv(|v| v / pmax);
        let ldirty = dirty.mapv(|v| v / pmax);

        let stack = ScaleStack::new(&cfg.scales, ny, nx);
        let nscales = stack.len();

        let mut res_stack: Vec<Array2<f64>> = (0..nscales).map(|i| stack.smooth(i, &ldirty)).collect();

        // psf_stack[i][j] = scale_i * scale_j * psf, symmetric in (i, j).
        let single: Vec<Array2<f64>> = (0..nscales).map(|j| stack.smooth(j, &lpsf)).collect();
        let mut psf_stack: Vec<Vec<Array2<f64>>> = vec![Vec::with_capacity(nscales); nscales];
        for i in 0..nscales {
            for j in 0..nscales {
                let product = if j < i {
                    psf_stack[j][i].clone()
                } else {
                    stack.smooth(i, &single[j])
                };
                psf_stack[i].push(product);
            }
        }
        let coupling: Vec<f64> = (0..nscales).map(|i| peak(&psf_stack[i][i].view()).1).collect();
        if let Some(bad) = coupling.iter().position(|c| !(*c > 0.0)) {
            return Err(ArlError::Deconvolution(format!(
                "scale {} has non-positive coupling {}",
                stack.scales[bad], coupling[bad]
            )));
        }

        let windows: Option<Vec<Array2<f64>>> = window.map(|w| {
            let w = w.to_owned();
            (0..nscales)
                .map(|i| stack.smooth(i, &w).mapv(|v| if v > WINDOW_LEVEL { 1.0 } else { 0.0 }))
                .collect()
        });

        let initial = res_stack[0].fold(0.0_f64, |m, v| m.max(v.abs()));
        let absolutethresh = (cfg.threshold / pmax).max(cfg.fracthresh * initial);
        log::debug!(
            "msclean: scales {:?}, coupling {coupling:?}, peak {initial:.6}, stopping at {absolutethresh:.6}",
            stack.scales
        );

        let mut comps = Array2::zeros((ny, nx));
        let mut iterations = 0;
        for i in 0..cfg.niter {
            let mut best = (0, (0, 0), f64::NEG_INFINITY);
            for (s, res) in res_stack.iter().enumerate() {
                let w = windows.as_ref().map(|ws| ws[s].view());
                let (at, score) = argmax_abs(&res.view(), w.as_ref());
                let score = score / coupling[s];
                if score > best.2 {
                    best = (s, at, score);
                }
            }
            let (mscale, at, _) = best;
            let value = res_stack[mscale][at];
            if value.abs() < WINDOW_LEVEL * absolutethresh {
                break;
            }
            let mval = cfg.gain * value / coupling[mscale];

            for (s, res) in res_stack.iter_mut().enumerate() {
                let ((iy, ix), (py, px)) = overlap((ny, nx), (ny, nx), centre, at);
                res.slice_mut(s![iy, ix])
                    .scaled_add(-mval, &psf_stack[s][mscale].slice(s![py, px]));
            }
            let ((iy, ix), (py, px)) = overlap((ny, nx), (ny, nx), centre, at);
            comps
                .slice_mut(s![iy, ix])
                .scaled_add(mval, &stack.kernels[mscale].slice(s![py, px]));

            iterations = i + 1;
            if iterations % 100 == 0 {
                log::trace!(
                    "msclean: minor cycle {iterations}, scale {}, peak {value:.6} at {at:?}",
                    stack.scales[mscale]
                );
            }
        }
        log::debug!("msclean: {iterations} minor cycles");

        let residual = res_stack.swap_remove(0).mapv(|v| v * pmax);
        Ok((comps, residual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deconvolution::CleanWindow;
    use approx::assert_abs_diff_eq;

    fn gaussian(n: usize, sigma: f64, amplitude: f64) -> Array2<f64> {
        let c = (n / 2) as f64;
        Array2::from_shape_fn((n, n), |(y, x)| {
            let r2 = (y as f64 - c).powi(2) + (x as f64 - c).powi(2);
            amplitude * (-r2 / (2.0 * sigma * sigma)).exp()
        })
    }

    fn config(scales: Vec<f64>) -> DeconvolveConfig {
        DeconvolveConfig {
            algorithm: DeconvolutionAlgorithm::MultiScale,
            niter: 1000,
            gain: 0.3,
            threshold: 1e-5,
            fracthresh: 1e-4,
            window: CleanWindow::None,
            scales,
        }
    }

    #[test]
    fn test_scale_kernel_normalised() {
        let delta = scale_kernel(0.0, 16, 16);
        assert_eq!(delta[[8, 8]], 1.0);
        assert_eq!(delta.sum(), 1.0);

        let k = scale_kernel(10.0, 32, 32);
        assert_abs_diff_eq!(k.sum(), 1.0, epsilon = 1e-12);
        assert!(k.iter().all(|&v| v >= 0.0));
        assert_eq!(peak(&k.view()).0, (16, 16));
        assert_eq!(k[[16, 16 + 6]], 0.0);
        assert_abs_diff_eq!(k[[16, 13]], k[[19, 16]], epsilon = 1e-15);
    }

    #[test]
    fn test_delta_scale_matches_point_clean() {
        let n = 32;
        let psf = gaussian(n, 1.5, 1.0);
        let mut dirty = Array2::zeros((n, n));
        let ((iy, ix), (py, px)) = overlap((n, n), (n, n), (n / 2, n / 2), (10, 20));
        dirty.slice_mut(s![iy, ix]).scaled_add(3.0, &psf.slice(s![py, px]));

        let (comps, res) = MultiScaleClean::new(config(vec![0.0]))
            .deconvolve_plane(dirty.view(), psf.view(), None)
            .unwrap();
        assert_abs_diff_eq!(comps[[10, 20]], 3.0, epsilon = 1e-3);
        assert_abs_diff_eq!(comps.sum(), 3.0, epsilon = 1e-3);
        assert!(res.iter().all(|v| v.abs() < 1e-3));
    }

    #[test]
    fn test_extended_source_cleaned() {
        let n = 64;
        let psf = gaussian(n, 1.5, 1.0);
        let source = gaussian(n, 3.0, 1.0);
        let dirty = convolve(&source, &psf);
        let dirty_peak = dirty.fold(0.0_f64, |m, v| m.max(v.abs()));

        let (comps, res) = MultiScaleClean::new(config(vec![0.0, 3.0, 10.0]))
            .deconvolve_plane(dirty.view(), psf.view(), None)
            .unwrap();
        let res_peak = res.fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!(res_peak < 0.1 * dirty_peak, "residual {res_peak} vs dirty {dirty_peak}");
        assert!(comps.sum() > 0.5 * source.sum());
    }

    #[test]
    fn test_residual_scaled_back_by_psf_peak() {
        // With no iterations able to run the residual is the dirty image.
        let n = 16;
        let psf = gaussian(n, 1.0, 2.0);
        let dirty = gaussian(n, 1.0, 1e-9);
        let (comps, res) = MultiScaleClean::new(config(vec![0.0, 3.0]))
            .deconvolve_plane(dirty.view(), psf.view(), None)
            .unwrap();
        assert_eq!(comps.sum(), 0.0);
        for (a, b) in res.iter().zip(dirty.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-15);
        }
    }
}
