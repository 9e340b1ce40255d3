//! Clean beam fitting.

use std::f64::consts::LN_2;

use nalgebra::{DMatrix, DVector};
use ndarray::prelude::*;

use super::peak;

/// Half-width of the box around the PSF peak used for fitting.
const FIT_HALF_WIDTH: isize = 2;

/// Samples below this fraction of the peak are left out of the fit.
const FIT_LEVEL: f64 = 0.1;

/// An elliptical Gaussian with unit peak,
/// `exp(-(cxx dx^2 + cxy dx dy + cyy dy^2))` for pixel offsets `(dy, dx)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanBeam {
    pub cxx: f64,
    pub cxy: f64,
    pub cyy: f64,
}

impl CleanBeam {
    /// A circular beam with the given full width at half maximum in pixels.
    pub fn circular(fwhm: f64) -> Self {
        let c = 4.0 * LN_2 / (fwhm * fwhm);
        Self {
            cxx: c,
            cxy: 0.0,
            cyy: c,
        }
    }

    fn is_valid(&self) -> bool {
        self.cxx > 0.0 && self.cyy > 0.0 && 4.0 * self.cxx * self.cyy > self.cxy * self.cxy
    }

    #[inline]
    pub fn value(&self, dy: f64, dx: f64) -> f64 {
        (-(self.cxx * dx * dx + self.cxy * dx * dy + self.cyy * dy * dy)).exp()
    }

    /// Major and minor full widths at half maximum in pixels, and the
    /// position angle of the major axis in radians from the x axis.
    pub fn axes(&self) -> (f64, f64, f64) {
        let mean = 0.5 * (self.cxx + self.cyy);
        let diff = 0.5 * (self.cxx - self.cyy);
        let root = (diff * diff + 0.25 * self.cxy * self.cxy).sqrt();
        let (small, large) = (mean - root, mean + root);
        let fwhm = |lambda: f64| 2.0 * (LN_2 / lambda).sqrt();
        let angle = 0.5 * (-self.cxy).atan2(self.cyy - self.cxx);
        (fwhm(small), fwhm(large), angle)
    }

    /// The beam sampled on an `(ny, nx)` plane with its peak at `(ny / 2, nx / 2)`.
    pub fn kernel(&self, ny: usize, nx: usize) -> Array2<f64> {
        let (cy, cx) = ((ny / 2) as f64, (nx / 2) as f64);
        Array2::from_shape_fn((ny, nx), |(y, x)| self.value(y as f64 - cy, x as f64 - cx))
    }
}

/// Fit an elliptical Gaussian to the main lobe of `psf`.
///
/// A quadratic surface is fitted by least squares to `ln(psf)` in a small
/// box around the peak. If the fit fails, or does not describe a closed
/// ellipse, a one-pixel circular beam is returned instead.
pub fn fit_clean_beam(psf: ArrayView2<f64>) -> CleanBeam {
    let fallback = CleanBeam::circular(1.0);
    let ((py, px), pmax) = peak(&psf);
    if !(pmax > 0.0) {
        log::warn!("fit_clean_beam: PSF has no positive peak, using a 1 pixel beam");
        return fallback;
    }

    let (ny, nx) = psf.dim();
    let mut rows: Vec<[f64; 6]> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    for dy in -FIT_HALF_WIDTH..=FIT_HALF_WIDTH {
        for dx in -FIT_HALF_WIDTH..=FIT_HALF_WIDTH {
            let (y, x) = (py as isize + dy, px as isize + dx);
            if y < 0 || x < 0 || y >= ny as isize || x >= nx as isize {
                continue;
            }
            let v = psf[[y as usize, x as usize]] / pmax;
            if v <= FIT_LEVEL {
                continue;
            }
            let (fy, fx) = (dy as f64, dx as f64);
            rows.push([1.0, fx, fy, fx * fx, fx * fy, fy * fy]);
            values.push(v.ln());
        }
    }
    if rows.len() < 6 {
        log::warn!(
            "fit_clean_beam: only {} samples above {FIT_LEVEL} of peak, using a 1 pixel beam",
            rows.len()
        );
        return fallback;
    }

    let design = DMatrix::from_fn(rows.len(), 6, |r, c| rows[r][c]);
    let target = DVector::from_vec(values);
    let solution = match design.svd(true, true).solve(&target, 1e-12) {
        Ok(solution) => solution,
        Err(err) => {
            log::warn!("fit_clean_beam: least squares failed ({err}), using a 1 pixel beam");
            return fallback;
        }
    };

    let beam = CleanBeam {
        cxx: -solution[3],
        cxy: -solution[4],
        cyy: -solution[5],
    };
    if !beam.is_valid() {
        log::warn!("fit_clean_beam: fitted surface {beam:?} is not a closed ellipse, using a 1 pixel beam");
        return fallback;
    }
    let (bmaj, bmin, bpa) = beam.axes();
    log::debug!("fit_clean_beam: bmaj {bmaj:.3} px, bmin {bmin:.3} px, bpa {:.1} deg", bpa.to_degrees());
    beam
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_recovers_elliptical_gaussian() {
        let truth = CleanBeam {
            cxx: 0.3,
            cxy: 0.1,
            cyy: 0.15,
        };
        let psf = truth.kernel(32, 32);
        let fitted = fit_clean_beam(psf.view());
        assert_abs_diff_eq!(fitted.cxx, truth.cxx, epsilon = 1e-9);
        assert_abs_diff_eq!(fitted.cxy, truth.cxy, epsilon = 1e-9);
        assert_abs_diff_eq!(fitted.cyy, truth.cyy, epsilon = 1e-9);
    }

    #[test]
    fn test_circular_axes() {
        let (bmaj, bmin, _) = CleanBeam::circular(3.0).axes();
        assert_abs_diff_eq!(bmin, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(bmaj, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(CleanBeam::circular(3.0).value(0.0, 1.5), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_falls_back_for_delta_psf() {
        let mut psf = Array2::zeros((16, 16));
        psf[[8, 8]] = 1.0;
        assert_eq!(fit_clean_beam(psf.view()), CleanBeam::circular(1.0));
        let empty = Array2::<f64>::zeros((16, 16));
        assert_eq!(fit_clean_beam(empty.view()), CleanBeam::circular(1.0));
    }
}
