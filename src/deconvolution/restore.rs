//! Restoration: clean components smoothed by the clean beam.

use ndarray::prelude::*;
use rayon::prelude::*;

use super::beam::fit_clean_beam;
use crate::data::Image;
use crate::error::ArlError;
use crate::imaging::fft::convolve;

/// Convolve `model` with a clean beam fitted to `psf` and add `residual`.
///
/// The beam is fitted per channel to the first polarisation of the PSF and
/// has unit peak, so a component of flux `S` restores to a peak of `S`.
pub fn restore_cube(model: &Image, psf: &Image, residual: Option<&Image>) -> Result<Image, ArlError> {
    let [nchan, npol, ny, nx] = model.shape();
    let [psf_nchan, _, psf_ny, psf_nx] = psf.shape();
    if psf_ny != ny || psf_nx != nx || psf_nchan == 0 || psf.npol() == 0 {
        return Err(ArlError::ShapeMismatch(format!(
            "model {:?} and PSF {:?} differ",
            model.shape(),
            psf.shape()
        )));
    }
    if let Some(residual) = residual {
        if residual.shape() != model.shape() {
            return Err(ArlError::ShapeMismatch(format!(
                "model {:?} and residual {:?} differ",
                model.shape(),
                residual.shape()
            )));
        }
    }

    let beams: Vec<Array2<f64>> = (0..nchan)
        .into_par_iter()
        .map(|chan| {
            let plane = psf.data.slice(s![chan.min(psf_nchan - 1), 0, .., ..]);
            fit_clean_beam(plane).kernel(ny, nx)
        })
        .collect();

    let planes: Vec<(usize, usize)> = (0..nchan)
        .flat_map(|chan| (0..npol).map(move |pol| (chan, pol)))
        .collect();
    let smoothed: Vec<Array2<f64>> = planes
        .par_iter()
        .map(|&(chan, pol)| {
            let plane = model.data.slice(s![chan, pol, .., ..]).to_owned();
            convolve(&plane, &beams[chan])
        })
        .collect();

    let mut restored = model.zeros_like();
    for (&(chan, pol), plane) in planes.iter().zip(smoothed) {
        restored.data.slice_mut(s![chan, pol, .., ..]).assign(&plane);
    }
    if let Some(residual) = residual {
        restored.data += &residual.data;
    }
    log::info!("restore_cube: restored {nchan} channels, {npol} polarisations");
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PhaseCentre, PolarisationFrame, Wcs};
    use crate::deconvolution::CleanBeam;
    use approx::assert_abs_diff_eq;

    fn image(n: usize) -> Image {
        let wcs = Wcs::new(PhaseCentre::new(0.0, -45.0), 1e-4, n, 1e8, 1e6);
        Image::zeros([1, 1, n, n], wcs, PolarisationFrame::StokesI).unwrap()
    }

    #[test]
    fn test_point_restores_to_beam() {
        let n = 32;
        let beam = CleanBeam::circular(3.0);
        let mut psf = image(n);
        psf.data.slice_mut(s![0, 0, .., ..]).assign(&beam.kernel(n, n));
        let mut model = image(n);
        model.data[[0, 0, 10, 12]] = 2.0;
        let mut residual = image(n);
        residual.data.fill(0.01);

        let restored = restore_cube(&model, &psf, Some(&residual)).unwrap();
        assert_abs_diff_eq!(restored.data[[0, 0, 10, 12]], 2.01, epsilon = 1e-6);
        assert_abs_diff_eq!(restored.data[[0, 0, 10, 13]], 2.0 * beam.value(0.0, 1.0) + 0.01, epsilon = 1e-6);
    }

    #[test]
    fn test_shape_mismatch() {
        let model = image(16);
        let psf = image(32);
        assert!(matches!(restore_cube(&model, &psf, None), Err(ArlError::ShapeMismatch(_))));
    }
}
