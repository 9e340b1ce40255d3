//! Hogbom CLEAN.

use ndarray::prelude::*;

use super::{argmax_abs, overlap, peak, DeconvolutionAlgorithm, DeconvolveConfig, Deconvolver};
use crate::error::ArlError;

/// Point-source CLEAN: repeatedly subtract a scaled PSF at the brightest
/// residual pixel.
#[derive(Debug, Clone)]
pub struct HogbomClean {
    config: DeconvolveConfig,
}

impl HogbomClean {
    pub fn new(config: DeconvolveConfig) -> Self {
        Self { config }
    }
}

impl Deconvolver for HogbomClean {
    fn id(&self) -> DeconvolutionAlgorithm {
        DeconvolutionAlgorithm::Hogbom
    }

    fn deconvolve_plane(
        &self,
        dirty: ArrayView2<f64>,
        psf: ArrayView2<f64>,
        window: Option<ArrayView2<f64>>,
    ) -> Result<(Array2<f64>, Array2<f64>), ArlError> {
        let (psf_peak, pmax) = peak(&psf);
        if !(pmax > 0.0) {
            return Err(ArlError::Deconvolution(format!(
                "PSF peak {pmax} at {psf_peak:?} is not positive"
            )));
        }

        let cfg = &self.config;
        let mut comps = Array2::zeros(dirty.raw_dim());
        let mut res = dirty.to_owned();

        let initial = res.fold(0.0_f64, |m, v| m.max(v.abs()));
        let absolutethresh = cfg.threshold.max(cfg.fracthresh * initial);
        log::debug!("hogbom: peak {initial:.6}, stopping at {absolutethresh:.6}");

        let mut iterations = 0;
        for i in 0..cfg.niter {
            let (at, score) = argmax_abs(&res.view(), window.as_ref());
            if score < absolutethresh {
                break;
            }
            let mval = res[at] * cfg.gain / pmax;
            comps[at] += mval;

            let ((iy, ix), (py, px)) = overlap(res.dim(), psf.dim(), psf_peak, at);
            res.slice_mut(s![iy, ix])
                .scaled_add(-mval, &psf.slice(s![py, px]));

            iterations = i + 1;
            if iterations % 100 == 0 {
                log::trace!("hogbom: minor cycle {iterations}, peak {:.6} at {at:?}", res[at]);
            }
        }
        log::debug!("hogbom: {iterations} minor cycles");
        Ok((comps, res))
    }
}
