//! CLEAN deconvolution and restoration.
//!
//! Each (channel, polarisation) plane is cleaned independently by a
//! [`Deconvolver`]; [`deconvolve_cube`] runs the planes in parallel.

pub mod beam;
pub mod hogbom;
pub mod msclean;
pub mod restore;

pub use beam::{fit_clean_beam, CleanBeam};
pub use hogbom::HogbomClean;
pub use msclean::MultiScaleClean;
pub use restore::restore_cube;

use std::ops::Range;

use ndarray::prelude::*;
use rayon::prelude::*;

use crate::data::Image;
use crate::error::ArlError;

/// Identifier for a deconvolution algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeconvolutionAlgorithm {
    /// Point-source CLEAN.
    Hogbom,
    /// Multi-scale CLEAN.
    MultiScale,
}

impl DeconvolutionAlgorithm {
    /// Get the string name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            DeconvolutionAlgorithm::Hogbom => "hogbom",
            DeconvolutionAlgorithm::MultiScale => "msclean",
        }
    }
}

/// Region of the image searched for components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanWindow {
    /// The whole image.
    None,
    /// The central half in each axis.
    Quarter,
}

impl CleanWindow {
    /// Mask of searchable pixels for an `(ny, nx)` plane.
    pub fn mask(&self, ny: usize, nx: usize) -> Option<Array2<f64>> {
        match self {
            CleanWindow::None => None,
            CleanWindow::Quarter => {
                let mut window = Array2::zeros((ny, nx));
                window
                    .slice_mut(s![ny / 4..3 * ny / 4, nx / 4..3 * nx / 4])
                    .fill(1.0);
                Some(window)
            }
        }
    }
}

/// Configuration for deconvolution.
#[derive(Debug, Clone)]
pub struct DeconvolveConfig {
    pub algorithm: DeconvolutionAlgorithm,
    /// Maximum number of minor cycles per plane.
    pub niter: usize,
    /// Loop gain.
    pub gain: f64,
    /// Absolute stopping threshold \[Jy/beam\].
    pub threshold: f64,
    /// Stopping threshold as a fraction of the initial peak.
    pub fracthresh: f64,
    pub window: CleanWindow,
    /// Scale sizes in pixels for multi-scale CLEAN.
    pub scales: Vec<f64>,
}

impl Default for DeconvolveConfig {
    fn default() -> Self {
        Self {
            algorithm: DeconvolutionAlgorithm::MultiScale,
            niter: 1000,
            gain: 0.7,
            threshold: 0.001,
            fracthresh: 0.01,
            window: CleanWindow::Quarter,
            scales: vec![0.0, 3.0, 10.0, 30.0],
        }
    }
}

impl DeconvolveConfig {
    /// Check the loop parameters.
    pub fn validate(&self) -> Result<(), ArlError> {
        if !(self.gain > 0.0 && self.gain < 2.0) {
            return Err(ArlError::InvalidArgument(format!(
                "loop gain must be in (0, 2), got {}",
                self.gain
            )));
        }
        if self.niter == 0 {
            return Err(ArlError::InvalidArgument("niter must be positive".to_string()));
        }
        if self.algorithm == DeconvolutionAlgorithm::MultiScale && self.scales.is_empty() {
            return Err(ArlError::InvalidArgument(
                "multi-scale CLEAN needs at least one scale".to_string(),
            ));
        }
        Ok(())
    }
}

/// A single-plane deconvolution algorithm.
pub trait Deconvolver: Send + Sync {
    /// Get the algorithm identifier.
    fn id(&self) -> DeconvolutionAlgorithm;

    /// Clean one plane, returning `(components, residual)`.
    ///
    /// The PSF peak must be positive.
    fn deconvolve_plane(
        &self,
        dirty: ArrayView2<f64>,
        psf: ArrayView2<f64>,
        window: Option<ArrayView2<f64>>,
    ) -> Result<(Array2<f64>, Array2<f64>), ArlError>;

    /// Get the algorithm name.
    fn name(&self) -> &'static str {
        self.id().name()
    }
}

/// The deconvolver selected by `config`.
pub fn create_deconvolver(config: &DeconvolveConfig) -> Box<dyn Deconvolver> {
    match config.algorithm {
        DeconvolutionAlgorithm::Hogbom => Box::new(HogbomClean::new(config.clone())),
        DeconvolutionAlgorithm::MultiScale => Box::new(MultiScaleClean::new(config.clone())),
    }
}

/// Where a PSF with its peak at `psf_peak` overlaps an image when the peak
/// is placed on `at`, per axis: `(image range, psf range)`.
pub(crate) fn overlap(
    image_shape: (usize, usize),
    psf_shape: (usize, usize),
    psf_peak: (usize, usize),
    at: (usize, usize),
) -> ((Range<usize>, Range<usize>), (Range<usize>, Range<usize>)) {
    fn axis(n: usize, npsf: usize, peak: usize, at: usize) -> (Range<usize>, Range<usize>) {
        let offset = at as isize - peak as isize;
        let lo = offset.max(0);
        let hi = (offset + npsf as isize).min(n as isize).max(lo);
        let image = lo as usize..hi as usize;
        let psf = (lo - offset) as usize..(hi - offset) as usize;
        (image, psf)
    }
    let (iy, py) = axis(image_shape.0, psf_shape.0, psf_peak.0, at.0);
    let (ix, px) = axis(image_shape.1, psf_shape.1, psf_peak.1, at.1);
    ((iy, ix), (py, px))
}

/// Position and value of the largest `|a|`, optionally weighted by `window`.
pub(crate) fn argmax_abs(a: &ArrayView2<f64>, window: Option<&ArrayView2<f64>>) -> ((usize, usize), f64) {
    let mut best = f64::NEG_INFINITY;
    let mut at = (0, 0);
    for ((y, x), &v) in a.indexed_iter() {
        let w = window.map_or(1.0, |w| w[[y, x]]);
        let score = (v * w).abs();
        if score > best {
            best = score;
            at = (y, x);
        }
    }
    (at, best)
}

/// Position and value of the largest element of `a`.
pub(crate) fn peak(a: &ArrayView2<f64>) -> ((usize, usize), f64) {
    a.indexed_iter()
        .fold(((0, 0), f64::NEG_INFINITY), |best, (at, &v)| if v > best.1 { (at, v) } else { best })
}

/// Clean every plane of `dirty` with the matching plane of `psf`.
///
/// Returns `(model, residual)`. Planes whose PSF has no positive peak are
/// passed through unchanged as residual.
pub fn deconvolve_cube(
    dirty: &Image,
    psf: &Image,
    config: &DeconvolveConfig,
) -> Result<(Image, Image), ArlError> {
    config.validate()?;
    let [nchan, npol, ny, nx] = dirty.shape();
    let [psf_nchan, psf_npol, psf_ny, psf_nx] = psf.shape();
    if psf_ny != ny || psf_nx != nx || psf_nchan == 0 || psf_npol == 0 {
        return Err(ArlError::ShapeMismatch(format!(
            "dirty image {:?} and PSF {:?} differ",
            dirty.shape(),
            psf.shape()
        )));
    }

    let deconvolver = create_deconvolver(config);
    log::info!(
        "deconvolve_cube: {} on {nchan} channels, {npol} polarisations of {ny}x{nx} pixels",
        deconvolver.name()
    );
    let window = config.window.mask(ny, nx);

    let planes: Vec<(usize, usize)> = (0..nchan)
        .flat_map(|chan| (0..npol).map(move |pol| (chan, pol)))
        .collect();
    let results: Vec<(Array2<f64>, Array2<f64>)> = planes
        .par_iter()
        .map(|&(chan, pol)| {
            let d = dirty.data.slice(s![chan, pol, .., ..]);
            let p = psf
                .data
                .slice(s![chan.min(psf_nchan - 1), pol.min(psf_npol - 1), .., ..]);
            let pmax = p.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            if !(pmax > 0.0) {
                log::warn!("deconvolve_cube: PSF plane ({chan}, {pol}) has no positive peak, skipping");
                return Ok((Array2::zeros((ny, nx)), d.to_owned()));
            }
            deconvolver.deconvolve_plane(d, p, window.as_ref().map(|w| w.view()))
        })
        .collect::<Result<_, ArlError>>()?;

    let mut model = dirty.zeros_like();
    let mut residual = dirty.zeros_like();
    for (&(chan, pol), (comps, res)) in planes.iter().zip(results) {
        model.data.slice_mut(s![chan, pol, .., ..]).assign(&comps);
        residual.data.slice_mut(s![chan, pol, .., ..]).assign(&res);
    }
    Ok((model, residual))
}
