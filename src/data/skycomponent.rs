//! Point sources on the sky.

use ndarray::prelude::*;

use super::descriptor::PhaseCentre;
use super::polarisation::PolarisationFrame;
use crate::error::ArlError;

/// A point source with a tabulated spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct Skycomponent {
    pub direction: PhaseCentre,
    /// Channel centres \[Hz\], shape `[nchan]`.
    pub frequency: Array1<f64>,
    /// Flux \[Jy\], shape `[nchan, npol]`.
    pub flux: Array2<f64>,
    pub name: String,
    pub polarisation_frame: PolarisationFrame,
}

impl Skycomponent {
    pub fn new(
        direction: PhaseCentre,
        frequency: Array1<f64>,
        flux: Array2<f64>,
        name: impl Into<String>,
        polarisation_frame: PolarisationFrame,
    ) -> Result<Self, ArlError> {
        if frequency.is_empty() {
            return Err(ArlError::InvalidArgument("skycomponent has no channels".to_string()));
        }
        if flux.dim() != (frequency.len(), polarisation_frame.npol()) {
            return Err(ArlError::ShapeMismatch(format!(
                "skycomponent flux {:?} does not match {} channels of frame {polarisation_frame}",
                flux.dim(),
                frequency.len()
            )));
        }
        if !flux.iter().all(|f| f.is_finite()) {
            return Err(ArlError::InvalidArgument("skycomponent flux is not finite".to_string()));
        }
        Ok(Self {
            direction,
            frequency,
            flux,
            name: name.into(),
            polarisation_frame,
        })
    }

    #[inline]
    pub fn nchan(&self) -> usize {
        self.frequency.len()
    }

    #[inline]
    pub fn npol(&self) -> usize {
        self.flux.ncols()
    }

    /// The channel whose centre is closest to `freq`.
    pub fn nearest_channel(&self, freq: f64) -> usize {
        self.frequency
            .iter()
            .enumerate()
            .fold((0, f64::INFINITY), |(best, dist), (chan, &f)| {
                let d = (f - freq).abs();
                if d < dist {
                    (chan, d)
                } else {
                    (best, dist)
                }
            })
            .0
    }

    /// Flux of the channel nearest `freq`.
    pub fn flux_at(&self, freq: f64) -> ArrayView1<f64> {
        self.flux.row(self.nearest_channel(freq))
    }
}
