//! Image cubes.

use ndarray::prelude::*;

use super::descriptor::Wcs;
use super::polarisation::PolarisationFrame;
use crate::error::ArlError;

/// A regularly sampled cube, shape `[nchan, npol, ny, nx]`.
#[derive(Debug, Clone)]
pub struct Image {
    pub data: Array4<f64>,
    pub wcs: Wcs,
    pub polarisation_frame: PolarisationFrame,
}

impl Image {
    /// Wrap pixel data, checking the polarisation axis against the frame.
    pub fn new(
        data: Array4<f64>,
        wcs: Wcs,
        polarisation_frame: PolarisationFrame,
    ) -> Result<Self, ArlError> {
        if data.shape()[1] != polarisation_frame.npol() {
            return Err(ArlError::ShapeMismatch(format!(
                "image has {} polarisations but frame {polarisation_frame} needs {}",
                data.shape()[1],
                polarisation_frame.npol()
            )));
        }
        Ok(Self {
            data,
            wcs,
            polarisation_frame,
        })
    }

    /// A zeroed image with the given shape.
    pub fn zeros(
        shape: [usize; 4],
        wcs: Wcs,
        polarisation_frame: PolarisationFrame,
    ) -> Result<Self, ArlError> {
        Self::new(Array4::zeros(shape), wcs, polarisation_frame)
    }

    /// A zeroed image with the same geometry as this one.
    pub fn zeros_like(&self) -> Self {
        Self {
            data: Array4::zeros(self.data.raw_dim()),
            wcs: self.wcs.clone(),
            polarisation_frame: self.polarisation_frame,
        }
    }

    pub fn shape(&self) -> [usize; 4] {
        let s = self.data.shape();
        [s[0], s[1], s[2], s[3]]
    }

    #[inline]
    pub fn nchan(&self) -> usize {
        self.data.shape()[0]
    }

    #[inline]
    pub fn npol(&self) -> usize {
        self.data.shape()[1]
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.data.shape()[2]
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.data.shape()[3]
    }

    /// Sum of all pixels in one plane.
    pub fn plane_sum(&self, chan: usize, pol: usize) -> f64 {
        self.data.slice(s![chan, pol, .., ..]).sum()
    }
}
