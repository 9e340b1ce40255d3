//! Visibility containers: one row per sample, or one cell per
//! (time, baseline, channel).

use ndarray::prelude::*;
use num_complex::Complex64;

use super::descriptor::PhaseCentre;
use super::polarisation::PolarisationFrame;
use crate::error::ArlError;

/// Speed of light \[m/s\].
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Per-sample visibilities, stored as one array per field.
///
/// Every array has `nvis` rows; polarised fields have `npol` columns.
#[derive(Debug, Clone)]
pub struct Visibility {
    /// Baseline coordinates \[metres\], shape `[nvis, 3]`.
    pub uvw: Array2<f64>,
    /// Sample time \[s\].
    pub time: Array1<f64>,
    /// Sample frequency \[Hz\].
    pub frequency: Array1<f64>,
    pub channel_bandwidth: Array1<f64>,
    pub integration_time: Array1<f64>,
    pub antenna1: Array1<i32>,
    pub antenna2: Array1<i32>,
    pub vis: Array2<Complex64>,
    pub weight: Array2<f64>,
    pub imaging_weight: Array2<f64>,
    pub polarisation_frame: PolarisationFrame,
    pub phase_centre: PhaseCentre,
}

impl Visibility {
    /// A visibility set of `nvis` zeroed samples.
    pub fn zeros(nvis: usize, polarisation_frame: PolarisationFrame, phase_centre: PhaseCentre) -> Self {
        let npol = polarisation_frame.npol();
        Self {
            uvw: Array2::zeros((nvis, 3)),
            time: Array1::zeros(nvis),
            frequency: Array1::zeros(nvis),
            channel_bandwidth: Array1::zeros(nvis),
            integration_time: Array1::zeros(nvis),
            antenna1: Array1::zeros(nvis),
            antenna2: Array1::zeros(nvis),
            vis: Array2::zeros((nvis, npol)),
            weight: Array2::zeros((nvis, npol)),
            imaging_weight: Array2::zeros((nvis, npol)),
            polarisation_frame,
            phase_centre,
        }
    }

    #[inline]
    pub fn nvis(&self) -> usize {
        self.time.len()
    }

    #[inline]
    pub fn npol(&self) -> usize {
        self.vis.ncols()
    }

    /// Baseline coordinates of sample `row` in wavelengths.
    #[inline]
    pub fn uvw_lambda(&self, row: usize) -> [f64; 3] {
        let scale = self.frequency[row] / SPEED_OF_LIGHT;
        [
            self.uvw[[row, 0]] * scale,
            self.uvw[[row, 1]] * scale,
            self.uvw[[row, 2]] * scale,
        ]
    }

    /// Largest |u| or |v| over all samples, in wavelengths.
    pub fn uvmax(&self) -> f64 {
        (0..self.nvis())
            .map(|row| {
                let [u, v, _] = self.uvw_lambda(row);
                u.abs().max(v.abs())
            })
            .fold(0.0, f64::max)
    }

    /// Largest |w| over all samples, in wavelengths.
    pub fn wmax(&self) -> f64 {
        (0..self.nvis())
            .map(|row| self.uvw_lambda(row)[2].abs())
            .fold(0.0, f64::max)
    }

    /// A copy of this set; with `zero` the visibilities are set to zero.
    pub fn copy(&self, zero: bool) -> Self {
        let mut out = self.clone();
        if zero {
            out.vis.fill(Complex64::new(0.0, 0.0));
        }
        out
    }

    /// Check that every array has consistent dimensions.
    pub fn validate(&self) -> Result<(), ArlError> {
        let nvis = self.nvis();
        let npol = self.polarisation_frame.npol();
        let rows_ok = self.uvw.dim() == (nvis, 3)
            && self.frequency.len() == nvis
            && self.channel_bandwidth.len() == nvis
            && self.integration_time.len() == nvis
            && self.antenna1.len() == nvis
            && self.antenna2.len() == nvis;
        let pols_ok = self.vis.dim() == (nvis, npol)
            && self.weight.dim() == (nvis, npol)
            && self.imaging_weight.dim() == (nvis, npol);
        if rows_ok && pols_ok {
            Ok(())
        } else {
            Err(ArlError::ShapeMismatch(format!(
                "visibility arrays disagree with {nvis} samples of {npol} polarisations"
            )))
        }
    }
}

/// Visibilities on a regular (time, baseline, channel) lattice.
#[derive(Debug, Clone)]
pub struct BlockVisibility {
    /// Number of antennas the baselines were formed from.
    pub nant: usize,
    /// Antenna pairs `(a1, a2)`, `a1 < a2`, lexicographic.
    pub baselines: Vec<(usize, usize)>,
    /// Time of each integration \[s\], shape `[ntimes]`.
    pub time: Array1<f64>,
    pub integration_time: Array1<f64>,
    /// Channel centres \[Hz\], shape `[nchan]`.
    pub frequency: Array1<f64>,
    pub channel_bandwidth: Array1<f64>,
    /// Baseline coordinates \[metres\], shape `[ntimes, nbl, 3]`.
    pub uvw: Array3<f64>,
    /// Shape `[ntimes, nbl, nchan, npol]`.
    pub vis: Array4<Complex64>,
    pub weight: Array4<f64>,
    pub imaging_weight: Array4<f64>,
    pub polarisation_frame: PolarisationFrame,
    pub phase_centre: PhaseCentre,
}

impl BlockVisibility {
    /// A block of zeroed visibilities with the given axes.
    #[allow(clippy::too_many_arguments)]
    pub fn zeros(
        nant: usize,
        baselines: Vec<(usize, usize)>,
        time: Array1<f64>,
        integration_time: Array1<f64>,
        frequency: Array1<f64>,
        channel_bandwidth: Array1<f64>,
        polarisation_frame: PolarisationFrame,
        phase_centre: PhaseCentre,
    ) -> Self {
        let ntimes = time.len();
        let nbl = baselines.len();
        let nchan = frequency.len();
        let npol = polarisation_frame.npol();
        Self {
            nant,
            baselines,
            time,
            integration_time,
            frequency,
            channel_bandwidth,
            uvw: Array3::zeros((ntimes, nbl, 3)),
            vis: Array4::zeros((ntimes, nbl, nchan, npol)),
            weight: Array4::zeros((ntimes, nbl, nchan, npol)),
            imaging_weight: Array4::zeros((ntimes, nbl, nchan, npol)),
            polarisation_frame,
            phase_centre,
        }
    }

    #[inline]
    pub fn ntimes(&self) -> usize {
        self.time.len()
    }

    #[inline]
    pub fn nbaselines(&self) -> usize {
        self.baselines.len()
    }

    #[inline]
    pub fn nchan(&self) -> usize {
        self.frequency.len()
    }

    #[inline]
    pub fn npol(&self) -> usize {
        self.polarisation_frame.npol()
    }

    /// Total number of (time, baseline, channel) cells.
    #[inline]
    pub fn ncells(&self) -> usize {
        self.ntimes() * self.nbaselines() * self.nchan()
    }

    /// Row-major position of cell `(t, b, c)` in the flattened block.
    #[inline]
    pub fn flat_index(&self, t: usize, b: usize, c: usize) -> usize {
        (t * self.nbaselines() + b) * self.nchan() + c
    }

    /// Inverse of [`flat_index`](Self::flat_index).
    #[inline]
    pub fn unflatten(&self, i: usize) -> (usize, usize, usize) {
        let nchan = self.nchan();
        let nbl = self.nbaselines();
        (i / (nbl * nchan), (i / nchan) % nbl, i % nchan)
    }

    /// A copy with the same axes and all visibilities zeroed.
    pub fn copy(&self, zero: bool) -> Self {
        let mut out = self.clone();
        if zero {
            out.vis.fill(Complex64::new(0.0, 0.0));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_block() -> BlockVisibility {
        BlockVisibility::zeros(
            3,
            vec![(0, 1), (0, 2), (1, 2)],
            array![0.0, 10.0],
            array![10.0, 10.0],
            array![1e8, 1.1e8],
            array![1e6, 1e6],
            PolarisationFrame::Linear,
            PhaseCentre::new(0.0, -45.0),
        )
    }

    #[test]
    fn test_block_indexing() {
        let block = small_block();
        assert_eq!(block.ncells(), 2 * 3 * 2);
        for i in 0..block.ncells() {
            let (t, b, c) = block.unflatten(i);
            assert_eq!(block.flat_index(t, b, c), i);
        }
        assert_eq!(block.unflatten(7), (1, 0, 1));
    }

    #[test]
    fn test_visibility_copy_zero() {
        let mut vis = Visibility::zeros(4, PolarisationFrame::StokesI, PhaseCentre::new(0.0, 0.0));
        vis.vis.fill(Complex64::new(1.0, 2.0));
        vis.time.fill(5.0);
        let copy = vis.copy(true);
        assert!(copy.vis.iter().all(|v| v.norm() == 0.0));
        assert_eq!(copy.time, vis.time);
        assert!(vis.validate().is_ok());
    }

    #[test]
    fn test_uvw_lambda() {
        let mut vis = Visibility::zeros(1, PolarisationFrame::StokesI, PhaseCentre::new(0.0, 0.0));
        vis.uvw[[0, 0]] = SPEED_OF_LIGHT;
        vis.frequency[0] = 2.0;
        assert_eq!(vis.uvw_lambda(0), [2.0, 0.0, 0.0]);
        assert_eq!(vis.uvmax(), 2.0);
    }
}
