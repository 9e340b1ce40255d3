//! Per-antenna complex gains.

use ndarray::prelude::*;
use num_complex::Complex64;

use super::polarisation::PolarisationFrame;

/// Receptor Jones matrices per (time, antenna, channel).
///
/// `gain[[t, a, c, p, q]]` couples receptor `q` of the incoming signal into
/// receptor `p`; the off-diagonal terms are polarisation leakage.
#[derive(Debug, Clone)]
pub struct GainTable {
    /// Solution times \[s\], shape `[ntimes]`.
    pub time: Array1<f64>,
    /// Channel centres \[Hz\], shape `[nchan]`.
    pub frequency: Array1<f64>,
    /// Shape `[ntimes, nant, nchan, nrec, nrec]`.
    pub gain: Array5<Complex64>,
    /// Shape `[ntimes, nant, nchan, nrec]`.
    pub weight: Array4<f64>,
    /// Fit residual, shape `[ntimes, nchan, nrec]`.
    pub residual: Array3<f64>,
    /// Frame of the visibilities these gains apply to.
    pub polarisation_frame: PolarisationFrame,
}

impl GainTable {
    /// Identity gains with unit weight and zero residual.
    pub fn unity(
        time: Array1<f64>,
        frequency: Array1<f64>,
        nant: usize,
        nrec: usize,
        polarisation_frame: PolarisationFrame,
    ) -> Self {
        let ntimes = time.len();
        let nchan = frequency.len();
        let gain = Array5::from_shape_fn((ntimes, nant, nchan, nrec, nrec), |(_, _, _, p, q)| {
            if p == q {
                Complex64::new(1.0, 0.0)
            } else {
                Complex64::new(0.0, 0.0)
            }
        });
        Self {
            gain,
            weight: Array4::ones((ntimes, nant, nchan, nrec)),
            residual: Array3::zeros((ntimes, nchan, nrec)),
            time,
            frequency,
            polarisation_frame,
        }
    }

    #[inline]
    pub fn ntimes(&self) -> usize {
        self.gain.shape()[0]
    }

    #[inline]
    pub fn nant(&self) -> usize {
        self.gain.shape()[1]
    }

    #[inline]
    pub fn nchan(&self) -> usize {
        self.gain.shape()[2]
    }

    #[inline]
    pub fn nrec(&self) -> usize {
        self.gain.shape()[3]
    }

    /// The Jones matrix of antenna `ant` at solution `t`, channel `chan`.
    #[inline]
    pub fn jones(&self, t: usize, ant: usize, chan: usize) -> ArrayView2<Complex64> {
        self.gain.slice(s![t, ant, chan, .., ..])
    }

    /// Index of the solution interval nearest to `time`.
    pub fn nearest_time(&self, time: f64) -> usize {
        self.time
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - time).abs().total_cmp(&(*b - time).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_table() {
        let gt = GainTable::unity(
            array![0.0, 30.0, 60.0],
            array![1e8],
            4,
            2,
            PolarisationFrame::Linear,
        );
        assert_eq!((gt.ntimes(), gt.nant(), gt.nchan(), gt.nrec()), (3, 4, 1, 2));
        assert_eq!(gt.gain.dim(), (3, 4, 1, 2, 2));
        let jones = gt.jones(1, 2, 0);
        assert_eq!(jones[[0, 0]], Complex64::new(1.0, 0.0));
        assert_eq!(jones[[1, 1]], Complex64::new(1.0, 0.0));
        assert_eq!(jones[[0, 1]], Complex64::new(0.0, 0.0));
        assert_eq!(jones[[1, 0]], Complex64::new(0.0, 0.0));
        assert_eq!(gt.nearest_time(40.0), 1);
        assert_eq!(gt.nearest_time(1e9), 2);
    }
}
