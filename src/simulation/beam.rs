//! Station primary beams.

use ndarray::prelude::*;

use crate::data::{Image, SPEED_OF_LIGHT};
use crate::error::ArlError;

/// Diameter of a SKA-Low station \[metres\].
pub const LOW_STATION_DIAMETER: f64 = 35.0;

/// Bessel function of the first kind, order one.
///
/// Polynomial approximations from Abramowitz and Stegun 9.4.4 and 9.4.6,
/// accurate to about 1e-7.
fn bessel_j1(x: f64) -> f64 {
    let ax = x.abs();
    if ax <= 3.0 {
        let y = (x / 3.0).powi(2);
        let series = 0.5
            + y * (-0.562_499_85
                + y * (0.210_935_73
                    + y * (-0.039_542_89 + y * (0.004_433_19 + y * (-0.000_317_61 + y * 0.000_011_09)))));
        return x * series;
    }
    let z = 3.0 / ax;
    let f1 = 0.797_884_56
        + z * (0.000_001_56
            + z * (0.016_596_67
                + z * (0.000_171_05 + z * (-0.002_495_11 + z * (0.001_136_53 + z * -0.000_200_33)))));
    let theta1 = ax - 2.356_194_49
        + z * (0.124_996_12
            + z * (0.000_056_50
                + z * (-0.006_378_79 + z * (0.000_743_48 + z * (0.000_798_24 + z * -0.000_291_66)))));
    let j1 = f1 * theta1.cos() / ax.sqrt();
    if x < 0.0 {
        -j1
    } else {
        j1
    }
}

/// Power pattern `(2 J1(x) / x)^2` of a uniformly illuminated disk of
/// `diameter` metres at `sin_theta` from boresight.
pub fn airy_power(diameter: f64, frequency: f64, sin_theta: f64) -> f64 {
    let x = std::f64::consts::PI * diameter * sin_theta * frequency / SPEED_OF_LIGHT;
    if x.abs() < 1e-12 {
        return 1.0;
    }
    (2.0 * bessel_j1(x) / x).powi(2)
}

/// The power beam of a LOW station on the grid of `model`.
///
/// Every polarisation gets the same Airy pattern for its channel frequency,
/// normalised to one at the phase centre and zero beyond the horizon.
pub fn create_low_test_beam(model: &Image) -> Result<Image, ArlError> {
    let [nchan, npol, ny, nx] = model.shape();
    let (x0, y0) = model.wcs.reference_pixel();
    let cdelt_x = model.wcs.cdelt[0].to_radians();
    let cdelt_y = model.wcs.cdelt[1].to_radians();

    let mut data = Array4::zeros((nchan, npol, ny, nx));
    for chan in 0..nchan {
        let frequency = model.wcs.channel_frequency(chan);
        if !(frequency > 0.0) {
            return Err(ArlError::InvalidArgument(format!(
                "channel {chan} has frequency {frequency} Hz"
            )));
        }
        let plane = Array2::from_shape_fn((ny, nx), |(y, x)| {
            let l = (x as f64 - x0) * cdelt_x;
            let m = (y as f64 - y0) * cdelt_y;
            let r = (l * l + m * m).sqrt();
            if r >= 1.0 {
                0.0
            } else {
                airy_power(LOW_STATION_DIAMETER, frequency, r)
            }
        });
        for pol in 0..npol {
            data.slice_mut(s![chan, pol, .., ..]).assign(&plane);
        }
    }
    log::info!(
        "create_low_test_beam: {LOW_STATION_DIAMETER} m station beam for {nchan} channels of {ny}x{nx} pixels"
    );
    Image::new(data, model.wcs.clone(), model.polarisation_frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PhaseCentre, PolarisationFrame, Wcs};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_bessel_j1_values() {
        assert_eq!(bessel_j1(0.0), 0.0);
        assert_abs_diff_eq!(bessel_j1(1.0), 0.440_050_59, epsilon = 1e-7);
        assert_abs_diff_eq!(bessel_j1(2.5), 0.497_094_10, epsilon = 1e-7);
        assert_abs_diff_eq!(bessel_j1(5.0), -0.327_579_14, epsilon = 1e-6);
        assert_abs_diff_eq!(bessel_j1(-1.0), -0.440_050_59, epsilon = 1e-7);
        // First zero.
        assert_abs_diff_eq!(bessel_j1(3.831_705_97), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_beam_shape() {
        let wcs = Wcs::new(PhaseCentre::new(0.0, -45.0), 5e-3, 128, 1e8, 5e7);
        let model = Image::zeros([2, 1, 128, 128], wcs, PolarisationFrame::StokesI).unwrap();
        let beam = create_low_test_beam(&model).unwrap();
        assert_eq!(beam.shape(), model.shape());
        assert_abs_diff_eq!(beam.data[[0, 0, 64, 64]], 1.0, epsilon = 1e-12);
        assert!(beam.data.iter().all(|&b| (0.0..=1.0 + 1e-12).contains(&b)));

        // Power falls away from the centre and the higher channel is narrower.
        let along = |chan: usize, dx: usize| beam.data[[chan, 0, 64, 64 + dx]];
        assert!(along(0, 5) < along(0, 1));
        assert!(along(1, 5) < along(0, 5));

        // First null at sin(theta) = 1.22 lambda / D, about 21 pixels out at 100 MHz.
        let null = 3.831_705_97 * SPEED_OF_LIGHT / (std::f64::consts::PI * LOW_STATION_DIAMETER * 1e8);
        assert_abs_diff_eq!(airy_power(LOW_STATION_DIAMETER, 1e8, null), 0.0, epsilon = 1e-10);
        assert!(along(0, 20) < 0.01);
    }

    #[test]
    fn test_beam_zero_beyond_horizon() {
        let wcs = Wcs::new(PhaseCentre::new(0.0, 0.0), 0.05, 64, 1e8, 1e6);
        let model = Image::zeros([1, 4, 64, 64], wcs, PolarisationFrame::Linear).unwrap();
        let beam = create_low_test_beam(&model).unwrap();
        // The corner is 32 sqrt(2) * 0.05 > 1 from the centre.
        assert_eq!(beam.data[[0, 2, 0, 0]], 0.0);
        assert_eq!(beam.data[[0, 0, 32, 33]], beam.data[[0, 3, 32, 33]]);
    }
}
