//! Imaging parameters recommended for a wide-field observation.

use std::f64::consts::PI;

use crate::data::{Visibility, SPEED_OF_LIGHT};
use crate::error::ArlError;

/// Inputs to [`advise_wide_field`] besides the data.
#[derive(Debug, Clone, Copy)]
pub struct AdviceParams {
    /// Antenna or station diameter \[metres\].
    pub diameter: f64,
    /// Image field of view in units of the primary beam.
    pub guard_band_image: f64,
    /// Tolerable amplitude error of the w correction.
    pub del_a: f64,
    /// Number of w-projection planes per w slice.
    pub wprojection_planes: usize,
    /// Pixels per synthesised beam.
    pub oversampling_synthesised_beam: f64,
}

impl Default for AdviceParams {
    fn default() -> Self {
        Self {
            diameter: 35.0,
            guard_band_image: 6.0,
            del_a: 0.02,
            wprojection_planes: 1,
            oversampling_synthesised_beam: 3.0,
        }
    }
}

/// Recommended imaging parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WideFieldAdvice {
    pub vis_slices: usize,
    pub npixel: usize,
    /// \[radians\]
    pub cellsize: f64,
    /// \[radians\]
    pub primary_beam_fov: f64,
    /// \[radians\]
    pub image_fov: f64,
    /// \[wavelengths\]
    pub uvmax: f64,
    /// \[wavelengths\]
    pub wmax: f64,
    /// \[wavelengths\]
    pub w_sampling: f64,
}

/// Work out image size, pixel size and number of w slices for `vis`.
pub fn advise_wide_field(vis: &Visibility, params: &AdviceParams) -> Result<WideFieldAdvice, ArlError> {
    if !(params.diameter > 0.0)
        || !(params.guard_band_image > 0.0)
        || !(params.del_a > 0.0)
        || !(params.oversampling_synthesised_beam > 0.0)
    {
        return Err(ArlError::InvalidArgument(format!("invalid advice parameters {params:?}")));
    }

    let min_freq = vis.frequency.fold(f64::INFINITY, |m, &f| m.min(f));
    if vis.nvis() == 0 || !(min_freq > 0.0) {
        return Err(ArlError::InvalidArgument(
            "advice needs visibilities with positive frequencies".to_string(),
        ));
    }
    let uvmax = vis.uvmax();
    if !(uvmax > 0.0) {
        return Err(ArlError::InvalidArgument(
            "advice needs at least one non-zero baseline".to_string(),
        ));
    }
    let wmax = vis.wmax();

    let wavelength = SPEED_OF_LIGHT / min_freq;
    let primary_beam_fov = wavelength / params.diameter;
    let image_fov = primary_beam_fov * params.guard_band_image;

    let cellsize = 1.0 / (uvmax * params.oversampling_synthesised_beam);
    let npixel = ((image_fov / cellsize).ceil().max(1.0) as usize).next_power_of_two();

    let w_sampling = (2.0 * params.del_a / (PI * image_fov * image_fov)).abs();
    let planes = params.wprojection_planes.max(1) as f64;
    let vis_slices = ((2.0 * wmax / w_sampling / planes).ceil() as usize).max(1);

    log::info!(
        "advise_wide_field: maximum baseline {uvmax:.1} wavelengths, maximum w {wmax:.1} wavelengths"
    );
    log::info!(
        "advise_wide_field: image field of view {image_fov:.6} rad, cellsize {cellsize:.3e} rad, npixel {npixel}"
    );
    log::info!("advise_wide_field: w sampling {w_sampling:.3} wavelengths, {vis_slices} w slices");

    Ok(WideFieldAdvice {
        vis_slices,
        npixel,
        cellsize,
        primary_beam_fov,
        image_fov,
        uvmax,
        wmax,
        w_sampling,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{create_named_configuration, PhaseCentre, PolarisationFrame};
    use crate::simulation::create_visibility;
    use approx::assert_relative_eq;

    #[test]
    fn test_advice_formulae() {
        let config = create_named_configuration("LOWBD2-CORE", None).unwrap();
        let vis = create_visibility(
            &config,
            &[-0.2, 0.0, 0.2],
            &[1e8],
            &[1e6],
            PhaseCentre::new(15.0, -45.0),
            PolarisationFrame::StokesI,
            1.0,
        )
        .unwrap();
        let params = AdviceParams::default();
        let advice = advise_wide_field(&vis, &params).unwrap();

        assert_relative_eq!(advice.cellsize, 1.0 / (3.0 * vis.uvmax()));
        assert!(advice.npixel.is_power_of_two());
        assert!(advice.npixel as f64 >= advice.image_fov / advice.cellsize);
        assert!(((advice.npixel / 2) as f64) < advice.image_fov / advice.cellsize);
        assert_relative_eq!(advice.primary_beam_fov, SPEED_OF_LIGHT / 1e8 / 35.0);
        assert!(advice.vis_slices >= 1);

        let more_planes = AdviceParams {
            wprojection_planes: 1_000_000,
            ..params
        };
        assert_eq!(advise_wide_field(&vis, &more_planes).unwrap().vis_slices, 1);
    }

    #[test]
    fn test_advice_rejects_bad_input() {
        let vis = Visibility::zeros(0, PolarisationFrame::StokesI, PhaseCentre::new(0.0, 0.0));
        assert!(advise_wide_field(&vis, &AdviceParams::default()).is_err());
    }
}
