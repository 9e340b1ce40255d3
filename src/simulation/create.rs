//! Visibility synthesis from an array configuration.

use std::f64::consts::PI;

use ndarray::prelude::*;

use crate::coalesce::coalesce_visibility;
use crate::data::{BlockVisibility, Configuration, PhaseCentre, PolarisationFrame, Visibility};
use crate::error::ArlError;

/// Seconds per radian of hour angle.
const SECONDS_PER_RADIAN: f64 = 43_200.0 / PI;

/// Synthesise an empty block visibility.
///
/// `times` are hour angles in radians; one integration is formed per hour
/// angle for every baseline and channel. Visibilities are zero and every
/// weight is `weight`.
pub fn create_blockvisibility(
    config: &Configuration,
    times: &[f64],
    frequency: &[f64],
    channel_bandwidth: &[f64],
    phase_centre: PhaseCentre,
    polarisation_frame: PolarisationFrame,
    weight: f64,
) -> Result<BlockVisibility, ArlError> {
    if times.is_empty() || frequency.is_empty() {
        return Err(ArlError::InvalidArgument(
            "at least one time and one frequency are required".to_string(),
        ));
    }
    if channel_bandwidth.len() != frequency.len() {
        return Err(ArlError::ShapeMismatch(format!(
            "{} channel bandwidths for {} frequencies",
            channel_bandwidth.len(),
            frequency.len()
        )));
    }

    let integration = if times.len() > 1 {
        ((times[1] - times[0]) * SECONDS_PER_RADIAN).abs()
    } else {
        1.0
    };

    let mut block = BlockVisibility::zeros(
        config.nant(),
        config.baselines(),
        times.iter().map(|ha| ha * SECONDS_PER_RADIAN).collect(),
        Array1::from_elem(times.len(), integration),
        Array1::from(frequency.to_vec()),
        Array1::from(channel_bandwidth.to_vec()),
        polarisation_frame,
        phase_centre,
    );

    let dec = phase_centre.dec_rad();
    for (t, &ha) in times.iter().enumerate() {
        let ant_uvw = config.antenna_uvw(ha, dec);
        for (b, &(a1, a2)) in block.baselines.iter().enumerate() {
            for k in 0..3 {
                block.uvw[[t, b, k]] = ant_uvw[[a2, k]] - ant_uvw[[a1, k]];
            }
        }
    }
    block.weight.fill(weight);
    block.imaging_weight.fill(weight);

    log::info!(
        "create_blockvisibility: {} times, {} baselines, {} channels, frame {}",
        block.ntimes(),
        block.nbaselines(),
        block.nchan(),
        polarisation_frame
    );
    Ok(block)
}

/// Synthesise an empty per-sample visibility set.
///
/// Samples are ordered by time, then baseline, then channel.
pub fn create_visibility(
    config: &Configuration,
    times: &[f64],
    frequency: &[f64],
    channel_bandwidth: &[f64],
    phase_centre: PhaseCentre,
    polarisation_frame: PolarisationFrame,
    weight: f64,
) -> Result<Visibility, ArlError> {
    let block = create_blockvisibility(
        config,
        times,
        frequency,
        channel_bandwidth,
        phase_centre,
        polarisation_frame,
        weight,
    )?;
    let (vis, _) = coalesce_visibility(&block, 1);
    Ok(vis)
}
