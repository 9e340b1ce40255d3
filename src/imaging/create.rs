//! Images whose geometry is derived from a visibility set.

use crate::data::{Image, PolarisationFrame, Visibility, Wcs, SPEED_OF_LIGHT};
use crate::error::ArlError;

/// Default image side length.
pub const DEFAULT_NPIXEL: usize = 512;

/// Largest |u|, |v| or |w| in wavelengths at the highest frequency.
fn uvw_extent(vis: &Visibility) -> f64 {
    let max_uvw = vis.uvw.fold(0.0_f64, |m, &x| m.max(x.abs()));
    let max_freq = vis.frequency.fold(0.0_f64, |m, &f| m.max(f));
    max_uvw * max_freq / SPEED_OF_LIGHT
}

/// Distinct frequencies in order of first appearance.
fn distinct_frequencies(vis: &Visibility) -> Vec<f64> {
    let mut freqs: Vec<f64> = Vec::new();
    for &f in vis.frequency.iter() {
        if !freqs.contains(&f) {
            freqs.push(f);
        }
    }
    freqs
}

/// Cell size at the Nyquist limit, `1 / (2 uvmax)`.
pub fn critical_cellsize(vis: &Visibility) -> Result<f64, ArlError> {
    let uvmax = uvw_extent(vis);
    if !(uvmax > 0.0) {
        return Err(ArlError::InvalidArgument(
            "visibility set has no non-zero baselines".to_string(),
        ));
    }
    Ok(1.0 / (2.0 * uvmax))
}

/// A WCS centred on the phase centre of `vis`.
///
/// `cellsize` defaults to half the critical cell and is capped at the
/// critical cell. The frequency axis starts at the lowest frequency.
pub fn create_wcs_from_visibility(vis: &Visibility, npixel: usize, cellsize: Option<f64>) -> Result<Wcs, ArlError> {
    let critical = critical_cellsize(vis)?;
    log::debug!(
        "create_wcs_from_visibility: critical cellsize = {critical:e} radians, {:e} degrees",
        critical.to_degrees()
    );
    let mut cellsize = cellsize.unwrap_or(0.5 * critical);
    if cellsize > critical {
        log::info!(
            "create_wcs_from_visibility: resetting cellsize {cellsize:e} radians to critical cellsize {critical:e} radians"
        );
        cellsize = critical;
    }

    let freqs = distinct_frequencies(vis);
    let reference = freqs.iter().copied().fold(f64::INFINITY, f64::min);
    let channel_width = if freqs.len() > 1 {
        freqs[1] - freqs[0]
    } else {
        vis.channel_bandwidth.first().copied().unwrap_or(reference)
    };
    Ok(Wcs::new(vis.phase_centre, cellsize, npixel, reference, channel_width))
}

/// A zeroed image on a grid matched to `vis`.
///
/// `nchan` defaults to the number of distinct frequencies in `vis`.
pub fn create_image_from_visibility(
    vis: &Visibility,
    npixel: usize,
    cellsize: Option<f64>,
    nchan: Option<usize>,
    polarisation_frame: PolarisationFrame,
) -> Result<Image, ArlError> {
    if npixel == 0 || vis.nvis() == 0 {
        return Err(ArlError::InvalidArgument(format!(
            "cannot make a {npixel} pixel image from {} visibilities",
            vis.nvis()
        )));
    }
    let wcs = create_wcs_from_visibility(vis, npixel, cellsize)?;
    let nchan = nchan.unwrap_or_else(|| distinct_frequencies(vis).len()).max(1);
    log::info!(
        "create_image_from_visibility: {nchan} channels, {npixel} pixels, cellsize {:e} rad",
        wcs.cellsize()
    );
    Image::zeros(
        [nchan, polarisation_frame.npol(), npixel, npixel],
        wcs,
        polarisation_frame,
    )
}
