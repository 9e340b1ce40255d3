//! Imaging over partitions of the image plane (facets) or of the uv plane.
//!
//! A facet is transformed on its own small grid about its centre; the
//! offset of that centre from the phase centre is applied to the
//! visibilities as a phase rotation. A Fourier partition splits the samples
//! by the uv cell they grid to, so each part needs only its own samples.

use ndarray::prelude::*;
use num_complex::Complex64;

use super::base::{check_image, invert_planes, normalise_planes, predict_planes, sample_grid_position};
use super::skycomponent::point_phasor;
use crate::data::{convert_polarisation, Image, Visibility, Wcs};
use crate::error::ArlError;

/// Top-left corners `(y, x)` of the `nraster` x `nraster` facets of an
/// `(ny, nx)` image, with the facet size.
fn facet_origins(ny: usize, nx: usize, nraster: usize) -> Result<(Vec<(usize, usize)>, usize, usize), ArlError> {
    if nraster == 0 || ny % nraster != 0 || nx % nraster != 0 {
        return Err(ArlError::InvalidArgument(format!(
            "{ny}x{nx} image cannot be split into {nraster}x{nraster} facets"
        )));
    }
    let (fh, fw) = (ny / nraster, nx / nraster);
    let origins = (0..nraster)
        .flat_map(|j| (0..nraster).map(move |i| (j * fh, i * fw)))
        .collect();
    Ok((origins, fh, fw))
}

/// Direction cosines `(l, m)` of pixel `(x, y)` in the tangent plane.
fn pixel_lm(wcs: &Wcs, x: f64, y: f64) -> (f64, f64) {
    let (x0, y0) = wcs.reference_pixel();
    (
        ((x - x0) * wcs.cdelt[0]).to_radians(),
        ((y - y0) * wcs.cdelt[1]).to_radians(),
    )
}

/// Phase rotation that moves the sky at `(l0, m0)` to the origin, per row.
fn facet_shift(vis: &Visibility, l0: f64, m0: f64) -> Vec<Complex64> {
    (0..vis.nvis())
        .map(|row| {
            let [u, v, _] = vis.uvw_lambda(row);
            point_phasor([u, v, 0.0], [l0, m0, 1.0])
        })
        .collect()
}

/// Predict `model` facet by facet and add the result to a copy of `vis`.
///
/// The image sides must be divisible by `image_partitions`. Empty facets are
/// skipped.
pub fn predict_image_partition(
    vis: &Visibility,
    model: &Image,
    image_partitions: usize,
) -> Result<Visibility, ArlError> {
    check_image(model)?;
    let [_, _, ny, nx] = model.shape();
    let (origins, fh, fw) = facet_origins(ny, nx, image_partitions)?;
    log::info!(
        "predict_image_partition: predicting using {image_partitions} x {image_partitions} image partitions"
    );

    let rows: Vec<usize> = (0..vis.nvis()).collect();
    let mut out = vis.clone();
    for (y0, x0) in origins {
        let patch = model.data.slice(s![.., .., y0..y0 + fh, x0..x0 + fw]);
        if patch.iter().all(|&v| v == 0.0) {
            continue;
        }
        let planes = patch.mapv(|v| Complex64::new(v, 0.0));
        let mut facet_vis = vis.copy(true);
        predict_planes(&mut facet_vis, &rows, &planes, &model.wcs, model.polarisation_frame)?;

        let (l0, m0) = pixel_lm(&model.wcs, (x0 + fw / 2) as f64, (y0 + fh / 2) as f64);
        let shift = facet_shift(vis, l0, m0);
        for (row, s) in shift.iter().enumerate() {
            for p in 0..out.npol() {
                out.vis[[row, p]] += facet_vis.vis[[row, p]] * s;
            }
        }
    }
    Ok(out)
}

/// Make the dirty image or PSF facet by facet onto the grid of `template`.
///
/// Each facet is inverted on its own grid after rotating the visibilities
/// to its centre. The summed weights are those of any one facet.
pub fn invert_image_partition(
    vis: &Visibility,
    template: &Image,
    dopsf: bool,
    image_partitions: usize,
) -> Result<(Image, Array2<f64>), ArlError> {
    check_image(template)?;
    let [nchan, npol, ny, nx] = template.shape();
    let (origins, fh, fw) = facet_origins(ny, nx, image_partitions)?;
    let frame = template.polarisation_frame;
    log::info!(
        "invert_image_partition: inverting using {image_partitions} x {image_partitions} image partitions, making {}",
        if dopsf { "PSF" } else { "dirty image" }
    );

    // The PSF is the image of unit visibilities, expressed in the sample frame.
    let unit = if dopsf {
        let ones = vec![Complex64::new(1.0, 0.0); npol];
        Some(convert_polarisation(frame, vis.polarisation_frame, &ones)?)
    } else {
        None
    };

    let rows: Vec<usize> = (0..vis.nvis()).collect();
    let mut data = Array4::zeros((nchan, npol, ny, nx));
    let mut sumwt = Array2::zeros((nchan, npol));
    for (y0, x0) in origins {
        let (l0, m0) = pixel_lm(&template.wcs, (x0 + fw / 2) as f64, (y0 + fh / 2) as f64);
        let shift = facet_shift(vis, l0, m0);
        let mut rotated = vis.clone();
        for (row, s) in shift.iter().enumerate() {
            let back = s.conj();
            for p in 0..rotated.npol() {
                let value = unit.as_ref().map_or(vis.vis[[row, p]], |u| u[p]);
                rotated.vis[[row, p]] = value * back;
            }
        }
        let (planes, weights) = invert_planes(&rotated, &rows, [nchan, npol, fh, fw], &template.wcs, frame, false)?;
        data.slice_mut(s![.., .., y0..y0 + fh, x0..x0 + fw])
            .assign(&normalise_planes(&planes, &weights));
        sumwt = weights;
    }
    let image = Image::new(data, template.wcs.clone(), frame)?;
    Ok((image, sumwt))
}

/// Rows of `vis` grouped by the block of an `nraster` x `nraster` tiling of
/// the uv grid they fall in. Rows off the grid belong to no block.
fn fourier_groups(vis: &Visibility, image: &Image, nraster: usize) -> Result<Vec<Vec<usize>>, ArlError> {
    if nraster == 0 {
        return Err(ArlError::InvalidArgument("fourier_partitions must be at least 1".to_string()));
    }
    let [_, _, ny, nx] = image.shape();
    let cellsize = image.wcs.cellsize();
    let mut groups = vec![Vec::new(); nraster * nraster];
    for row in 0..vis.nvis() {
        if let Some((gx, gy)) = sample_grid_position(vis, row, ny, nx, cellsize) {
            let bx = (gx.round() as usize * nraster / nx).min(nraster - 1);
            let by = (gy.round() as usize * nraster / ny).min(nraster - 1);
            groups[by * nraster + bx].push(row);
        }
    }
    Ok(groups)
}

/// Predict `model` one uv block at a time and add the result to a copy of
/// `vis`.
pub fn predict_fourier_partition(
    vis: &Visibility,
    model: &Image,
    fourier_partitions: usize,
) -> Result<Visibility, ArlError> {
    check_image(model)?;
    let groups = fourier_groups(vis, model, fourier_partitions)?;
    log::info!(
        "predict_fourier_partition: predicting using {fourier_partitions} x {fourier_partitions} fourier partitions"
    );
    let planes = model.data.mapv(|v| Complex64::new(v, 0.0));
    let mut out = vis.clone();
    for rows in groups.iter().filter(|rows| !rows.is_empty()) {
        predict_planes(&mut out, rows, &planes, &model.wcs, model.polarisation_frame)?;
    }
    Ok(out)
}

/// Invert one uv block at a time onto the grid of `template`, summing the
/// unnormalised planes and weights before normalising.
pub fn invert_fourier_partition(
    vis: &Visibility,
    template: &Image,
    dopsf: bool,
    fourier_partitions: usize,
) -> Result<(Image, Array2<f64>), ArlError> {
    check_image(template)?;
    let groups = fourier_groups(vis, template, fourier_partitions)?;
    log::info!(
        "invert_fourier_partition: inverting using {fourier_partitions} x {fourier_partitions} fourier partitions"
    );
    let shape = template.shape();
    let mut total = Array4::<Complex64>::zeros(shape);
    let mut sumwt = Array2::<f64>::zeros((shape[0], shape[1]));
    for rows in groups.iter().filter(|rows| !rows.is_empty()) {
        let (planes, weights) = invert_planes(vis, rows, shape, &template.wcs, template.polarisation_frame, dopsf)?;
        total += &planes;
        sumwt += &weights;
    }
    let data = normalise_planes(&total, &sumwt);
    let image = Image::new(data, template.wcs.clone(), template.polarisation_frame)?;
    Ok((image, sumwt))
}
