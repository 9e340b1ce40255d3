//! W-stacking for wide fields.
//!
//! Samples are binned by w; each bin is transformed with the 2D machinery
//! and the w term `exp(+-2 pi i w (n - 1))` is applied as an image-plane
//! phase screen at the bin centre.

use std::f64::consts::PI;

use ndarray::prelude::*;
use num_complex::Complex64;

use super::base::{check_image, invert_planes, normalise_planes, predict_planes};
use crate::data::{Image, Visibility, Wcs};
use crate::error::ArlError;

/// Bin sample indices into `vis_slices` planes spanning `[-wmax, wmax]`.
///
/// Returns `(w, rows)` for every non-empty plane.
pub fn w_slices(vis: &Visibility, vis_slices: usize) -> Vec<(f64, Vec<usize>)> {
    let wmax = vis.wmax();
    if vis_slices <= 1 || wmax == 0.0 {
        return vec![(0.0, (0..vis.nvis()).collect())];
    }
    let step = 2.0 * wmax / (vis_slices - 1) as f64;
    let mut bins: Vec<Vec<usize>> = vec![Vec::new(); vis_slices];
    for row in 0..vis.nvis() {
        let w = vis.uvw_lambda(row)[2];
        let k = ((w + wmax) / step).round().clamp(0.0, (vis_slices - 1) as f64) as usize;
        bins[k].push(row);
    }
    bins.into_iter()
        .enumerate()
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(k, rows)| (-wmax + k as f64 * step, rows))
        .collect()
}

/// Phase screen `exp(sign 2 pi i w (n - 1))` over an `(ny, nx)` plane.
///
/// Pixels beyond the horizon get unit gain.
pub fn w_screen(ny: usize, nx: usize, wcs: &Wcs, w: f64, sign: f64) -> Array2<Complex64> {
    let cellsize = wcs.cellsize();
    let (cx, cy) = ((nx / 2) as f64, (ny / 2) as f64);
    Array2::from_shape_fn((ny, nx), |(y, x)| {
        let l = (x as f64 - cx) * cellsize;
        let m = (y as f64 - cy) * cellsize;
        let r2 = l * l + m * m;
        if r2 >= 1.0 {
            return Complex64::new(1.0, 0.0);
        }
        let n = (1.0 - r2).sqrt();
        Complex64::from_polar(1.0, sign * 2.0 * PI * w * (n - 1.0))
    })
}

/// Multiply every (channel, polarisation) plane by `screen`.
fn apply_screen(planes: &mut Array4<Complex64>, screen: &Array2<Complex64>) {
    let (nchan, npol, _, _) = planes.dim();
    for chan in 0..nchan {
        for pol in 0..npol {
            planes
                .slice_mut(s![chan, pol, .., ..])
                .zip_mut_with(screen, |v, s| *v *= *s);
        }
    }
}

/// Predict with w-stacking and add the result to a copy of `vis`.
pub fn predict_wstack(vis: &Visibility, model: &Image, vis_slices: usize) -> Result<Visibility, ArlError> {
    check_image(model)?;
    let slices = w_slices(vis, vis_slices);
    log::info!(
        "predict_wstack: predicting {} visibilities in {} w slices",
        vis.nvis(),
        slices.len()
    );

    let mut out = vis.clone();
    let [_, _, ny, nx] = model.shape();
    let base = model.data.mapv(|v| Complex64::new(v, 0.0));
    for (w, rows) in &slices {
        let screen = w_screen(ny, nx, &model.wcs, *w, -1.0);
        let mut planes = base.clone();
        apply_screen(&mut planes, &screen);
        predict_planes(&mut out, rows, &planes, &model.wcs, model.polarisation_frame)?;
    }
    Ok(out)
}

/// Invert with w-stacking onto the grid of `template`.
pub fn invert_wstack(
    vis: &Visibility,
    template: &Image,
    dopsf: bool,
    vis_slices: usize,
) -> Result<(Image, Array2<f64>), ArlError> {
    check_image(template)?;
    let slices = w_slices(vis, vis_slices);
    log::info!(
        "invert_wstack: inverting {} visibilities in {} w slices",
        vis.nvis(),
        slices.len()
    );

    let shape = template.shape();
    let [nchan, npol, ny, nx] = shape;
    let mut total = Array4::<Complex64>::zeros(shape);
    let mut sumwt = Array2::<f64>::zeros((nchan, npol));
    for (w, rows) in &slices {
        let (mut planes, weights) = invert_planes(
            vis,
            rows,
            shape,
            &template.wcs,
            template.polarisation_frame,
            dopsf,
        )?;
        let screen = w_screen(ny, nx, &template.wcs, *w, 1.0);
        apply_screen(&mut planes, &screen);
        total += &planes;
        sumwt += &weights;
    }

    let data = normalise_planes(&total, &sumwt);
    let image = Image::new(data, template.wcs.clone(), template.polarisation_frame)?;
    Ok((image, sumwt))
}
