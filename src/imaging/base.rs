//! Two-dimensional prediction and inversion.
//!
//! Both directions work on complex image planes so that the w-stacking
//! code can apply phase screens before and after the transforms.

use ndarray::prelude::*;
use num_complex::Complex64;
use rayon::prelude::*;

use super::fft::{grid_to_image, image_to_grid};
use super::grid::{degrid_sample, grid_sample, on_grid, uv_to_grid};
use super::kernel::grid_correction;
use crate::data::{convert_polarisation, Image, PolarisationFrame, Visibility, Wcs};
use crate::error::ArlError;

/// Image channel of every sample in `rows`.
fn channel_map(vis: &Visibility, rows: &[usize], wcs: &Wcs, nchan: usize) -> Vec<usize> {
    rows.iter()
        .map(|&row| wcs.nearest_channel(vis.frequency[row], nchan))
        .collect()
}

/// Continuous grid coordinates of sample `row`, or `None` if it falls off
/// an `(ny, nx)` grid.
///
/// Image x runs towards decreasing RA, `l = -(x - nx / 2) * cellsize`, so u
/// is mirrored onto the grid.
#[inline]
pub(crate) fn sample_grid_position(
    vis: &Visibility,
    row: usize,
    ny: usize,
    nx: usize,
    cellsize: f64,
) -> Option<(f64, f64)> {
    let [u, v, _] = vis.uvw_lambda(row);
    let gx = uv_to_grid(-u, nx, cellsize);
    let gy = uv_to_grid(v, ny, cellsize);
    on_grid(gx, gy, ny, nx).then_some((gx, gy))
}

/// Degrid `planes` (image frame `frame`) at each sample in `rows` and add
/// the result, converted to the visibility frame, to `vis`.
pub(crate) fn predict_planes(
    vis: &mut Visibility,
    rows: &[usize],
    planes: &Array4<Complex64>,
    wcs: &Wcs,
    frame: PolarisationFrame,
) -> Result<(), ArlError> {
    let (nchan, npol, ny, nx) = planes.dim();
    let cellsize = wcs.cellsize();
    let gcf = grid_correction(ny, nx);

    // Fourier transform each corrected plane once.
    let grids: Vec<Vec<Array2<Complex64>>> = (0..nchan)
        .into_par_iter()
        .map(|chan| {
            (0..npol)
                .map(|pol| {
                    let mut corrected = planes.slice(s![chan, pol, .., ..]).to_owned();
                    corrected.zip_mut_with(&gcf, |v, c| *v *= *c);
                    image_to_grid(&corrected)
                })
                .collect()
        })
        .collect();

    let chans = channel_map(vis, rows, wcs, nchan);
    let vis_frame = vis.polarisation_frame;
    let shared: &Visibility = vis;
    let predicted: Vec<Option<Vec<Complex64>>> = rows
        .par_iter()
        .zip(chans.par_iter())
        .map(|(&row, &chan)| {
            let Some((gx, gy)) = sample_grid_position(shared, row, ny, nx, cellsize) else {
                return Ok(None);
            };
            let values: Vec<Complex64> = grids[chan]
                .iter()
                .map(|g| degrid_sample(&g.view(), gx, gy))
                .collect();
            convert_polarisation(frame, vis_frame, &values).map(Some)
        })
        .collect::<Result<_, ArlError>>()?;

    for (&row, values) in rows.iter().zip(predicted) {
        if let Some(values) = values {
            for (p, v) in values.into_iter().enumerate() {
                vis.vis[[row, p]] += v;
            }
        }
    }
    Ok(())
}

/// Weight given to image polarisation `pol` for sample `row`.
#[inline]
fn sample_weight(vis: &Visibility, row: usize, image_frame: PolarisationFrame, pol: usize) -> f64 {
    if image_frame == vis.polarisation_frame {
        vis.imaging_weight[[row, pol]]
    } else {
        let hands = vis.polarisation_frame.parallel_hands();
        hands.iter().map(|&p| vis.imaging_weight[[row, p]]).sum::<f64>() / hands.len() as f64
    }
}

/// Grid the samples in `rows` and transform to complex image planes of
/// `shape`, corrected for the gridding kernel but not normalised.
///
/// Returns the planes and the summed weight per `[chan, pol]`.
pub(crate) fn invert_planes(
    vis: &Visibility,
    rows: &[usize],
    shape: [usize; 4],
    wcs: &Wcs,
    frame: PolarisationFrame,
    dopsf: bool,
) -> Result<(Array4<Complex64>, Array2<f64>), ArlError> {
    let [nchan, npol, ny, nx] = shape;
    let cellsize = wcs.cellsize();
    let chans = channel_map(vis, rows, wcs, nchan);

    // Values and weights per sample, already in the image frame.
    let mut samples: Vec<Vec<(f64, f64, Vec<Complex64>, Vec<f64>)>> = vec![Vec::new(); nchan];
    for (&row, &chan) in rows.iter().zip(chans.iter()) {
        let Some((gx, gy)) = sample_grid_position(vis, row, ny, nx, cellsize) else {
            continue;
        };
        let values = if dopsf {
            vec![Complex64::new(1.0, 0.0); npol]
        } else {
            let row_vis: Vec<Complex64> = vis.vis.row(row).to_vec();
            convert_polarisation(vis.polarisation_frame, frame, &row_vis)?
        };
        let weights = (0..npol).map(|p| sample_weight(vis, row, frame, p)).collect();
        samples[chan].push((gx, gy, values, weights));
    }

    let gcf = grid_correction(ny, nx);
    let per_channel: Vec<(Vec<Array2<Complex64>>, Vec<f64>)> = samples
        .into_par_iter()
        .map(|chan_samples| {
            let mut grids = vec![Array2::<Complex64>::zeros((ny, nx)); npol];
            let mut sumwt = vec![0.0; npol];
            for (gx, gy, values, weights) in &chan_samples {
                for p in 0..npol {
                    let w = weights[p];
                    if w == 0.0 {
                        continue;
                    }
                    grid_sample(&mut grids[p].view_mut(), *gx, *gy, values[p] * w);
                    sumwt[p] += w;
                }
            }
            let images = grids
                .iter()
                .map(|g| {
                    let mut im = grid_to_image(g);
                    im.zip_mut_with(&gcf, |v, c| *v *= *c);
                    im
                })
                .collect();
            (images, sumwt)
        })
        .collect();

    let mut planes = Array4::zeros((nchan, npol, ny, nx));
    let mut sumwt = Array2::zeros((nchan, npol));
    for (chan, (images, weights)) in per_channel.into_iter().enumerate() {
        for (pol, im) in images.into_iter().enumerate() {
            planes.slice_mut(s![chan, pol, .., ..]).assign(&im);
            sumwt[[chan, pol]] = weights[pol];
        }
    }
    Ok((planes, sumwt))
}

/// Real part of `planes` divided by the summed weights.
pub(crate) fn normalise_planes(planes: &Array4<Complex64>, sumwt: &Array2<f64>) -> Array4<f64> {
    let mut out = planes.mapv(|v| v.re);
    for ((chan, pol), &w) in sumwt.indexed_iter() {
        if w > 0.0 {
            out.slice_mut(s![chan, pol, .., ..]).mapv_inplace(|v| v / w);
        }
    }
    out
}

/// Check that an image can be used with a visibility set.
pub(crate) fn check_image(image: &Image) -> Result<(), ArlError> {
    let [nchan, npol, ny, nx] = image.shape();
    if nchan == 0 || ny == 0 || nx == 0 || npol != image.polarisation_frame.npol() {
        return Err(ArlError::ShapeMismatch(format!(
            "image shape {:?} is not usable with frame {}",
            image.shape(),
            image.polarisation_frame
        )));
    }
    if !(image.wcs.cellsize() > 0.0) {
        return Err(ArlError::InvalidArgument("image cellsize must be positive".to_string()));
    }
    Ok(())
}

/// Predict visibilities from `model` and add them to a copy of `vis`.
///
/// Each sample uses the model channel nearest its frequency; polarisation
/// is converted from the image frame to the visibility frame.
pub fn predict_2d(vis: &Visibility, model: &Image) -> Result<Visibility, ArlError> {
    check_image(model)?;
    log::info!(
        "predict_2d: predicting {} visibilities from {:?} image",
        vis.nvis(),
        model.shape()
    );
    let mut out = vis.clone();
    let rows: Vec<usize> = (0..vis.nvis()).collect();
    let planes = model.data.mapv(|v| Complex64::new(v, 0.0));
    predict_planes(&mut out, &rows, &planes, &model.wcs, model.polarisation_frame)?;
    Ok(out)
}

/// Make the dirty image, or with `dopsf` the point spread function, on the
/// grid of `template`.
///
/// The image is normalised by the summed imaging weights, which are
/// returned alongside as `[nchan, npol]`.
pub fn invert_2d(vis: &Visibility, template: &Image, dopsf: bool) -> Result<(Image, Array2<f64>), ArlError> {
    check_image(template)?;
    log::info!(
        "invert_2d: inverting {} visibilities to make {}",
        vis.nvis(),
        if dopsf { "PSF" } else { "dirty image" }
    );
    let rows: Vec<usize> = (0..vis.nvis()).collect();
    let (planes, sumwt) = invert_planes(
        vis,
        &rows,
        template.shape(),
        &template.wcs,
        template.polarisation_frame,
        dopsf,
    )?;
    let data = normalise_planes(&planes, &sumwt);
    let image = Image::new(data, template.wcs.clone(), template.polarisation_frame)?;
    Ok((image, sumwt))
}
