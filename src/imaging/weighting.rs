//! Imaging weights.

use ndarray::prelude::*;

use super::base::check_image;
use super::grid::uv_to_grid;
use crate::data::{Image, Visibility};
use crate::error::ArlError;

/// How `imaging_weight` is derived from `weight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weighting {
    /// Imaging weight equals the data weight.
    Natural,
    /// Data weight divided by the total weight in its uv cell.
    #[default]
    Uniform,
}

impl Weighting {
    pub fn name(&self) -> &'static str {
        match self {
            Weighting::Natural => "natural",
            Weighting::Uniform => "uniform",
        }
    }
}

/// Set the imaging weights of `vis` for imaging onto the grid of `template`.
pub fn weight_visibility(vis: &mut Visibility, template: &Image, weighting: Weighting) -> Result<(), ArlError> {
    check_image(template)?;
    log::info!(
        "weight_visibility: {} weighting of {} visibilities",
        weighting.name(),
        vis.nvis()
    );

    match weighting {
        Weighting::Natural => {
            vis.imaging_weight.assign(&vis.weight);
        }
        Weighting::Uniform => {
            let [nchan, _, ny, nx] = template.shape();
            let cellsize = template.wcs.cellsize();

            let cells: Vec<Option<(usize, usize, usize)>> = (0..vis.nvis())
                .map(|row| {
                    let [u, v, _] = vis.uvw_lambda(row);
                    let x = uv_to_grid(-u, nx, cellsize).round();
                    let y = uv_to_grid(v, ny, cellsize).round();
                    if x < 0.0 || y < 0.0 || x >= nx as f64 || y >= ny as f64 {
                        return None;
                    }
                    let chan = template.wcs.nearest_channel(vis.frequency[row], nchan);
                    Some((chan, y as usize, x as usize))
                })
                .collect();

            let mut density = Array3::<f64>::zeros((nchan, ny, nx));
            for (row, cell) in cells.iter().enumerate() {
                if let Some(cell) = *cell {
                    density[cell] += vis.weight.row(row).mean().unwrap_or(0.0);
                }
            }

            for (row, cell) in cells.iter().enumerate() {
                let total = cell.map(|c| density[c]).unwrap_or(0.0);
                for p in 0..vis.npol() {
                    vis.imaging_weight[[row, p]] = if total > 0.0 {
                        vis.weight[[row, p]] / total
                    } else {
                        0.0
                    };
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PhaseCentre, PolarisationFrame, Wcs, SPEED_OF_LIGHT};

    fn three_samples() -> (Visibility, Image) {
        let mut vis = Visibility::zeros(3, PolarisationFrame::StokesI, PhaseCentre::new(0.0, 0.0));
        vis.frequency.fill(SPEED_OF_LIGHT);
        vis.weight.fill(1.0);
        // Two samples share a cell, one is alone.
        vis.uvw[[0, 0]] = 10.0;
        vis.uvw[[1, 0]] = 10.01;
        vis.uvw[[2, 0]] = -200.0;
        let wcs = Wcs::new(PhaseCentre::new(0.0, 0.0), 1e-3, 64, SPEED_OF_LIGHT, 1e6);
        let template = Image::zeros([1, 1, 64, 64], wcs, PolarisationFrame::StokesI).unwrap();
        (vis, template)
    }

    #[test]
    fn test_uniform_weights() {
        let (mut vis, template) = three_samples();
        weight_visibility(&mut vis, &template, Weighting::Uniform).unwrap();
        assert_eq!(vis.imaging_weight[[0, 0]], 0.5);
        assert_eq!(vis.imaging_weight[[1, 0]], 0.5);
        assert_eq!(vis.imaging_weight[[2, 0]], 1.0);
    }

    #[test]
    fn test_natural_weights() {
        let (mut vis, template) = three_samples();
        vis.weight[[2, 0]] = 3.0;
        weight_visibility(&mut vis, &template, Weighting::Natural).unwrap();
        assert_eq!(vis.imaging_weight, vis.weight);
    }
}
