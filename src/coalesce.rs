//! Conversion between block and per-sample visibilities.
//!
//! Coalescing flattens a [`BlockVisibility`] into a [`Visibility`],
//! optionally averaging consecutive integrations, and records for every
//! block cell the sample it went into. Decoalescing uses that index to
//! scatter per-sample visibilities back onto a block.

use num_complex::Complex64;

use crate::data::{BlockVisibility, Visibility};
use crate::error::ArlError;

/// Flatten `block` into per-sample form.
///
/// With `time_coal <= 1` every block cell becomes one sample and the index
/// is the identity. Otherwise each run of `time_coal` integrations is
/// averaged per (baseline, channel): visibilities weighted by `weight`,
/// coordinates and times by plain mean, weights and integration times
/// summed.
///
/// Returns the samples and, for each cell of the block in
/// `[time][baseline][channel]` order, the row it was written to.
pub fn coalesce_visibility(block: &BlockVisibility, time_coal: usize) -> (Visibility, Vec<i64>) {
    let time_coal = time_coal.max(1);
    let ntimes = block.ntimes();
    let nbl = block.nbaselines();
    let nchan = block.nchan();
    let npol = block.npol();
    let ngroups = ntimes.div_ceil(time_coal);

    let mut vis = Visibility::zeros(
        ngroups * nbl * nchan,
        block.polarisation_frame,
        block.phase_centre,
    );
    let mut cindex = vec![0i64; block.ncells()];

    for g in 0..ngroups {
        let t0 = g * time_coal;
        let t1 = (t0 + time_coal).min(ntimes);
        let n = (t1 - t0) as f64;
        for (b, &(a1, a2)) in block.baselines.iter().enumerate() {
            for c in 0..nchan {
                let row = (g * nbl + b) * nchan + c;
                vis.antenna1[row] = a1 as i32;
                vis.antenna2[row] = a2 as i32;
                vis.frequency[row] = block.frequency[c];
                vis.channel_bandwidth[row] = block.channel_bandwidth[c];

                let mut vsum = vec![Complex64::new(0.0, 0.0); npol];
                let mut wsum = vec![0.0; npol];
                for t in t0..t1 {
                    cindex[block.flat_index(t, b, c)] = row as i64;
                    vis.time[row] += block.time[t] / n;
                    vis.integration_time[row] += block.integration_time[t];
                    for k in 0..3 {
                        vis.uvw[[row, k]] += block.uvw[[t, b, k]] / n;
                    }
                    for p in 0..npol {
                        let w = block.weight[[t, b, c, p]];
                        vsum[p] += block.vis[[t, b, c, p]] * w;
                        wsum[p] += w;
                        vis.imaging_weight[[row, p]] += block.imaging_weight[[t, b, c, p]];
                    }
                }
                for p in 0..npol {
                    vis.weight[[row, p]] = wsum[p];
                    vis.vis[[row, p]] = if wsum[p] > 0.0 {
                        vsum[p] / wsum[p]
                    } else if t1 - t0 == 1 {
                        // Single unweighted integration: carry the value through.
                        block.vis[[t0, b, c, p]]
                    } else {
                        Complex64::new(0.0, 0.0)
                    };
                }
            }
        }
    }

    log::debug!(
        "coalesce_visibility: {} block cells into {} samples",
        block.ncells(),
        vis.nvis()
    );
    (vis, cindex)
}

/// Scatter per-sample visibilities back onto a copy of `template`.
///
/// Block cell `i` receives the visibilities of sample `cindex[i]`; every
/// other field comes from the template.
pub fn decoalesce_visibility(
    vis: &Visibility,
    template: &BlockVisibility,
    cindex: Option<&[i64]>,
) -> Result<BlockVisibility, ArlError> {
    let cindex = cindex.ok_or(ArlError::MissingCoalesceIndex)?;
    if cindex.len() != template.ncells() {
        return Err(ArlError::ShapeMismatch(format!(
            "index has {} entries but block has {} cells",
            cindex.len(),
            template.ncells()
        )));
    }
    if vis.npol() != template.npol() {
        return Err(ArlError::ShapeMismatch(format!(
            "visibility has {} polarisations but block has {}",
            vis.npol(),
            template.npol()
        )));
    }

    let mut block = template.clone();
    for (i, &row) in cindex.iter().enumerate() {
        let row = usize::try_from(row)
            .ok()
            .filter(|&r| r < vis.nvis())
            .ok_or_else(|| {
                ArlError::InvalidArgument(format!(
                    "index entry {i} refers to sample {row} of {}",
                    vis.nvis()
                ))
            })?;
        let (t, b, c) = block.unflatten(i);
        for p in 0..block.npol() {
            block.vis[[t, b, c, p]] = vis.vis[[row, p]];
        }
    }
    Ok(block)
}
