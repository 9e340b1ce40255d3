//! Visibility creation, copying, conversion and prediction entry points.

use std::ffi::{c_int, c_longlong};

use super::convert::{
    block_from_c, block_records, block_to_c, check_descriptor, check_vis_output, check_visibility_to_c,
    image_from_c, read_optional_descriptor, require, require_mut, setup_from_c, visibility_from_c,
    visibility_to_c, write_descriptor, ObservationSetup,
};
use super::status::ffi_entry;
use super::types::{vis_entry_size, ARLConf, ARLImage, ARLVis, ArlStatus, VisRecords, VisRecordsMut};
use crate::coalesce::{coalesce_visibility, decoalesce_visibility};
use crate::data::{create_named_configuration, BlockVisibility, Configuration, Image};
use crate::error::ArlError;
use crate::imaging::{predict_wstack, weight_visibility, Weighting};
use crate::runtime::ArlContext;
use crate::simulation::{create_blockvisibility, create_visibility};
use num_complex::Complex64;

fn configuration_for(setup: &ObservationSetup) -> Result<Configuration, ArlError> {
    let config = create_named_configuration(&setup.name, setup.rmax)?;
    if let Some(nant) = setup.nant {
        if nant != config.nant() {
            log::warn!(
                "{}: ARLConf.nant is {nant} but the configuration has {} antennas",
                setup.name,
                config.nant()
            );
        }
    }
    Ok(config)
}

/// Predict `model` into a zeroed copy of `block` with w-stacking.
///
/// Returns the per-sample visibilities, the block and the index between them.
fn predict_block(
    ctx: &ArlContext,
    block: &BlockVisibility,
    model: &Image,
) -> Result<(crate::data::Visibility, BlockVisibility, Vec<i64>), ArlError> {
    let vis_slices = ctx.config().vis_slices;
    ctx.install(|| {
        let (mut vis, cindex) = coalesce_visibility(block, 1);
        vis.vis.fill(Complex64::new(0.0, 0.0));
        let predicted = predict_wstack(&vis, model, vis_slices)?;
        let block_out = decoalesce_visibility(&predicted, block, Some(&cindex))?;
        Ok((predicted, block_out, cindex))
    })
}

/// Copy `visin` into `visout`, zeroing every record when `zero` is set.
///
/// `visout->nvis` gives the capacity of `visout->data` on entry. The phase
/// centre descriptor is copied when `visin` carries one.
///
/// # Safety
/// Both pointers must be valid `ARLVis` structures whose `data` hold
/// `nvis` records of their `npol` layout.
#[no_mangle]
pub unsafe extern "C" fn arl_copy_visibility(visin: *const ARLVis, visout: *mut ARLVis, zero: bool) {
    ffi_entry("arl_copy_visibility", |_| {
        let src = require(visin, "input ARLVis")?;
        let view = ARLVis {
            nvis: src.nvis,
            npol: src.npol,
            data: src.data,
            phasecentre: src.phasecentre,
        };
        let (nvis, npol) = (view.nvis, view.npol);
        vis_entry_size(npol)?;
        let phasecentre = read_optional_descriptor(view.phasecentre, "input ARLVis.phasecentre")?;

        // visin and visout may be the same structure.
        let out = require_mut(visout, "output ARLVis")?;
        check_vis_output(out, nvis, npol as usize, "output ARLVis.data")?;
        if let Some(text) = &phasecentre {
            check_descriptor(out.phasecentre, "output ARLVis.phasecentre", text)?;
        }

        out.npol = npol;
        if out.data != view.data {
            let records = VisRecords::with_len(&view, nvis)?;
            VisRecordsMut::with_len(out, nvis)?.copy_from(&records)?;
        }
        if zero {
            VisRecordsMut::with_len(out, nvis)?.clear();
        }
        if let Some(text) = &phasecentre {
            if out.phasecentre != view.phasecentre {
                write_descriptor(out.phasecentre, text);
            }
        }
        out.nvis = nvis;
        Ok(())
    });
}

/// Synthesise per-sample visibilities for `lowconf`, one record per
/// (time, baseline, channel), with zero visibilities and unit weights.
///
/// # Safety
/// `lowconf` must be a valid `ARLConf` and `res_vis` a valid output `ARLVis`.
#[no_mangle]
pub unsafe extern "C" fn arl_create_visibility(lowconf: *mut ARLConf, res_vis: *mut ARLVis) {
    ffi_entry("arl_create_visibility", |ctx| {
        let setup = setup_from_c(lowconf)?;
        let config = configuration_for(&setup)?;
        let vis = ctx.install(|| {
            create_visibility(
                &config,
                &setup.times,
                &setup.frequency,
                &setup.channel_bandwidth,
                setup.phase_centre,
                setup.polarisation_frame,
                1.0,
            )
        })?;
        visibility_to_c(&vis, res_vis)
    });
}

/// Synthesise a block visibility for `lowconf`, written as
/// `[time][baseline][channel]` records.
///
/// # Safety
/// `lowconf` must be a valid `ARLConf` and `res_vis` a valid output `ARLVis`.
#[no_mangle]
pub unsafe extern "C" fn arl_create_blockvisibility(lowconf: *mut ARLConf, res_vis: *mut ARLVis) {
    ffi_entry("arl_create_blockvisibility", |ctx| {
        let setup = setup_from_c(lowconf)?;
        let config = configuration_for(&setup)?;
        let block = ctx.install(|| {
            create_blockvisibility(
                &config,
                &setup.times,
                &setup.frequency,
                &setup.channel_bandwidth,
                setup.phase_centre,
                setup.polarisation_frame,
                1.0,
            )
        })?;
        block_to_c(&block, res_vis)
    });
}

/// Predict `img` into the block visibility `visin` with w-stacking.
///
/// Writes the per-sample prediction to `visout`, the block prediction to
/// `blockvisout` and `ntimes * nbases * nfreqs` index entries to
/// `cindexout`. The visibilities already in `visin` are ignored.
///
/// # Safety
/// All pointers must be valid; `cindexout` must hold one entry per block
/// record.
#[no_mangle]
pub unsafe extern "C" fn arl_predict_function(
    lowconf: *mut ARLConf,
    visin: *const ARLVis,
    img: *const ARLImage,
    visout: *mut ARLVis,
    blockvisout: *mut ARLVis,
    cindexout: *mut c_longlong,
) {
    ffi_entry("arl_predict_function", |ctx| {
        let setup = setup_from_c(lowconf)?;
        let block = block_from_c(visin, setup.ntimes(), setup.nchan(), setup.nant)?;
        let model = image_from_c(img)?;
        if cindexout.is_null() {
            return Err(ArlError::NullPointer("cindexout"));
        }
        let (vis, block_out, cindex) = predict_block(ctx, &block, &model)?;

        let block_flat = block_records(&block_out);
        check_visibility_to_c(&vis, visout)?;
        check_visibility_to_c(&block_flat, blockvisout)?;
        visibility_to_c(&vis, visout)?;
        visibility_to_c(&block_flat, blockvisout)?;
        let index = std::slice::from_raw_parts_mut(cindexout, cindex.len());
        for (dst, &src) in index.iter_mut().zip(&cindex) {
            *dst = src as c_longlong;
        }
        Ok(())
    });
}

/// Scatter the per-sample visibilities `visin` back onto the block layout
/// of `blockvisin` through `cindexin`, writing the block to `visout`.
///
/// # Safety
/// All pointers must be valid; `cindexin` must hold one entry per record
/// of `blockvisin`.
#[no_mangle]
pub unsafe extern "C" fn arl_convert_visibility_to_blockvisibility(
    lowconf: *mut ARLConf,
    visin: *const ARLVis,
    blockvisin: *const ARLVis,
    cindexin: *mut c_longlong,
    visout: *mut ARLVis,
) {
    ffi_entry("arl_convert_visibility_to_blockvisibility", |ctx| {
        let setup = setup_from_c(lowconf)?;
        let vis = visibility_from_c(visin)?;
        let template = block_from_c(blockvisin, setup.ntimes(), setup.nchan(), setup.nant)?;
        let cindex: Option<Vec<i64>> = (!cindexin.is_null()).then(|| {
            std::slice::from_raw_parts(cindexin, template.ncells())
                .iter()
                .map(|&i| i as i64)
                .collect()
        });
        let block = ctx.install(|| decoalesce_visibility(&vis, &template, cindex.as_deref()))?;
        block_to_c(&block, visout)
    });
}

/// Replace the visibilities of the block `blockvis` with the w-stacked
/// prediction of `img`.
///
/// # Safety
/// `blockvis` must be a valid `ARLVis` holding a block for `lowconf`, and
/// `img` a valid `Image`.
#[no_mangle]
pub unsafe extern "C" fn arl_predict_function_blockvis(
    lowconf: *mut ARLConf,
    blockvis: *mut ARLVis,
    img: *const ARLImage,
) {
    ffi_entry("arl_predict_function_blockvis", |ctx| {
        let setup = setup_from_c(lowconf)?;
        let block = block_from_c(blockvis, setup.ntimes(), setup.nchan(), setup.nant)?;
        let model = image_from_c(img)?;
        let (_, block_out, _) = predict_block(ctx, &block, &model)?;
        block_to_c(&block_out, blockvis)
    });
}

/// Recompute imaging weights of `vis` in place on the grid of `img`.
///
/// `weighting` is 0 for natural and 1 for uniform weighting.
///
/// # Safety
/// `vis` must be a valid `ARLVis` and `img` a valid `Image`.
#[no_mangle]
pub unsafe extern "C" fn arl_weight_visibility(
    vis: *mut ARLVis,
    img: *const ARLImage,
    weighting: c_int,
) -> ArlStatus {
    ffi_entry("arl_weight_visibility", |ctx| {
        let weighting = match weighting {
            0 => Weighting::Natural,
            1 => Weighting::Uniform,
            n => return Err(ArlError::InvalidArgument(format!("unknown weighting {n}"))),
        };
        let mut data = visibility_from_c(vis)?;
        let template = image_from_c(img)?;
        ctx.install(|| weight_visibility(&mut data, &template, weighting))?;
        visibility_to_c(&data, vis)
    })
}
