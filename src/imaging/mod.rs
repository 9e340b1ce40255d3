//! Fourier imaging: visibilities to images and back.
//!
//! Samples are gridded with a prolate spheroidal kernel and transformed
//! with centred FFTs; the kernel's taper is removed in the image plane.
//! Wide fields are handled by w-stacking. Image x runs towards decreasing
//! RA, matching the negative first axis of the WCS.

pub mod advice;
pub mod base;
pub mod create;
pub mod fft;
pub mod grid;
pub mod kernel;
pub mod partition;
pub mod skycomponent;
pub mod weighting;
pub mod wstack;

pub use advice::{advise_wide_field, AdviceParams, WideFieldAdvice};
pub use base::{invert_2d, predict_2d};
pub use create::{create_image_from_visibility, create_wcs_from_visibility, critical_cellsize, DEFAULT_NPIXEL};
pub use partition::{
    invert_fourier_partition, invert_image_partition, predict_fourier_partition, predict_image_partition,
};
pub use skycomponent::{
    insert_skycomponent, predict_skycomponent_blockvisibility, predict_skycomponent_visibility, InsertMethod,
};
pub use weighting::{weight_visibility, Weighting};
pub use wstack::{invert_wstack, predict_wstack};

use ndarray::Array2;

use crate::data::{Image, Visibility};
use crate::error::ArlError;

/// Choice of imaging algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagingContext {
    /// Plain 2D transform; w is ignored.
    TwoD,
    /// W-stacking with the given number of w slices.
    WStack { vis_slices: usize },
    /// 2D transforms of `n` x `n` facets.
    ImagePartition { image_partitions: usize },
    /// 2D transforms of the samples in each of `n` x `n` uv blocks.
    FourierPartition { fourier_partitions: usize },
}

impl ImagingContext {
    /// Get the string name of this context.
    pub fn name(&self) -> &'static str {
        match self {
            ImagingContext::TwoD => "2d",
            ImagingContext::WStack { .. } => "wstack",
            ImagingContext::ImagePartition { .. } => "image_partition",
            ImagingContext::FourierPartition { .. } => "fourier_partition",
        }
    }

    /// Predict `model` and add it to a copy of `vis`.
    pub fn predict(&self, vis: &Visibility, model: &Image) -> Result<Visibility, ArlError> {
        match *self {
            ImagingContext::TwoD => predict_2d(vis, model),
            ImagingContext::WStack { vis_slices } => predict_wstack(vis, model, vis_slices),
            ImagingContext::ImagePartition { image_partitions } => {
                predict_image_partition(vis, model, image_partitions)
            }
            ImagingContext::FourierPartition { fourier_partitions } => {
                predict_fourier_partition(vis, model, fourier_partitions)
            }
        }
    }

    /// Dirty image or PSF on the grid of `template`, with summed weights.
    pub fn invert(
        &self,
        vis: &Visibility,
        template: &Image,
        dopsf: bool,
    ) -> Result<(Image, Array2<f64>), ArlError> {
        match *self {
            ImagingContext::TwoD => invert_2d(vis, template, dopsf),
            ImagingContext::WStack { vis_slices } => invert_wstack(vis, template, dopsf, vis_slices),
            ImagingContext::ImagePartition { image_partitions } => {
                invert_image_partition(vis, template, dopsf, image_partitions)
            }
            ImagingContext::FourierPartition { fourier_partitions } => {
                invert_fourier_partition(vis, template, dopsf, fourier_partitions)
            }
        }
    }
}
