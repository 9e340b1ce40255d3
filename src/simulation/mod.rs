//! Synthetic observations, sky models and gain errors.

pub mod beam;
pub mod create;
pub mod gains;
pub mod test_image;

pub use beam::{create_low_test_beam, LOW_STATION_DIAMETER};
pub use create::{create_blockvisibility, create_visibility};
pub use gains::{simulate_gaintable, DEFAULT_GAIN_SEED};
pub use test_image::{
    create_low_test_image_from_gleam, create_low_test_skycomponents_from_gleam, create_test_image,
    test_image_shape, TEST_IMAGE_NPIXEL,
};
