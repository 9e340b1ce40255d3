//! Data model for interferometric imaging.

pub mod configuration;
pub mod descriptor;
pub mod gaintable;
pub mod image;
pub mod polarisation;
pub mod skycomponent;
pub mod visibility;

pub use configuration::{
    baseline_pairs, create_named_configuration, num_baselines, xyz_at_latitude, xyz_to_uvw,
    Configuration, Location, Mount,
};
pub use descriptor::{PhaseCentre, Wcs};
pub use gaintable::GainTable;
pub use image::Image;
pub use polarisation::{convert_polarisation, PolarisationFrame};
pub use skycomponent::Skycomponent;
pub use visibility::{BlockVisibility, Visibility, SPEED_OF_LIGHT};
