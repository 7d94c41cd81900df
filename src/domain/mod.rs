pub mod centroid;
pub mod config_manager;
pub mod continuum;
pub mod cube;
pub mod orientation;
pub mod polyfit;
pub mod progress;
pub mod subtract;
pub mod wavelength_mask;
pub mod wcs;
pub mod xcorr;
