//! Continuum modeling and subtraction for integral-field spectral cubes.
//!
//! The entry point is [`subtract_continuum`]: it takes a `(wavelength, y, x)`
//! cube, its header cards and the approximate spaxel of a continuum source,
//! and returns the continuum-subtracted cube, the continuum model and a
//! report of what was fitted.

pub mod domain;
pub mod error;
pub mod model;
pub mod utils;

pub use crate::domain::config_manager::{load_config, save_config, SubtractionConfig};
pub use crate::domain::continuum::{FitUnit, FittedParams, Mode, SpecFitConfig, UnitFailure};
pub use crate::domain::orientation::Instrument;
pub use crate::domain::polyfit::{fit_polynomial_continuum, PolynomialFit, PolynomialModel};
pub use crate::domain::progress::ProgressEvent;
pub use crate::domain::subtract::{
    subtract_continuum, subtract_continuum_with_progress, SubtractionReport, SubtractionResult,
};
pub use crate::domain::wavelength_mask::LineCatalog;
pub use crate::error::{ContinuumError, Result};
pub use crate::model::{BoundingBox, CubeHeader, Position};
