/// Speed of light used for velocity windows, km/s.
pub const SPEED_OF_LIGHT_KMS: f64 = 3.0e5;

pub const ARCSEC_PER_DEGREE: f64 = 3600.0;

/// Lyman-alpha, Angstrom.
pub const DEFAULT_EMISSION_LINES: &[f64] = &[1216.0];

pub const DEFAULT_SKY_LINES: &[f64] = &[4360.0];
