use serde::{Deserialize, Serialize};

use crate::error::{ContinuumError, Result};
use crate::utils::constants::{DEFAULT_EMISSION_LINES, DEFAULT_SKY_LINES, SPEED_OF_LIGHT_KMS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineCatalog {
    /// Rest-frame emission lines, redshifted before exclusion.
    pub emission_lines: Vec<f64>,
    /// Observed-frame sky lines.
    pub sky_lines: Vec<f64>,
    pub exclude_sky_lines: bool,
}

impl Default for LineCatalog {
    fn default() -> Self {
        Self {
            emission_lines: DEFAULT_EMISSION_LINES.to_vec(),
            sky_lines: DEFAULT_SKY_LINES.to_vec(),
            exclude_sky_lines: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MaskParams {
    pub valid_range: (f64, f64),
    pub redshift: Option<f64>,
    pub velocity_window_kms: f64,
}

/// Clear every entry whose wavelength lies in `[center - dw, center + dw]`.
/// Entries are only ever switched off.
pub fn exclude_window(mask: &mut [bool], wavelengths: &[f64], center: f64, velocity_kms: f64) {
    let dw = (velocity_kms / SPEED_OF_LIGHT_KMS) * center;
    let (lo, hi) = (center - dw.abs(), center + dw.abs());
    for (m, &w) in mask.iter_mut().zip(wavelengths) {
        if w >= lo && w <= hi {
            *m = false;
        }
    }
}

pub fn build_mask(
    wavelengths: &[f64],
    catalog: &LineCatalog,
    params: &MaskParams,
) -> Result<Vec<bool>> {
    let (lo, hi) = params.valid_range;
    if !(params.velocity_window_kms.is_finite() && params.velocity_window_kms >= 0.0) {
        return Err(ContinuumError::Configuration(format!(
            "velocity window must be non-negative, got {}",
            params.velocity_window_kms
        )));
    }

    let mut mask: Vec<bool> = wavelengths.iter().map(|&w| w >= lo && w <= hi).collect();

    if let Some(z) = params.redshift {
        if !(z.is_finite() && z > -1.0) {
            return Err(ContinuumError::Configuration(format!(
                "invalid redshift {}",
                z
            )));
        }
        for &line in &catalog.emission_lines {
            exclude_window(&mut mask, wavelengths, (1.0 + z) * line, params.velocity_window_kms);
        }
    }

    if catalog.exclude_sky_lines {
        for &line in &catalog.sky_lines {
            exclude_window(&mut mask, wavelengths, line, params.velocity_window_kms);
        }
    }

    let used = mask.iter().filter(|&&m| m).count();
    log::debug!(
        "wavelength mask keeps {}/{} slices (valid range {:.2}-{:.2})",
        used,
        mask.len(),
        lo,
        hi
    );

    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> Vec<f64> {
        (0..200).map(|i| 3500.0 + 5.0 * i as f64).collect()
    }

    fn params(redshift: Option<f64>) -> MaskParams {
        MaskParams {
            valid_range: (3600.0, 4300.0),
            redshift,
            velocity_window_kms: 1000.0,
        }
    }

    #[test]
    fn test_outside_valid_range_always_false() {
        let w = axis();
        let catalog = LineCatalog {
            emission_lines: vec![1216.0, 1240.0, 1549.0],
            ..Default::default()
        };
        for z in [None, Some(2.0), Some(2.3)] {
            let mask = build_mask(&w, &catalog, &params(z)).unwrap();
            for (m, &wl) in mask.iter().zip(&w) {
                if wl < 3600.0 || wl > 4300.0 {
                    assert!(!m);
                }
            }
        }
    }

    #[test]
    fn test_no_redshift_skips_lines() {
        let w = axis();
        let mask = build_mask(&w, &LineCatalog::default(), &params(None)).unwrap();
        let expected: Vec<bool> = w.iter().map(|&x| (3600.0..=4300.0).contains(&x)).collect();
        assert_eq!(mask, expected);
    }

    #[test]
    fn test_lyman_alpha_window() {
        let w = axis();
        let z = 2.0;
        let mask = build_mask(&w, &LineCatalog::default(), &params(Some(z))).unwrap();
        let wc = 3.0 * 1216.0;
        let dw = 1000.0 / 3.0e5 * wc;
        for (m, &wl) in mask.iter().zip(&w) {
            if (wl - wc).abs() <= dw {
                assert!(!m, "{} should be excluded", wl);
            } else if (3600.0..=4300.0).contains(&wl) {
                assert!(m, "{} should be kept", wl);
            }
        }
    }

    #[test]
    fn test_more_lines_never_reenable() {
        let w = axis();
        let few = LineCatalog {
            emission_lines: vec![1216.0],
            ..Default::default()
        };
        let many = LineCatalog {
            emission_lines: vec![1216.0, 1240.0, 1335.0, 1400.0],
            ..Default::default()
        };
        let a = build_mask(&w, &few, &params(Some(2.1))).unwrap();
        let b = build_mask(&w, &many, &params(Some(2.1))).unwrap();
        for (x, y) in a.iter().zip(&b) {
            if !x {
                assert!(!y);
            }
        }
        assert!(b.iter().filter(|&&m| m).count() < a.iter().filter(|&&m| m).count());
    }

    #[test]
    fn test_sky_lines_opt_in() {
        let w = axis();
        let mut catalog = LineCatalog::default();
        let off = build_mask(&w, &catalog, &params(None)).unwrap();
        let idx = w.iter().position(|&x| x == 4360.0).unwrap();
        // 4360 lies outside the valid range here, so widen it.
        let wide = MaskParams {
            valid_range: (3500.0, 4500.0),
            ..params(None)
        };
        let off_wide = build_mask(&w, &catalog, &wide).unwrap();
        assert!(off_wide[idx]);
        catalog.exclude_sky_lines = true;
        let on_wide = build_mask(&w, &catalog, &wide).unwrap();
        assert!(!on_wide[idx]);
        assert!(!off[idx]);
    }

    #[test]
    fn test_invalid_inputs() {
        let w = axis();
        let mut p = params(Some(-1.5));
        assert!(build_mask(&w, &LineCatalog::default(), &p).is_err());
        p.redshift = None;
        p.velocity_window_kms = -5.0;
        assert!(build_mask(&w, &LineCatalog::default(), &p).is_err());
    }
}
