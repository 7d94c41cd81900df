use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::domain::cube::white_light_image;
use crate::domain::wcs::PixelScale;
use crate::error::Result;
use crate::model::{BoundingBox, PixelRadius, Position};
use crate::utils::simplex::{minimize, SimplexConfig};

/// `A * (1 + ((x - x0) / gamma)^2)^(-alpha)`, parameters `[A, x0, gamma, alpha]`.
pub fn moffat_1d(x: f64, params: &[f64; 4]) -> f64 {
    let [amp, x0, gamma, alpha] = *params;
    let u = (x - x0) / gamma;
    amp * (1.0 + u * u).powf(-alpha)
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProfileFit {
    pub amplitude: f64,
    pub center: f64,
    pub gamma: f64,
    pub alpha: f64,
}

pub fn fit_profile(profile: &[f64], center_guess: f64, config: &SimplexConfig) -> Result<ProfileFit> {
    let amp0 = profile.iter().copied().fold(f64::NEG_INFINITY, f64::max).max(0.0);
    let objective = |p: &[f64; 4]| -> f64 {
        let constrained = [p[0].max(0.0), p[1], p[2], p[3]];
        profile
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let r = v - moffat_1d(i as f64, &constrained);
                r * r
            })
            .sum()
    };

    let result = minimize(objective, [amp0, center_guess, 1.0, 1.0], config)?;
    let [amplitude, center, gamma, alpha] = result.params;
    Ok(ProfileFit {
        amplitude: amplitude.max(0.0),
        center,
        gamma: gamma.abs(),
        alpha,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CentroidStatus {
    Accepted,
    ShiftTooLarge { dx_arcsec: f64, dy_arcsec: f64 },
    FitFailed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CentroidOutcome {
    pub position: Position,
    pub bbox: BoundingBox,
    pub fitted_center: Option<(f64, f64)>,
    pub status: CentroidStatus,
}

impl CentroidOutcome {
    pub fn accepted(&self) -> bool {
        self.status == CentroidStatus::Accepted
    }
}

/// A rejected refinement keeps the input position and its box.
pub fn refine_centroid(
    cube: &Array3<f32>,
    mask: &[bool],
    pos: Position,
    radius: PixelRadius,
    scale: &PixelScale,
    error_limit_arcsec: f64,
    config: &SimplexConfig,
) -> Result<CentroidOutcome> {
    let (_, height, width) = cube.dim();
    let bbox = BoundingBox::around(pos, radius, width, height)?;

    let img = white_light_image(cube, mask, &bbox);
    let x_profile: Vec<f64> = img.sum_axis(Axis(0)).to_vec();
    let y_profile: Vec<f64> = img.sum_axis(Axis(1)).to_vec();

    let fits = fit_profile(&x_profile, (pos.x - bbox.x0) as f64, config).and_then(|fx| {
        fit_profile(&y_profile, (pos.y - bbox.y0) as f64, config).map(|fy| (fx, fy))
    });

    let (fx, fy) = match fits {
        Ok(f) => f,
        Err(e) => {
            log::warn!("centroid fit failed near ({}, {}): {}", pos.x, pos.y, e);
            return Ok(CentroidOutcome {
                position: pos,
                bbox,
                fitted_center: None,
                status: CentroidStatus::FitFailed {
                    reason: e.to_string(),
                },
            });
        }
    };

    let xc = fx.center + bbox.x0 as f64;
    let yc = fy.center + bbox.y0 as f64;
    let dx_arcsec = (pos.x as f64 - xc).abs() * scale.x_arcsec;
    let dy_arcsec = (pos.y as f64 - yc).abs() * scale.y_arcsec;

    if !(dx_arcsec <= error_limit_arcsec && dy_arcsec <= error_limit_arcsec) {
        log::info!(
            "centroid ({:.2}, {:.2}) rejected: shift ({:.2}\", {:.2}\") exceeds {:.2}\"",
            xc,
            yc,
            dx_arcsec,
            dy_arcsec,
            error_limit_arcsec
        );
        return Ok(CentroidOutcome {
            position: pos,
            bbox,
            fitted_center: Some((xc, yc)),
            status: CentroidStatus::ShiftTooLarge { dx_arcsec, dy_arcsec },
        });
    }

    let refined = Position::rounded_clamped(xc, yc, width, height);
    let bbox = BoundingBox::around(refined, radius, width, height)?;
    log::debug!(
        "centroid refined ({}, {}) -> ({}, {}), fit center ({:.3}, {:.3})",
        pos.x,
        pos.y,
        refined.x,
        refined.y,
        xc,
        yc
    );

    Ok(CentroidOutcome {
        position: refined,
        bbox,
        fitted_center: Some((xc, yc)),
        status: CentroidStatus::Accepted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_cube(cx: f64, cy: f64, width: usize, height: usize) -> Array3<f32> {
        Array3::from_shape_fn((12, height, width), |(w, y, x)| {
            let r2 = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
            let psf = (1.0 + r2 / 4.0).powf(-2.5);
            ((10.0 + w as f64) * psf) as f32
        })
    }

    fn unit_scale() -> PixelScale {
        PixelScale::new(1.0, 1.0).unwrap()
    }

    #[test]
    fn test_fit_profile_recovers_center() {
        let truth = [5.0, 6.3, 2.0, 1.5];
        let profile: Vec<f64> = (0..15).map(|i| moffat_1d(i as f64, &truth)).collect();
        let fit = fit_profile(&profile, 7.0, &SimplexConfig::default()).unwrap();
        assert!((fit.center - 6.3).abs() < 1e-3);
        assert!((fit.amplitude - 5.0).abs() < 1e-2);
    }

    #[test]
    fn test_refine_moves_to_source() {
        let cube = source_cube(11.3, 8.8, 24, 18);
        let mask = vec![true; 12];
        let outcome = refine_centroid(
            &cube,
            &mask,
            Position::new(10, 9),
            PixelRadius { rx: 5, ry: 5 },
            &unit_scale(),
            3.0,
            &SimplexConfig::default(),
        )
        .unwrap();

        assert!(outcome.accepted());
        assert_eq!(outcome.position, Position::new(11, 9));
        assert_eq!(outcome.bbox, BoundingBox { x0: 6, x1: 17, y0: 4, y1: 15 });
        let (xc, yc) = outcome.fitted_center.unwrap();
        assert!((xc - 11.3).abs() < 0.15);
        assert!((yc - 8.8).abs() < 0.15);
    }

    #[test]
    fn test_large_shift_rejected() {
        let cube = source_cube(14.0, 10.0, 24, 20);
        let mask = vec![true; 12];
        let start = Position::new(10, 10);
        let outcome = refine_centroid(
            &cube,
            &mask,
            start,
            PixelRadius { rx: 6, ry: 6 },
            &unit_scale(),
            3.0,
            &SimplexConfig::default(),
        )
        .unwrap();

        assert!(!outcome.accepted());
        assert_eq!(outcome.position, start);
        assert_eq!(outcome.bbox, BoundingBox { x0: 4, x1: 17, y0: 4, y1: 17 });
        assert!(matches!(outcome.status, CentroidStatus::ShiftTooLarge { .. }));
    }

    #[test]
    fn test_error_limit_scales_with_pixel_size() {
        let cube = source_cube(12.0, 9.0, 24, 18);
        let mask = vec![true; 12];
        let coarse = PixelScale::new(2.0, 2.0).unwrap();
        let outcome = refine_centroid(
            &cube,
            &mask,
            Position::new(10, 9),
            PixelRadius { rx: 5, ry: 5 },
            &coarse,
            3.0,
            &SimplexConfig::default(),
        )
        .unwrap();
        // Two pixels at 2"/px is 4", over the 3" limit.
        assert!(!outcome.accepted());
        assert_eq!(outcome.position, Position::new(10, 9));
    }

    #[test]
    fn test_edge_position_stays_in_bounds() {
        let cube = source_cube(0.2, 0.4, 10, 10);
        let mask = vec![true; 12];
        let outcome = refine_centroid(
            &cube,
            &mask,
            Position::new(0, 0),
            PixelRadius { rx: 3, ry: 3 },
            &unit_scale(),
            3.0,
            &SimplexConfig::default(),
        )
        .unwrap();
        assert!(outcome.position.x < 10 && outcome.position.y < 10);
        assert!(outcome.bbox.x1 <= 10 && outcome.bbox.y1 <= 10);
    }
}
