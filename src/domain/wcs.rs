use crate::error::{ContinuumError, Result};
use crate::model::{CubeHeader, PixelRadius};
use crate::utils::constants::ARCSEC_PER_DEGREE;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelScale {
    pub x_arcsec: f64,
    pub y_arcsec: f64,
}

impl PixelScale {
    pub fn new(x_arcsec: f64, y_arcsec: f64) -> Result<Self> {
        for (axis, v) in [("x", x_arcsec), ("y", y_arcsec)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(ContinuumError::Data(format!(
                    "invalid {} pixel scale {} arcsec",
                    axis, v
                )));
            }
        }
        Ok(Self { x_arcsec, y_arcsec })
    }

    pub fn from_header(header: &CubeHeader) -> Result<Self> {
        let crval2 = header.require_f64("CRVAL2")?;
        let cd = read_cd_matrix(header)?;
        let cos_dec = crval2.to_radians().cos();

        let x = ARCSEC_PER_DEGREE * (cos_dec * cd[0][0].powi(2) + cd[1][0].powi(2)).sqrt();
        let y = ARCSEC_PER_DEGREE * (cos_dec * cd[0][1].powi(2) + cd[1][1].powi(2)).sqrt();
        Self::new(x, y)
    }

    /// Box half-width in spaxels for a physical radius in arcsec.
    pub fn pixel_radius(&self, radius_arcsec: f64) -> Result<PixelRadius> {
        if !(radius_arcsec.is_finite() && radius_arcsec >= 0.0) {
            return Err(ContinuumError::Configuration(format!(
                "radius must be a non-negative number of arcsec, got {}",
                radius_arcsec
            )));
        }
        Ok(PixelRadius {
            rx: (radius_arcsec / self.x_arcsec).round() as usize,
            ry: (radius_arcsec / self.y_arcsec).round() as usize,
        })
    }

    pub fn swapped(self) -> Self {
        Self {
            x_arcsec: self.y_arcsec,
            y_arcsec: self.x_arcsec,
        }
    }
}

fn read_cd_matrix(header: &CubeHeader) -> Result<[[f64; 2]; 2]> {
    if let (Some(cd11), Some(cd12), Some(cd21), Some(cd22)) = (
        header.get_f64("CD1_1"),
        header.get_f64("CD1_2"),
        header.get_f64("CD2_1"),
        header.get_f64("CD2_2"),
    ) {
        return Ok([[cd11, cd12], [cd21, cd22]]);
    }

    let cdelt1 = header.require_f64("CDELT1")?;
    let cdelt2 = header.require_f64("CDELT2")?;
    let crota2 = header.get_f64("CROTA2").unwrap_or(0.0);

    let theta = crota2.to_radians();
    let cos_t = theta.cos();
    let sin_t = theta.sin();

    Ok([
        [cdelt1 * cos_t, -cdelt2 * sin_t],
        [cdelt1 * sin_t, cdelt2 * cos_t],
    ])
}
