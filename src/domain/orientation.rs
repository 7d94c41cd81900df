use std::fmt;
use std::str::FromStr;

use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::domain::wcs::PixelScale;
use crate::error::ContinuumError;
use crate::model::{BoundingBox, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Instrument {
    #[default]
    #[serde(rename = "PCWI")]
    Pcwi,
    #[serde(rename = "KCWI")]
    Kcwi,
}

impl Instrument {
    /// KCWI stores the in-slice direction along the other spatial axis.
    pub fn requires_rotation(self) -> bool {
        matches!(self, Instrument::Kcwi)
    }
}

impl FromStr for Instrument {
    type Err = ContinuumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PCWI" => Ok(Instrument::Pcwi),
            "KCWI" => Ok(Instrument::Kcwi),
            other => Err(ContinuumError::Configuration(format!(
                "unrecognized instrument '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instrument::Pcwi => write!(f, "PCWI"),
            Instrument::Kcwi => write!(f, "KCWI"),
        }
    }
}

/// Rotate every wavelength slice of a `(w, y, x)` cube by `k` quarter turns
/// counter-clockwise.
pub fn rot90_slices(cube: &Array3<f32>, k: u32) -> Array3<f32> {
    match k % 4 {
        0 => cube.clone(),
        1 => {
            let mut v = cube.view().permuted_axes([0, 2, 1]);
            v.invert_axis(Axis(1));
            v.as_standard_layout().into_owned()
        }
        2 => {
            let mut v = cube.view();
            v.invert_axis(Axis(1));
            v.invert_axis(Axis(2));
            v.as_standard_layout().into_owned()
        }
        _ => {
            let mut v = cube.view().permuted_axes([0, 2, 1]);
            v.invert_axis(Axis(2));
            v.as_standard_layout().into_owned()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FrameNormalizer {
    rotate: bool,
    width: usize,
}

impl FrameNormalizer {
    pub fn new(instrument: Instrument, cube: &Array3<f32>) -> Self {
        Self {
            rotate: instrument.requires_rotation(),
            width: cube.dim().2,
        }
    }

    pub fn is_identity(&self) -> bool {
        !self.rotate
    }

    pub fn forward_cube(&self, cube: Array3<f32>) -> Array3<f32> {
        if self.rotate {
            rot90_slices(&cube, 1)
        } else {
            cube
        }
    }

    pub fn inverse_cube(&self, cube: Array3<f32>) -> Array3<f32> {
        if self.rotate {
            rot90_slices(&cube, 3)
        } else {
            cube
        }
    }

    /// Storage `(x, y)` lands at `(y, width - 1 - x)` after one quarter turn.
    pub fn forward_position(&self, pos: Position) -> Position {
        if self.rotate {
            Position::new(pos.y, self.width - 1 - pos.x)
        } else {
            pos
        }
    }

    pub fn inverse_position(&self, pos: Position) -> Position {
        if self.rotate {
            Position::new(self.width - 1 - pos.y, pos.x)
        } else {
            pos
        }
    }

    /// Sub-pixel counterpart of [`Self::inverse_position`].
    pub fn inverse_point(&self, (x, y): (f64, f64)) -> (f64, f64) {
        if self.rotate {
            ((self.width - 1) as f64 - y, x)
        } else {
            (x, y)
        }
    }

    pub fn inverse_box(&self, bbox: BoundingBox) -> BoundingBox {
        if self.rotate {
            BoundingBox {
                x0: self.width - bbox.y1,
                x1: self.width - bbox.y0,
                y0: bbox.x0,
                y1: bbox.x1,
            }
        } else {
            bbox
        }
    }

    pub fn forward_scale(&self, scale: PixelScale) -> PixelScale {
        if self.rotate {
            scale.swapped()
        } else {
            scale
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cube() -> Array3<f32> {
        Array3::from_shape_fn((3, 4, 6), |(w, y, x)| (w * 1000 + y * 10 + x) as f32 * 0.5)
    }

    #[test]
    fn test_rot90_matches_quarter_turn() {
        let cube = Array3::from_shape_vec((1, 2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let r1 = rot90_slices(&cube, 1);
        assert_eq!(r1.iter().copied().collect::<Vec<_>>(), vec![2.0, 4.0, 1.0, 3.0]);
        let r3 = rot90_slices(&cube, 3);
        assert_eq!(r3.iter().copied().collect::<Vec<_>>(), vec![3.0, 1.0, 4.0, 2.0]);
    }

    #[test]
    fn test_rotation_round_trip_exact() {
        let cube = sample_cube();
        let rotated = rot90_slices(&cube, 1);
        assert_eq!(rotated.dim(), (3, 6, 4));
        assert_eq!(rot90_slices(&rotated, 3), cube);
        assert_eq!(rot90_slices(&rot90_slices(&cube, 2), 2), cube);
    }

    #[test]
    fn test_normalizer_round_trip() {
        let cube = sample_cube();
        let norm = FrameNormalizer::new(Instrument::Kcwi, &cube);
        assert!(!norm.is_identity());
        let back = norm.inverse_cube(norm.forward_cube(cube.clone()));
        assert_eq!(back, cube);
    }

    #[test]
    fn test_position_follows_pixel() {
        let cube = sample_cube();
        let norm = FrameNormalizer::new(Instrument::Kcwi, &cube);
        let rotated = norm.forward_cube(cube.clone());
        let pos = Position::new(5, 1);
        let p = norm.forward_position(pos);
        assert_eq!(rotated[[2, p.y, p.x]], cube[[2, pos.y, pos.x]]);
        assert_eq!(norm.inverse_position(p), pos);
    }

    #[test]
    fn test_box_follows_pixels() {
        let cube = sample_cube();
        let norm = FrameNormalizer::new(Instrument::Kcwi, &cube);
        let bbox = BoundingBox { x0: 1, x1: 3, y0: 2, y1: 5 };
        let back = norm.inverse_box(bbox);
        for y in bbox.y0..bbox.y1 {
            for x in bbox.x0..bbox.x1 {
                let p = norm.inverse_position(Position::new(x, y));
                assert!(back.contains(p.x, p.y));
            }
        }
        assert_eq!(back.width() * back.height(), bbox.width() * bbox.height());
        assert_eq!(norm.inverse_point((2.0, 3.0)), (2.0, 2.0));
    }

    #[test]
    fn test_pcwi_is_identity() {
        let cube = sample_cube();
        let norm = FrameNormalizer::new(Instrument::Pcwi, &cube);
        assert!(norm.is_identity());
        assert_eq!(norm.forward_cube(cube.clone()), cube);
        assert_eq!(norm.forward_position(Position::new(2, 3)), Position::new(2, 3));
    }

    #[test]
    fn test_instrument_parsing() {
        assert_eq!("kcwi".parse::<Instrument>().unwrap(), Instrument::Kcwi);
        assert_eq!(" PCWI ".parse::<Instrument>().unwrap(), Instrument::Pcwi);
        assert!(matches!(
            "MUSE".parse::<Instrument>(),
            Err(ContinuumError::Configuration(_))
        ));
    }
}
