use serde::{Deserialize, Serialize};

use crate::error::{ContinuumError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Rounds a sub-pixel estimate to the nearest spaxel inside `[0, width) x [0, height)`.
    pub fn rounded_clamped(x: f64, y: f64, width: usize, height: usize) -> Self {
        let clamp = |v: f64, n: usize| -> usize {
            let max = n.saturating_sub(1) as f64;
            let r = v.round();
            if !r.is_finite() || r < 0.0 {
                0
            } else {
                r.min(max) as usize
            }
        };
        Self {
            x: clamp(x, width),
            y: clamp(y, height),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRadius {
    pub rx: usize,
    pub ry: usize,
}

/// Half-open spatial window `[x0, x1) x [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
}

impl BoundingBox {
    pub fn around(
        pos: Position,
        radius: PixelRadius,
        width: usize,
        height: usize,
    ) -> Result<Self> {
        if pos.x >= width || pos.y >= height {
            return Err(ContinuumError::Geometry(format!(
                "position ({}, {}) outside spatial extent {}x{}",
                pos.x, pos.y, width, height
            )));
        }

        let bbox = Self {
            x0: pos.x.saturating_sub(radius.rx),
            x1: pos.x.saturating_add(radius.rx).saturating_add(1).min(width),
            y0: pos.y.saturating_sub(radius.ry),
            y1: pos.y.saturating_add(radius.ry).saturating_add(1).min(height),
        };

        if bbox.width() == 0 || bbox.height() == 0 {
            return Err(ContinuumError::Geometry(format!(
                "degenerate bounding box {:?}",
                bbox
            )));
        }
        Ok(bbox)
    }

    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    pub fn spaxels(&self) -> Vec<(usize, usize)> {
        (self.y0..self.y1)
            .flat_map(|y| (self.x0..self.x1).map(move |x| (y, x)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_interior() {
        let b = BoundingBox::around(Position::new(10, 8), PixelRadius { rx: 3, ry: 2 }, 30, 20)
            .unwrap();
        assert_eq!(b, BoundingBox { x0: 7, x1: 14, y0: 6, y1: 11 });
        assert_eq!(b.width(), 7);
        assert_eq!(b.height(), 5);
    }

    #[test]
    fn test_box_clamped_at_edges() {
        let radius = PixelRadius { rx: 4, ry: 4 };
        for &(x, y) in &[(0, 0), (9, 0), (0, 6), (9, 6)] {
            let b = BoundingBox::around(Position::new(x, y), radius, 10, 7).unwrap();
            assert!(b.x1 <= 10 && b.y1 <= 7);
            assert!(b.x0 < b.x1 && b.y0 < b.y1);
            assert!(b.contains(x, y));
        }
    }

    #[test]
    fn test_huge_radius_covers_extent() {
        let radius = PixelRadius { rx: usize::MAX, ry: usize::MAX };
        let b = BoundingBox::around(Position::new(3, 2), radius, 10, 7).unwrap();
        assert_eq!(b, BoundingBox { x0: 0, x1: 10, y0: 0, y1: 7 });
    }

    #[test]
    fn test_box_rejects_outside_position() {
        let radius = PixelRadius { rx: 1, ry: 1 };
        let err = BoundingBox::around(Position::new(10, 0), radius, 10, 10).unwrap_err();
        assert!(matches!(err, ContinuumError::Geometry(_)));
    }

    #[test]
    fn test_rounded_clamped() {
        assert_eq!(Position::rounded_clamped(-2.4, 3.6, 10, 10), Position::new(0, 4));
        assert_eq!(Position::rounded_clamped(12.0, 9.4, 10, 10), Position::new(9, 9));
        assert_eq!(Position::rounded_clamped(f64::NAN, 1.0, 10, 10), Position::new(0, 1));
    }

    #[test]
    fn test_spaxel_order() {
        let b = BoundingBox { x0: 1, x1: 3, y0: 4, y1: 6 };
        assert_eq!(b.spaxels(), vec![(4, 1), (4, 2), (5, 1), (5, 2)]);
    }
}
