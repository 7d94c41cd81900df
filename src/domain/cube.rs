use ndarray::{s, Array2, Array3, ArrayView3, Axis};

use crate::error::{ContinuumError, Result};
use crate::model::{BoundingBox, CubeHeader};

pub fn extract_spectrum(cube: &Array3<f32>, y: usize, x: usize) -> Vec<f64> {
    cube.slice(s![.., y, x]).iter().map(|&v| v as f64).collect()
}

pub fn select_masked(values: &[f64], mask: &[bool]) -> Vec<f64> {
    values
        .iter()
        .zip(mask.iter())
        .filter(|(_, &m)| m)
        .map(|(&v, _)| v)
        .collect()
}

/// `W[i] = CRVAL3 + CD3_3 * (i - CRPIX3)`; `CDELT3` stands in for a missing `CD3_3`.
pub fn build_wavelength_axis(header: &CubeHeader, depth: usize) -> Result<Vec<f64>> {
    let crval3 = header.require_f64("CRVAL3")?;
    let step = header
        .get_f64("CD3_3")
        .or_else(|| header.get_f64("CDELT3"))
        .ok_or_else(|| ContinuumError::MissingHeaderKey("CD3_3".into()))?;
    let crpix3 = header.get_f64("CRPIX3").unwrap_or(1.0);

    Ok((0..depth)
        .map(|i| crval3 + step * (i as f64 - crpix3))
        .collect())
}

pub fn sub_cube<'a>(cube: &'a Array3<f32>, bbox: &BoundingBox) -> ArrayView3<'a, f32> {
    cube.slice(s![.., bbox.y0..bbox.y1, bbox.x0..bbox.x1])
}

pub fn white_light_image(cube: &Array3<f32>, mask: &[bool], bbox: &BoundingBox) -> Array2<f64> {
    let sub = sub_cube(cube, bbox);
    let mut img = Array2::<f64>::zeros((bbox.height(), bbox.width()));
    for (slice, _) in sub
        .axis_iter(Axis(0))
        .zip(mask.iter())
        .filter(|(_, &m)| m)
    {
        img.zip_mut_with(&slice, |acc, &v| *acc += v as f64);
    }
    img
}

pub fn collapse_mean_masked(
    cube: &Array3<f32>,
    mask: &[bool],
    bbox: &BoundingBox,
) -> Result<Array2<f64>> {
    let used = mask.iter().filter(|&&m| m).count();
    if used == 0 {
        return Err(ContinuumError::Data(
            "wavelength mask excludes every slice".into(),
        ));
    }
    let img = white_light_image(cube, mask, bbox);
    Ok(img / used as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_cube() -> Array3<f32> {
        Array3::from_shape_fn((4, 3, 5), |(w, y, x)| (100 * w + 10 * y + x) as f32)
    }

    #[test]
    fn test_wavelength_axis() {
        let h = CubeHeader::from_pairs([("CRVAL3", "4000"), ("CD3_3", "0.5"), ("CRPIX3", "2")]);
        let w = build_wavelength_axis(&h, 4).unwrap();
        assert_eq!(w, vec![3999.0, 3999.5, 4000.0, 4000.5]);
    }

    #[test]
    fn test_wavelength_axis_cdelt_fallback() {
        let h = CubeHeader::from_pairs([("CRVAL3", "5000"), ("CDELT3", "2.0"), ("CRPIX3", "0")]);
        let w = build_wavelength_axis(&h, 3).unwrap();
        assert_eq!(w, vec![5000.0, 5002.0, 5004.0]);

        let h = CubeHeader::from_pairs([("CRVAL3", "5000")]);
        assert!(build_wavelength_axis(&h, 3).is_err());
    }

    #[test]
    fn test_extract_spectrum() {
        let cube = ramp_cube();
        assert_eq!(extract_spectrum(&cube, 2, 1), vec![21.0, 121.0, 221.0, 321.0]);
    }

    #[test]
    fn test_white_light_uses_mask_and_box() {
        let cube = ramp_cube();
        let mask = [true, false, true, false];
        let bbox = BoundingBox { x0: 1, x1: 3, y0: 0, y1: 2 };
        let img = white_light_image(&cube, &mask, &bbox);
        assert_eq!(img.dim(), (2, 2));
        // slices 0 and 2 at (y=1, x=2): 12 + 212
        assert!((img[[1, 1]] - 224.0).abs() < 1e-9);

        let mean = collapse_mean_masked(&cube, &mask, &bbox).unwrap();
        assert!((mean[[1, 1]] - 112.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_mask_is_data_error() {
        let cube = ramp_cube();
        let bbox = BoundingBox { x0: 0, x1: 5, y0: 0, y1: 3 };
        assert!(matches!(
            collapse_mean_masked(&cube, &[false; 4], &bbox),
            Err(ContinuumError::Data(_))
        ));
    }

    #[test]
    fn test_select_masked() {
        assert_eq!(select_masked(&[1.0, 2.0, 3.0], &[true, false, true]), vec![1.0, 3.0]);
    }
}
