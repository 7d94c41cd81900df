//! B-spline interpolation for shifting 1D spectra by sub-pixel amounts.
//!
//! `shift(input, s)` returns `out[i] = f(i - s)` where `f` is the
//! interpolating B-spline through `input`. Samples outside the signal are
//! taken from its half-sample reflection (`d c b a | a b c d | d c b a`).

use crate::error::{ContinuumError, Result};

/// Extra reflected samples on each side so that the recursive prefilter's
/// boundary start-up has decayed before the original samples are reached.
const PREFILTER_MARGIN: usize = 32;

fn poles(order: usize) -> Result<&'static [f64]> {
    match order {
        1 => Ok(&[]),
        3 => Ok(&[-0.267_949_192_431_122_7]),
        4 => Ok(&[-0.361_341_225_900_220_2, -0.013_725_429_297_339_121]),
        _ => Err(ContinuumError::Configuration(format!(
            "unsupported spline order {} (expected 1, 3 or 4)",
            order
        ))),
    }
}

/// Centered B-spline basis of the given degree.
fn basis(order: usize, t: f64) -> f64 {
    let a = t.abs();
    match order {
        1 => (1.0 - a).max(0.0),
        3 => {
            if a < 1.0 {
                2.0 / 3.0 - a * a + 0.5 * a * a * a
            } else if a < 2.0 {
                let u = 2.0 - a;
                u * u * u / 6.0
            } else {
                0.0
            }
        }
        4 => {
            if a < 0.5 {
                let a2 = a * a;
                115.0 / 192.0 + a2 * (-5.0 / 8.0 + a2 / 4.0)
            } else if a < 1.5 {
                55.0 / 96.0 + a * (5.0 / 24.0 + a * (-5.0 / 4.0 + a * (5.0 / 6.0 - a / 6.0)))
            } else if a < 2.5 {
                let u = 5.0 - 2.0 * a;
                u * u * u * u / 384.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Half-sample symmetric index folding.
#[inline]
pub fn reflect_index(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let mut k = i.rem_euclid(period);
    if k >= n {
        k = period - 1 - k;
    }
    k as usize
}

/// Convert samples to interpolating B-spline coefficients in place.
fn prefilter(coeffs: &mut [f64], poles: &[f64]) {
    let m = coeffs.len();
    if m < 2 || poles.is_empty() {
        return;
    }

    let gain: f64 = poles.iter().map(|&z| (1.0 - z) * (1.0 - 1.0 / z)).product();
    for c in coeffs.iter_mut() {
        *c *= gain;
    }

    for &z in poles {
        let horizon = ((f64::EPSILON.ln() / z.abs().ln()).ceil() as usize).clamp(1, m);
        let mut zn = 1.0;
        let mut sum = 0.0;
        for c in coeffs.iter().take(horizon) {
            sum += zn * c;
            zn *= z;
        }
        coeffs[0] = sum;

        for k in 1..m {
            coeffs[k] += z * coeffs[k - 1];
        }

        coeffs[m - 1] = (z / (z * z - 1.0)) * (coeffs[m - 1] + z * coeffs[m - 2]);
        for k in (0..m - 1).rev() {
            coeffs[k] = z * (coeffs[k + 1] - coeffs[k]);
        }
    }
}

/// Shift `input` by `shift` samples using a spline of the given order
/// (1, 3 or 4) with reflective boundaries.
pub fn shift(input: &[f64], shift: f64, order: usize) -> Result<Vec<f64>> {
    let poles = poles(order)?;
    let n = input.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    if !shift.is_finite() {
        return Err(ContinuumError::Data(format!("non-finite shift {}", shift)));
    }
    if n == 1 {
        return Ok(vec![input[0]]);
    }

    let pad = shift.abs().ceil() as usize + order + PREFILTER_MARGIN;
    let mut coeffs: Vec<f64> = (0..n + 2 * pad)
        .map(|k| input[reflect_index(k as isize - pad as isize, n)])
        .collect();
    prefilter(&mut coeffs, poles);

    let half_support = (order + 1) as f64 / 2.0;
    let out = (0..n)
        .map(|i| {
            let x = i as f64 - shift + pad as f64;
            let j0 = (x - half_support).ceil() as isize;
            let j1 = (x + half_support).floor() as isize;
            (j0..=j1)
                .filter(|&j| j >= 0 && (j as usize) < coeffs.len())
                .map(|j| coeffs[j as usize] * basis(order, x - j as f64))
                .sum()
        })
        .collect();

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basis_partition_of_unity() {
        for &order in &[1usize, 3, 4] {
            for step in 0..10 {
                let t = step as f64 * 0.1;
                let total: f64 = (-4..=4).map(|k| basis(order, t - k as f64)).sum();
                assert!((total - 1.0).abs() < 1e-12, "order {} t {}", order, t);
            }
        }
    }

    #[test]
    fn test_reflect_index() {
        let folded: Vec<usize> = (-4..8).map(|i| reflect_index(i, 4)).collect();
        assert_eq!(folded, vec![3, 2, 1, 0, 0, 1, 2, 3, 3, 2, 1, 0]);
    }

    #[test]
    fn test_zero_shift_interpolates() {
        let input: Vec<f64> = (0..40).map(|i| ((i as f64) * 0.37).sin() * 5.0 + i as f64).collect();
        for &order in &[1usize, 3, 4] {
            let out = shift(&input, 0.0, order).unwrap();
            for (a, b) in input.iter().zip(out.iter()) {
                assert!((a - b).abs() < 1e-9, "order {}", order);
            }
        }
    }

    #[test]
    fn test_integer_shift_moves_samples() {
        let input: Vec<f64> = (0..30).map(|i| (i * i) as f64 * 0.1).collect();
        let out = shift(&input, 2.0, 4).unwrap();
        for i in 2..30 {
            assert!((out[i] - input[i - 2]).abs() < 1e-8);
        }
        // Reflected boundary: out[0] = f(-2) = input[1], out[1] = f(-1) = input[0].
        assert!((out[0] - input[1]).abs() < 1e-8);
        assert!((out[1] - input[0]).abs() < 1e-8);
    }

    #[test]
    fn test_subpixel_shift_of_smooth_signal() {
        let f = |x: f64| (x * 0.15).sin() + 0.5 * (x * 0.05).cos();
        let input: Vec<f64> = (0..120).map(|i| f(i as f64)).collect();
        let out = shift(&input, 0.4, 4).unwrap();
        for i in 10..110 {
            assert!((out[i] - f(i as f64 - 0.4)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_constant_signal_invariant() {
        let input = vec![3.5; 25];
        let out = shift(&input, -4.3, 4).unwrap();
        assert!(out.iter().all(|v| (v - 3.5).abs() < 1e-10));
    }

    #[test]
    fn test_unsupported_order() {
        assert!(matches!(
            shift(&[1.0, 2.0], 0.5, 2),
            Err(ContinuumError::Configuration(_))
        ));
    }
}
