use serde::Serialize;

use crate::error::{ContinuumError, Result};
use crate::utils::least_squares::{least_squares, Bounds, LsqConfig};
use crate::utils::signal::{correlate_full, gaussian_filter1d, nan_argmax};
use crate::utils::spline;

/// Coarse shift estimate, in pixels, from the peak of the smoothed full
/// cross-correlation. Half the peak lag, as the fit refines it anyway.
pub fn correlation_shift_guess(target: &[f64], reference: &[f64], smoothing_sigma: f64) -> Option<f64> {
    let corr = correlate_full(target, reference);
    if corr.is_empty() {
        return None;
    }
    let smoothed = gaussian_filter1d(&corr, smoothing_sigma);
    let peak = nan_argmax(&smoothed)?;
    let center = (smoothed.len() / 2) as f64;
    Some((peak as f64 - center) / 2.0)
}

pub fn amplitude_guess(target: &[f64], reference: &[f64]) -> f64 {
    let peak = |v: &[f64]| v.iter().copied().filter(|x| x.is_finite()).fold(f64::NEG_INFINITY, f64::max);
    let (t, r) = (peak(target), peak(reference));
    if r > 0.0 && t.is_finite() {
        t / r
    } else {
        1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlignFit {
    pub amplitude: f64,
    pub shift: f64,
    pub cost: f64,
}

#[derive(Debug, Clone)]
pub struct AlignParams {
    pub bounds: Bounds<2>,
    pub trim: usize,
    pub spline_order: usize,
}

/// Fit `target ≈ A * shift(reference, dw)` with `(A, dw)` inside `params.bounds`.
pub fn fit_amplitude_shift(
    target: &[f64],
    reference: &[f64],
    seed: (f64, f64),
    params: &AlignParams,
    config: &LsqConfig,
) -> Result<AlignFit> {
    if target.len() != reference.len() {
        return Err(ContinuumError::Data(format!(
            "target has {} samples, reference {}",
            target.len(),
            reference.len()
        )));
    }
    let n = target.len();
    if n <= 2 * params.trim {
        return Err(ContinuumError::fit(
            "alignment",
            format!("{} samples cannot be trimmed by {} on each side", n, params.trim),
        ));
    }
    // Surfaces an unsupported spline order before the optimizer runs.
    spline::shift(reference, 0.0, params.spline_order)?;

    let window = params.trim..n - params.trim;
    let residuals = |p: &[f64; 2], out: &mut Vec<f64>| match spline::shift(reference, p[1], params.spline_order) {
        Ok(shifted) => out.extend(
            target[window.clone()]
                .iter()
                .zip(&shifted[window.clone()])
                .map(|(t, s)| t - p[0] * s),
        ),
        Err(_) => out.extend(std::iter::repeat(f64::NAN).take(window.len())),
    };

    let fit = least_squares(residuals, [seed.0, seed.1], Some(&params.bounds), config)?;
    Ok(AlignFit {
        amplitude: fit.params[0],
        shift: fit.params[1],
        cost: fit.cost,
    })
}
