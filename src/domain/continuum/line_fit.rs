use ndarray::Array3;
use rayon::prelude::*;
use serde::Serialize;

use super::{
    apply_spaxel_model, record_failure, ContinuumStrategy, FitContext, FitUnit, FittedParams, Mode,
    StrategyOutput,
};
use crate::domain::cube::{extract_spectrum, select_masked};
use crate::domain::progress::{ProgressEvent, ProgressFn};
use crate::error::{ContinuumError, Result};
use crate::utils::least_squares::{least_squares, LsqConfig};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpaxelLine {
    pub x: usize,
    pub y: usize,
    pub slope: f64,
    pub intercept: f64,
}

impl SpaxelLine {
    pub fn evaluate(&self, wavelength: f64) -> f64 {
        self.slope * wavelength + self.intercept
    }
}

/// Fit `flux ≈ slope * W + intercept`; the solver runs on centered wavelengths.
pub fn fit_line(wavelengths: &[f64], flux: &[f64], config: &LsqConfig) -> Result<(f64, f64)> {
    if wavelengths.len() != flux.len() {
        return Err(ContinuumError::Data(format!(
            "{} wavelengths for {} flux samples",
            wavelengths.len(),
            flux.len()
        )));
    }
    if wavelengths.len() < 2 {
        return Err(ContinuumError::fit(
            "line",
            format!("{} usable samples, need at least 2", wavelengths.len()),
        ));
    }

    let n = wavelengths.len() as f64;
    let w_mean = wavelengths.iter().sum::<f64>() / n;
    let f_mean = flux.iter().sum::<f64>() / n;
    let centered: Vec<f64> = wavelengths.iter().map(|w| w - w_mean).collect();

    let residuals = |p: &[f64; 2], out: &mut Vec<f64>| {
        out.extend(
            centered
                .iter()
                .zip(flux)
                .map(|(&u, &f)| f - (p[0] * u + p[1])),
        );
    };

    // LM rather than the centroid simplex: the model is linear in both
    // parameters, so the optimum is the same and LM lands on it exactly.
    let fit = least_squares(residuals, [0.0, f_mean], None, config)?;
    let [slope, offset] = fit.params;
    Ok((slope, offset - slope * w_mean))
}

#[derive(Debug, Clone, Default)]
pub struct LineFit {
    pub lsq: LsqConfig,
}

impl ContinuumStrategy for LineFit {
    fn mode(&self) -> Mode {
        Mode::LineFit
    }

    fn apply(
        &self,
        cube: &mut Array3<f32>,
        model: &mut Array3<f32>,
        ctx: &FitContext<'_>,
        on_event: ProgressFn<'_>,
    ) -> Result<StrategyOutput> {
        let spaxels = ctx.bbox.spaxels();
        on_event(&ProgressEvent::StrategyStarted {
            mode: Mode::LineFit,
            units: spaxels.len(),
        });

        let usable_w = select_masked(ctx.wavelengths, ctx.mask);
        let fits: Vec<((usize, usize), Result<(f64, f64)>)> = {
            let data: &Array3<f32> = cube;
            spaxels
                .par_iter()
                .map(|&(y, x)| {
                    let flux = select_masked(&extract_spectrum(data, y, x), ctx.mask);
                    ((y, x), fit_line(&usable_w, &flux, &self.lsq))
                })
                .collect()
        };

        let mut lines = Vec::with_capacity(fits.len());
        let mut failures = Vec::new();
        for ((y, x), fit) in fits {
            match fit {
                Ok((slope, intercept)) => {
                    let line = SpaxelLine { x, y, slope, intercept };
                    let continuum: Vec<f64> =
                        ctx.wavelengths.iter().map(|&w| line.evaluate(w)).collect();
                    apply_spaxel_model(cube, model, y, x, &continuum);
                    lines.push(line);
                }
                Err(e) => record_failure(&mut failures, FitUnit::Spaxel { x, y }, &e, on_event),
            }
        }

        Ok(StrategyOutput {
            params: FittedParams::LineFit { spaxels: lines },
            failures,
        })
    }
}
