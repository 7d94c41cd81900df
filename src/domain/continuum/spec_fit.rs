use ndarray::Array3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    apply_spaxel_model, record_failure, ContinuumStrategy, FitContext, FitUnit, FittedParams, Mode,
    StrategyOutput,
};
use crate::domain::cube::{extract_spectrum, select_masked};
use crate::domain::progress::{ProgressEvent, ProgressFn};
use crate::domain::xcorr::{
    amplitude_guess, correlation_shift_guess, fit_amplitude_shift, AlignFit, AlignParams,
};
use crate::error::{ContinuumError, Result};
use crate::utils::least_squares::{Bounds, LsqConfig};
use crate::utils::spline;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecFitConfig {
    /// Samples dropped from each end of the row-seed residual.
    pub trim: usize,
    pub smoothing_sigma: f64,
    pub row_amplitude_max: f64,
    pub spaxel_amplitude_max: f64,
    /// Symmetric bound on the wavelength shift, in pixels.
    pub shift_max: f64,
    pub spline_order: usize,
    pub source_row_amplitude: f64,
}

impl Default for SpecFitConfig {
    fn default() -> Self {
        Self {
            trim: 10,
            smoothing_sigma: 5.0,
            row_amplitude_max: 5.1,
            spaxel_amplitude_max: 20.0,
            shift_max: 5.0,
            spline_order: 4,
            source_row_amplitude: 0.5,
        }
    }
}

impl SpecFitConfig {
    pub fn validate(&self) -> Result<()> {
        let bounds_ok = self.row_amplitude_max >= 0.0
            && self.spaxel_amplitude_max >= 0.0
            && self.shift_max >= 0.0;
        if !bounds_ok {
            return Err(ContinuumError::Configuration(format!(
                "spectrum-fit bounds must be non-negative (row A <= {}, spaxel A <= {}, |dw| <= {})",
                self.row_amplitude_max, self.spaxel_amplitude_max, self.shift_max
            )));
        }
        if !(self.smoothing_sigma >= 0.0) {
            return Err(ContinuumError::Configuration(format!(
                "smoothing sigma must be non-negative, got {}",
                self.smoothing_sigma
            )));
        }
        Ok(())
    }

    fn row_params(&self) -> AlignParams {
        AlignParams {
            bounds: Bounds::new([0.0, -self.shift_max], [self.row_amplitude_max, self.shift_max]),
            trim: self.trim,
            spline_order: self.spline_order,
        }
    }

    fn spaxel_params(&self) -> AlignParams {
        AlignParams {
            bounds: Bounds::new(
                [0.0, -self.shift_max],
                [self.spaxel_amplitude_max, self.shift_max],
            ),
            trim: 0,
            spline_order: self.spline_order,
        }
    }
}

/// Starting `(A, dw)` shared by every spaxel of one row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RowSeed {
    pub y: usize,
    pub amplitude: f64,
    pub shift: f64,
    /// False when the seed is the source-row default or a failed fit's guess.
    pub fitted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpaxelAlignment {
    pub x: usize,
    pub y: usize,
    pub amplitude: f64,
    pub shift: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SpecFit {
    pub config: SpecFitConfig,
    pub lsq: LsqConfig,
}

impl SpecFit {
    pub fn new(config: SpecFitConfig) -> Self {
        Self {
            config,
            lsq: LsqConfig::default(),
        }
    }

    /// Clamped `(A, dw)` starting point from the unmasked spectra. Masking can
    /// hide the features the correlation peak depends on.
    fn row_guess(&self, target_full: &[f64], reference_full: &[f64]) -> [f64; 2] {
        let cfg = &self.config;
        let mut guess = [
            amplitude_guess(target_full, reference_full),
            correlation_shift_guess(target_full, reference_full, cfg.smoothing_sigma).unwrap_or(0.0),
        ];
        cfg.row_params().bounds.clamp(&mut guess);
        guess
    }

    fn row_seed(
        &self,
        y: usize,
        source_y: usize,
        full: (&[f64], &[f64]),
        masked: (&[f64], &[f64]),
    ) -> (RowSeed, Option<ContinuumError>) {
        let cfg = &self.config;
        if y == source_y {
            let seed = RowSeed {
                y,
                amplitude: cfg.source_row_amplitude,
                shift: 0.0,
                fitted: false,
            };
            return (seed, None);
        }

        let params = cfg.row_params();
        let guess = self.row_guess(full.0, full.1);
        let (target, reference) = masked;

        match fit_amplitude_shift(target, reference, (guess[0], guess[1]), &params, &self.lsq) {
            Ok(fit) => (
                RowSeed {
                    y,
                    amplitude: fit.amplitude,
                    shift: fit.shift,
                    fitted: true,
                },
                None,
            ),
            Err(e) => (
                RowSeed {
                    y,
                    amplitude: guess[0],
                    shift: guess[1],
                    fitted: false,
                },
                Some(e),
            ),
        }
    }
}

impl ContinuumStrategy for SpecFit {
    fn mode(&self) -> Mode {
        Mode::SpecFit
    }

    fn apply(
        &self,
        cube: &mut Array3<f32>,
        model: &mut Array3<f32>,
        ctx: &FitContext<'_>,
        on_event: ProgressFn<'_>,
    ) -> Result<StrategyOutput> {
        let cfg = &self.config;
        let bbox = ctx.bbox;
        let source = ctx.position;
        cfg.validate()?;

        let reference_full = extract_spectrum(cube, source.y, source.x);
        let reference = select_masked(&reference_full, ctx.mask);
        // Rejects an unsupported spline order for the whole call.
        spline::shift(&reference_full, 0.0, cfg.spline_order)?;

        on_event(&ProgressEvent::StrategyStarted {
            mode: Mode::SpecFit,
            units: bbox.width() * bbox.height(),
        });

        let mut failures = Vec::new();
        let mut rows = Vec::with_capacity(bbox.height());
        for y in bbox.y0..bbox.y1 {
            on_event(&ProgressEvent::RowStarted { row: y });
            let target_full = extract_spectrum(cube, y, source.x);
            let target = select_masked(&target_full, ctx.mask);
            let (seed, err) = self.row_seed(
                y,
                source.y,
                (&target_full, &reference_full),
                (&target, &reference),
            );
            if let Some(e) = err {
                record_failure(&mut failures, FitUnit::Row { y }, &e, on_event);
            }
            log::debug!(
                "row {} seed A={:.4} dw={:.4} (fitted: {})",
                y,
                seed.amplitude,
                seed.shift,
                seed.fitted
            );
            rows.push(seed);
        }

        let spaxel_params = cfg.spaxel_params();
        let fits: Vec<((usize, usize), Result<AlignFit>)> = {
            let data: &Array3<f32> = cube;
            let rows = &rows;
            bbox.spaxels()
                .into_par_iter()
                .map(|(y, x)| {
                    let seed = &rows[y - bbox.y0];
                    let mut start = [seed.amplitude, seed.shift];
                    spaxel_params.bounds.clamp(&mut start);
                    let target = select_masked(&extract_spectrum(data, y, x), ctx.mask);
                    let fit = fit_amplitude_shift(
                        &target,
                        &reference,
                        (start[0], start[1]),
                        &spaxel_params,
                        &self.lsq,
                    );
                    ((y, x), fit)
                })
                .collect()
        };

        let mut spaxels = Vec::with_capacity(fits.len());
        for ((y, x), fit) in fits {
            let fit = match fit {
                Ok(f) => f,
                Err(e) => {
                    record_failure(&mut failures, FitUnit::Spaxel { x, y }, &e, on_event);
                    continue;
                }
            };
            let shifted = spline::shift(&reference_full, fit.shift, cfg.spline_order)?;
            let continuum: Vec<f64> = shifted.iter().map(|v| fit.amplitude * v).collect();
            apply_spaxel_model(cube, model, y, x, &continuum);
            spaxels.push(SpaxelAlignment {
                x,
                y,
                amplitude: fit.amplitude,
                shift: fit.shift,
                cost: fit.cost,
            });
        }

        Ok(StrategyOutput {
            params: FittedParams::SpecFit { rows, spaxels },
            failures,
        })
    }
}
