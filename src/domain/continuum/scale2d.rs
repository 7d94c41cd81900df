use ndarray::{s, Array2, Array3, ArrayView2, Axis, Zip};
use rayon::prelude::*;
use serde::Serialize;

use super::{
    record_failure, ContinuumStrategy, FitContext, FitUnit, FittedParams, Mode, StrategyOutput,
};
use crate::domain::cube::{collapse_mean_masked, sub_cube};
use crate::domain::progress::{ProgressEvent, ProgressFn};
use crate::error::{ContinuumError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SliceScale {
    pub index: usize,
    pub initial_guess: f64,
    pub factor: f64,
}

/// `factor * template ≈ slice`; an all-zero template gives zero.
pub fn fit_scale(template: &Array2<f64>, slice: ArrayView2<'_, f32>) -> Result<f64> {
    let mut tt = 0.0;
    let mut ts = 0.0;
    Zip::from(template).and(&slice).for_each(|&t, &v| {
        tt += t * t;
        ts += t * v as f64;
    });

    if tt == 0.0 {
        return Ok(0.0);
    }
    let factor = ts / tt;
    if !factor.is_finite() {
        return Err(ContinuumError::fit(
            "scale",
            format!("non-finite scale factor ({} / {})", ts, tt),
        ));
    }
    Ok(factor)
}

fn initial_guess(template_sum: f64, slice: ArrayView2<'_, f32>) -> f64 {
    if template_sum == 0.0 || !template_sum.is_finite() {
        return 0.0;
    }
    let slice_sum: f64 = slice.iter().map(|&v| v as f64).sum();
    (slice_sum / template_sum).max(0.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Scale2D;

impl ContinuumStrategy for Scale2D {
    fn mode(&self) -> Mode {
        Mode::Scale2D
    }

    fn apply(
        &self,
        cube: &mut Array3<f32>,
        model: &mut Array3<f32>,
        ctx: &FitContext<'_>,
        on_event: ProgressFn<'_>,
    ) -> Result<StrategyOutput> {
        let bbox = ctx.bbox;
        let template = collapse_mean_masked(cube, ctx.mask, &bbox)?;
        let template_sum = template.sum();
        let depth = cube.dim().0;

        on_event(&ProgressEvent::StrategyStarted {
            mode: Mode::Scale2D,
            units: depth,
        });

        let fits: Vec<(usize, f64, Result<f64>)> = {
            let sub = sub_cube(cube, &bbox);
            sub.axis_iter(Axis(0))
                .into_par_iter()
                .enumerate()
                .map(|(i, slice)| (i, initial_guess(template_sum, slice), fit_scale(&template, slice)))
                .collect()
        };

        let mut slices = Vec::with_capacity(depth);
        let mut failures = Vec::new();
        for (index, guess, fit) in fits {
            let factor = match fit {
                Ok(f) => f,
                Err(e) => {
                    record_failure(&mut failures, FitUnit::Slice { index }, &e, on_event);
                    continue;
                }
            };

            let region = s![index, bbox.y0..bbox.y1, bbox.x0..bbox.x1];
            Zip::from(cube.slice_mut(region))
                .and(model.slice_mut(region))
                .and(&template)
                .for_each(|c, m, &t| {
                    let v = (factor * t) as f32;
                    *c -= v;
                    *m += v;
                });

            slices.push(SliceScale {
                index,
                initial_guess: guess,
                factor,
            });
        }

        Ok(StrategyOutput {
            params: FittedParams::Scale2D { slices },
            failures,
        })
    }
}
