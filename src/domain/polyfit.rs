use ndarray::{s, Array3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::continuum::{FitUnit, UnitFailure};
use crate::domain::cube::extract_spectrum;
use crate::domain::orientation::Instrument;
use crate::error::{ContinuumError, Result};
use crate::utils::linear_solver::solve_dynamic;

/// `end` is exclusive and counts from the back when negative, so the
/// default `-1` leaves out the last sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolynomialFit {
    pub degree: usize,
    pub start: usize,
    pub end: isize,
}

impl Default for PolynomialFit {
    fn default() -> Self {
        Self {
            degree: 5,
            start: 0,
            end: -1,
        }
    }
}

impl PolynomialFit {
    pub fn index_range(&self, depth: usize) -> Result<(usize, usize)> {
        let end = if self.end < 0 {
            depth as isize + self.end
        } else {
            self.end.min(depth as isize)
        };
        if end <= self.start as isize {
            return Err(ContinuumError::Configuration(format!(
                "empty wavelength range [{}, {}) on an axis of {}",
                self.start, self.end, depth
            )));
        }
        let end = end as usize;
        if end - self.start < self.degree + 1 {
            return Err(ContinuumError::Configuration(format!(
                "{} samples cannot constrain a degree {} polynomial",
                end - self.start,
                self.degree
            )));
        }
        Ok((self.start, end))
    }
}

fn design_matrix(len: usize, degree: usize) -> Vec<Vec<f64>> {
    let half = (len.max(2) - 1) as f64 / 2.0;
    (0..len)
        .map(|i| {
            let u = (i as f64 - half) / half;
            let mut row = Vec::with_capacity(degree + 1);
            let mut p = 1.0;
            for _ in 0..=degree {
                row.push(p);
                p *= u;
            }
            row
        })
        .collect()
}

fn normal_matrix(design: &[Vec<f64>], terms: usize) -> Vec<Vec<f64>> {
    let mut ata = vec![vec![0.0; terms]; terms];
    for row in design {
        for i in 0..terms {
            for j in i..terms {
                ata[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..terms {
        for j in 0..i {
            ata[i][j] = ata[j][i];
        }
    }
    ata
}

#[derive(Debug, Clone)]
pub struct PolynomialModel {
    pub model: Array3<f32>,
    pub failures: Vec<UnitFailure>,
}

fn fit_spaxel(
    window: &[f64],
    design: &[Vec<f64>],
    ata: &[Vec<f64>],
    unit: FitUnit,
) -> Result<Vec<f64>> {
    if let Some(k) = window.iter().position(|v| !v.is_finite()) {
        return Err(ContinuumError::Data(format!(
            "{}: non-finite flux at window sample {}",
            unit, k
        )));
    }

    let mut atb = vec![0.0; ata.len()];
    for (row, &v) in design.iter().zip(window) {
        for (acc, &d) in atb.iter_mut().zip(row) {
            *acc += d * v;
        }
    }
    let coeffs = solve_dynamic(ata, &atb).ok_or_else(|| {
        ContinuumError::fit(unit.to_string(), "singular polynomial normal equations")
    })?;

    Ok(design
        .iter()
        .map(|row| row.iter().zip(&coeffs).map(|(d, c)| d * c).sum::<f64>())
        .collect())
}

/// Model is zero outside the fitted range and at spaxels listed in `failures`.
/// The instrument only shows up in the log.
pub fn fit_polynomial_continuum(
    cube: &Array3<f32>,
    params: &PolynomialFit,
    instrument: Instrument,
) -> Result<PolynomialModel> {
    let (depth, height, width) = cube.dim();
    let (w0, w1) = params.index_range(depth)?;
    let terms = params.degree + 1;
    log::info!(
        "polynomial continuum (degree {}) over slices [{}, {}) for {} cube {}x{}",
        params.degree,
        w0,
        w1,
        instrument,
        width,
        height
    );

    let design = design_matrix(w1 - w0, params.degree);
    let ata = normal_matrix(&design, terms);

    let fits: Vec<((usize, usize), Result<Vec<f64>>)> = (0..height * width)
        .into_par_iter()
        .map(|idx| {
            let (y, x) = (idx / width, idx % width);
            let spectrum = extract_spectrum(cube, y, x);
            let fit = fit_spaxel(&spectrum[w0..w1], &design, &ata, FitUnit::Spaxel { x, y });
            ((y, x), fit)
        })
        .collect();

    let mut model = Array3::<f32>::zeros(cube.dim());
    let mut failures = Vec::new();
    for ((y, x), fit) in fits {
        let values = match fit {
            Ok(v) => v,
            Err(e) => {
                let unit = FitUnit::Spaxel { x, y };
                log::warn!("polynomial fit skipped {}: {}", unit, e);
                failures.push(UnitFailure {
                    unit,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let mut column = model.slice_mut(s![w0..w1, y, x]);
        for (m, v) in column.iter_mut().zip(values) {
            *m = v as f32;
        }
    }
    Ok(PolynomialModel { model, failures })
}
