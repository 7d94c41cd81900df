//! Levenberg-Marquardt least squares with optional box constraints.

use crate::error::{ContinuumError, Result};

use super::linear_solver::solve;

#[derive(Debug, Clone)]
pub struct LsqConfig {
    /// Maximum number of accepted-or-rejected iterations.
    pub max_iterations: usize,
    /// Relative parameter step below which the fit has converged.
    pub xtol: f64,
    /// Relative cost reduction below which the fit has converged.
    pub ftol: f64,
    pub initial_lambda: f64,
    pub lambda_up: f64,
    pub lambda_down: f64,
}

impl Default for LsqConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            xtol: 1e-10,
            ftol: 1e-12,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds<const N: usize> {
    pub lower: [f64; N],
    pub upper: [f64; N],
}

impl<const N: usize> Bounds<N> {
    pub fn new(lower: [f64; N], upper: [f64; N]) -> Self {
        Self { lower, upper }
    }

    pub fn clamp(&self, params: &mut [f64; N]) {
        for i in 0..N {
            params[i] = params[i].clamp(self.lower[i], self.upper[i]);
        }
    }

    fn is_valid(&self) -> bool {
        (0..N).all(|i| self.lower[i] <= self.upper[i])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LsqResult<const N: usize> {
    pub params: [f64; N],
    /// Half the sum of squared residuals.
    pub cost: f64,
    pub iterations: usize,
}

fn sum_squares(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

fn evaluate<const N: usize, F>(residuals: &F, params: &[f64; N], out: &mut Vec<f64>) -> f64
where
    F: Fn(&[f64; N], &mut Vec<f64>),
{
    out.clear();
    residuals(params, out);
    sum_squares(out)
}

/// Central-difference Jacobian `J[k][i] = d r_k / d p_i`.
fn jacobian_3point<const N: usize, F>(
    residuals: &F,
    params: &[f64; N],
    n_residuals: usize,
    jacobian: &mut Vec<[f64; N]>,
) -> bool
where
    F: Fn(&[f64; N], &mut Vec<f64>),
{
    let step_scale = f64::EPSILON.cbrt();
    jacobian.clear();
    jacobian.resize(n_residuals, [0.0; N]);

    let mut plus = Vec::with_capacity(n_residuals);
    let mut minus = Vec::with_capacity(n_residuals);

    for i in 0..N {
        let h = step_scale * params[i].abs().max(1.0);
        let mut p_plus = *params;
        let mut p_minus = *params;
        p_plus[i] += h;
        p_minus[i] -= h;

        plus.clear();
        minus.clear();
        residuals(&p_plus, &mut plus);
        residuals(&p_minus, &mut minus);
        if plus.len() != n_residuals || minus.len() != n_residuals {
            return false;
        }

        let inv = 1.0 / (p_plus[i] - p_minus[i]);
        for (row, (a, b)) in jacobian.iter_mut().zip(plus.iter().zip(minus.iter())) {
            row[i] = (a - b) * inv;
        }
    }
    true
}

/// Minimize `0.5 * sum(r(p)^2)` starting from `initial`.
///
/// `initial` is clamped into `bounds` before the first evaluation. Running
/// out of iterations without meeting a tolerance is reported as a
/// [`ContinuumError::FitConvergence`].
pub fn least_squares<const N: usize, F>(
    residuals: F,
    initial: [f64; N],
    bounds: Option<&Bounds<N>>,
    config: &LsqConfig,
) -> Result<LsqResult<N>>
where
    F: Fn(&[f64; N], &mut Vec<f64>),
{
    if let Some(b) = bounds {
        if !b.is_valid() {
            return Err(ContinuumError::Configuration(format!(
                "lower bounds {:?} exceed upper bounds {:?}",
                b.lower, b.upper
            )));
        }
    }

    let mut params = initial;
    if let Some(b) = bounds {
        b.clamp(&mut params);
    }

    let mut r = Vec::new();
    let mut chi2 = evaluate(&residuals, &params, &mut r);
    let m = r.len();
    if m == 0 {
        return Err(ContinuumError::fit("least squares", "no residuals to fit"));
    }
    if !chi2.is_finite() {
        return Err(ContinuumError::fit(
            "least squares",
            "non-finite residuals at the initial guess",
        ));
    }

    let mut lambda = config.initial_lambda;
    let mut jacobian: Vec<[f64; N]> = Vec::with_capacity(m);
    let mut trial = Vec::with_capacity(m);
    let mut need_jacobian = true;
    let mut hessian = [[0.0f64; N]; N];
    let mut gradient = [0.0f64; N];

    for iter in 0..config.max_iterations {
        if chi2 <= f64::MIN_POSITIVE {
            return Ok(LsqResult { params, cost: 0.5 * chi2, iterations: iter });
        }

        if need_jacobian {
            if !jacobian_3point(&residuals, &params, m, &mut jacobian) {
                return Err(ContinuumError::fit(
                    "least squares",
                    "residual length changed between evaluations",
                ));
            }
            let (h, g) = normal_equations(&jacobian, &r);
            hessian = h;
            gradient = g;
            need_jacobian = false;
        }

        let mut damped = hessian;
        for (i, row) in damped.iter_mut().enumerate() {
            row[i] += lambda * row[i].max(1e-12);
        }
        let neg_gradient = gradient.map(|g| -g);

        let Some(delta) = solve(&damped, &neg_gradient) else {
            lambda *= config.lambda_up;
            if lambda > 1e16 {
                return Ok(LsqResult { params, cost: 0.5 * chi2, iterations: iter + 1 });
            }
            continue;
        };

        let mut new_params = params;
        for (p, d) in new_params.iter_mut().zip(delta.iter()) {
            *p += d;
        }
        if let Some(b) = bounds {
            b.clamp(&mut new_params);
        }

        let step_small = (0..N).all(|i| {
            (new_params[i] - params[i]).abs() <= config.xtol * (params[i].abs() + config.xtol)
        });

        let new_chi2 = evaluate(&residuals, &new_params, &mut trial);

        if new_chi2.is_finite() && new_chi2 < chi2 {
            let reduction = chi2 - new_chi2;
            params = new_params;
            std::mem::swap(&mut r, &mut trial);
            chi2 = new_chi2;
            lambda = (lambda * config.lambda_down).max(1e-15);
            need_jacobian = true;

            if step_small || reduction <= config.ftol * chi2.max(f64::MIN_POSITIVE) {
                return Ok(LsqResult { params, cost: 0.5 * chi2, iterations: iter + 1 });
            }
        } else {
            if step_small {
                // The projected step vanished: stationary at a bound or minimum.
                return Ok(LsqResult { params, cost: 0.5 * chi2, iterations: iter + 1 });
            }
            lambda *= config.lambda_up;
            if lambda > 1e16 {
                return Ok(LsqResult { params, cost: 0.5 * chi2, iterations: iter + 1 });
            }
        }
    }

    Err(ContinuumError::fit(
        "least squares",
        format!("no convergence after {} iterations", config.max_iterations),
    ))
}

/// `J^T J` and `J^T r`, upper triangle mirrored.
#[allow(clippy::needless_range_loop)]
fn normal_equations<const N: usize>(
    jacobian: &[[f64; N]],
    residuals: &[f64],
) -> ([[f64; N]; N], [f64; N]) {
    let mut hessian = [[0.0f64; N]; N];
    let mut gradient = [0.0f64; N];

    for (row, &r) in jacobian.iter().zip(residuals.iter()) {
        for i in 0..N {
            gradient[i] += row[i] * r;
            for j in i..N {
                hessian[i][j] += row[i] * row[j];
            }
        }
    }

    for i in 1..N {
        for j in 0..i {
            hessian[i][j] = hessian[j][i];
        }
    }

    (hessian, gradient)
}
