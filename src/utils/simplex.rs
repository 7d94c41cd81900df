use crate::error::{ContinuumError, Result};

#[derive(Debug, Clone)]
pub struct SimplexConfig {
    pub max_iterations: usize,
    /// Absolute spread of the simplex vertices at convergence.
    pub xatol: f64,
    /// Spread of the objective values at convergence, relative to the best value.
    pub fatol: f64,
}

impl Default for SimplexConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            xatol: 1e-7,
            fatol: 1e-10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimplexResult<const N: usize> {
    pub params: [f64; N],
    pub value: f64,
    pub iterations: usize,
}

const RHO: f64 = 1.0;
const CHI: f64 = 2.0;
const PSI: f64 = 0.5;
const SIGMA: f64 = 0.5;

fn affine<const N: usize>(a: &[f64; N], b: &[f64; N], t: f64) -> [f64; N] {
    let mut out = [0.0; N];
    for i in 0..N {
        out[i] = a[i] + t * (b[i] - a[i]);
    }
    out
}

fn eval<const N: usize, F: Fn(&[f64; N]) -> f64>(f: &F, p: &[f64; N]) -> f64 {
    let v = f(p);
    if v.is_nan() {
        f64::INFINITY
    } else {
        v
    }
}

/// Minimize `objective` from `initial`.
///
/// The starting simplex perturbs each coordinate by 5% (0.00025 for zero
/// coordinates). NaN objective values are treated as +inf.
pub fn minimize<const N: usize, F>(
    objective: F,
    initial: [f64; N],
    config: &SimplexConfig,
) -> Result<SimplexResult<N>>
where
    F: Fn(&[f64; N]) -> f64,
{
    let mut vertices: Vec<[f64; N]> = Vec::with_capacity(N + 1);
    vertices.push(initial);
    for i in 0..N {
        let mut v = initial;
        v[i] = if v[i] != 0.0 { 1.05 * v[i] } else { 0.00025 };
        vertices.push(v);
    }
    let mut values: Vec<f64> = vertices.iter().map(|v| eval(&objective, v)).collect();

    if !values[0].is_finite() {
        return Err(ContinuumError::fit(
            "simplex",
            "objective is not finite at the initial guess",
        ));
    }

    for iter in 0..config.max_iterations {
        let mut order: Vec<usize> = (0..=N).collect();
        order.sort_by(|&a, &b| {
            values[a]
                .partial_cmp(&values[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        vertices = order.iter().map(|&i| vertices[i]).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let x_spread = vertices[1..]
            .iter()
            .flat_map(|v| v.iter().zip(vertices[0].iter()).map(|(a, b)| (a - b).abs()))
            .fold(0.0f64, f64::max);
        let f_spread = values[1..]
            .iter()
            .map(|v| (v - values[0]).abs())
            .fold(0.0f64, f64::max);
        if x_spread <= config.xatol && f_spread <= config.fatol * values[0].abs().max(1.0) {
            return Ok(SimplexResult {
                params: vertices[0],
                value: values[0],
                iterations: iter,
            });
        }

        let mut centroid = [0.0; N];
        for v in &vertices[..N] {
            for i in 0..N {
                centroid[i] += v[i] / N as f64;
            }
        }
        let worst = vertices[N];

        let reflected = affine(&centroid, &worst, -RHO);
        let f_r = eval(&objective, &reflected);

        if f_r < values[0] {
            let expanded = affine(&centroid, &worst, -RHO * CHI);
            let f_e = eval(&objective, &expanded);
            if f_e < f_r {
                vertices[N] = expanded;
                values[N] = f_e;
            } else {
                vertices[N] = reflected;
                values[N] = f_r;
            }
            continue;
        }

        if f_r < values[N - 1] {
            vertices[N] = reflected;
            values[N] = f_r;
            continue;
        }

        let (contracted, f_c, accept) = if f_r < values[N] {
            let c = affine(&centroid, &worst, -PSI * RHO);
            let f_c = eval(&objective, &c);
            (c, f_c, f_c <= f_r)
        } else {
            let c = affine(&centroid, &worst, PSI);
            let f_c = eval(&objective, &c);
            (c, f_c, f_c < values[N])
        };

        if accept {
            vertices[N] = contracted;
            values[N] = f_c;
            continue;
        }

        let best = vertices[0];
        for k in 1..=N {
            vertices[k] = affine(&best, &vertices[k], SIGMA);
            values[k] = eval(&objective, &vertices[k]);
        }
    }

    Err(ContinuumError::fit(
        "simplex",
        format!("no convergence after {} iterations", config.max_iterations),
    ))
}
