use super::spline::reflect_index;

/// Normalized Gaussian kernel of radius `round(truncate * sigma)`.
pub fn gaussian_kernel_1d(sigma: f64, truncate: f64) -> Vec<f64> {
    if !(sigma > 0.0) {
        return vec![1.0];
    }
    let radius = (truncate * sigma + 0.5) as usize;
    let inv_two_sigma2 = 1.0 / (2.0 * sigma * sigma);
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let d = i as f64 - radius as f64;
            (-d * d * inv_two_sigma2).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// 1D Gaussian smoothing with half-sample reflective boundaries.
pub fn gaussian_filter1d(input: &[f64], sigma: f64) -> Vec<f64> {
    let n = input.len();
    if n == 0 {
        return Vec::new();
    }
    let kernel = gaussian_kernel_1d(sigma, 4.0);
    let radius = (kernel.len() / 2) as isize;

    (0..n as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * input[reflect_index(i + k as isize - radius, n)])
                .sum()
        })
        .collect()
}

/// Full discrete cross-correlation, length `a.len() + b.len() - 1`.
///
/// `out[k] = sum_l a[l] * b[l - k + b.len() - 1]`, so index `b.len() - 1`
/// is zero lag.
pub fn correlate_full(a: &[f64], b: &[f64]) -> Vec<f64> {
    let (na, nb) = (a.len(), b.len());
    if na == 0 || nb == 0 {
        return Vec::new();
    }
    (0..na + nb - 1)
        .map(|k| {
            let lag = k as isize - (nb as isize - 1);
            let l_start = lag.max(0) as usize;
            let l_end = (na as isize).min(nb as isize + lag) as usize;
            (l_start..l_end)
                .map(|l| a[l] * b[(l as isize - lag) as usize])
                .sum()
        })
        .collect()
}

/// Index of the largest finite value.
pub fn nan_argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_kernel() {
        let kernel = gaussian_kernel_1d(5.0, 4.0);
        assert_eq!(kernel.len(), 41);
        let sum: f64 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(kernel[20] > kernel[19]);
        assert!((kernel[10] - kernel[30]).abs() < 1e-15);
    }

    #[test]
    fn test_filter_preserves_constant() {
        let out = gaussian_filter1d(&[2.0; 17], 5.0);
        assert!(out.iter().all(|v| (v - 2.0).abs() < 1e-12));
    }

    #[test]
    fn test_correlate_zero_lag_peak() {
        let a = [0.0, 1.0, 3.0, 1.0, 0.0];
        let corr = correlate_full(&a, &a);
        assert_eq!(corr.len(), 9);
        assert_eq!(nan_argmax(&corr), Some(4));
        assert!((corr[4] - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlate_detects_offset() {
        let b = [0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let a = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let corr = correlate_full(&a, &b);
        // a is b delayed by two samples.
        assert_eq!(nan_argmax(&corr), Some(b.len() - 1 + 2));
    }

    #[test]
    fn test_nan_argmax_skips_nan() {
        assert_eq!(nan_argmax(&[1.0, f64::NAN, 0.5]), Some(0));
        assert_eq!(nan_argmax(&[f64::NAN]), None);
    }
}
