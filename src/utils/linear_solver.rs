const PIVOT_EPSILON: f64 = 1e-300;

/// Solve `A x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` for a singular (or non-finite) system.
#[allow(clippy::needless_range_loop)]
pub fn solve<const N: usize>(a: &[[f64; N]; N], b: &[f64; N]) -> Option<[f64; N]> {
    let mut matrix = *a;
    let mut rhs = *b;

    for col in 0..N {
        let mut max_row = col;
        let mut max_val = matrix[col][col].abs();
        for row in (col + 1)..N {
            if matrix[row][col].abs() > max_val {
                max_val = matrix[row][col].abs();
                max_row = row;
            }
        }

        if !(max_val > PIVOT_EPSILON) {
            return None;
        }

        if max_row != col {
            matrix.swap(col, max_row);
            rhs.swap(col, max_row);
        }

        for row in (col + 1)..N {
            let factor = matrix[row][col] / matrix[col][col];
            let pivot_row = matrix[col];
            for (j, m) in matrix[row].iter_mut().enumerate().skip(col) {
                *m -= factor * pivot_row[j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0f64; N];
    for i in (0..N).rev() {
        let mut sum = rhs[i];
        for (j, &xj) in x.iter().enumerate().skip(i + 1) {
            sum -= matrix[i][j] * xj;
        }
        x[i] = sum / matrix[i][i];
    }

    x.iter().all(|v| v.is_finite()).then_some(x)
}

pub fn solve_dynamic(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return None;
    }
    let mut matrix: Vec<Vec<f64>> = a.to_vec();
    let mut rhs = b.to_vec();

    for col in 0..n {
        let max_row = (col..n)
            .max_by(|&i, &j| {
                matrix[i][col]
                    .abs()
                    .partial_cmp(&matrix[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);

        if !(matrix[max_row][col].abs() > PIVOT_EPSILON) {
            return None;
        }

        matrix.swap(col, max_row);
        rhs.swap(col, max_row);

        for row in (col + 1)..n {
            let factor = matrix[row][col] / matrix[col][col];
            for j in col..n {
                let p = matrix[col][j];
                matrix[row][j] -= factor * p;
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0f64; n];
    for i in (0..n).rev() {
        let mut sum = rhs[i];
        for j in (i + 1)..n {
            sum -= matrix[i][j] * x[j];
        }
        x[i] = sum / matrix[i][i];
    }

    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_identity() {
        let a = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let b = [1.0, 2.0, 3.0];
        let x = solve(&a, &b).unwrap();
        for i in 0..3 {
            assert!((x[i] - b[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_solve_needs_pivoting() {
        let a = [[0.0, 1.0], [1.0, 0.0]];
        let b = [2.0, 1.0];
        let x = solve(&a, &b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_returns_none() {
        let a = [[1.0, 2.0], [2.0, 4.0]];
        assert!(solve(&a, &[1.0, 1.0]).is_none());
        assert!(solve(&[[0.0; 2]; 2], &[1.0, 1.0]).is_none());
    }

    #[test]
    fn test_dynamic_matches_fixed() {
        let a = [[4.0, 1.0, 2.0], [1.0, 5.0, 3.0], [2.0, 3.0, 6.0]];
        let b = [7.0, 9.0, 11.0];
        let fixed = solve(&a, &b).unwrap();
        let rows: Vec<Vec<f64>> = a.iter().map(|r| r.to_vec()).collect();
        let dynamic = solve_dynamic(&rows, &b).unwrap();
        for i in 0..3 {
            assert!((fixed[i] - dynamic[i]).abs() < 1e-12);
        }
    }
}
