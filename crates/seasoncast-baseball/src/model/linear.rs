// Ordinary least squares and ridge regression via the normal equations.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::ModelError;

/// Solve the symmetric positive-definite system `a x = b` by Cholesky
/// decomposition. Returns `None` when `a` is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Gaussian elimination with partial pivoting.
fn gauss_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut m = a.clone();
    let mut rhs = b.clone();

    for col in 0..n {
        let pivot = (col..n).max_by(|&p, &q| m[[p, col]].abs().total_cmp(&m[[q, col]].abs()))?;
        if m[[pivot, col]].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for j in 0..n {
                m.swap([col, j], [pivot, j]);
            }
            rhs.swap(col, pivot);
        }
        for row in (col + 1)..n {
            let factor = m[[row, col]] / m[[col, col]];
            for j in col..n {
                m[[row, j]] -= factor * m[[col, j]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| m[[i, j]] * x[j]).sum();
        x[i] = (rhs[i] - sum) / m[[i, i]];
    }
    Some(x)
}

/// Solve `a x = b`: Cholesky first, then Cholesky with a small diagonal
/// jitter (handles all-zero standardized columns), then pivoted elimination.
fn solve_normal_equations(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, ModelError> {
    if let Some(x) = cholesky_solve(a, b) {
        return Ok(x);
    }

    let n = a.nrows().max(1) as f64;
    let jitter = 1e-8 * (a.diag().iter().map(|v| v.abs()).sum::<f64>() / n).max(1.0);
    let mut a_reg = a.clone();
    a_reg.diag_mut().mapv_inplace(|v| v + jitter);
    if let Some(x) = cholesky_solve(&a_reg, b) {
        return Ok(x);
    }

    gauss_solve(a, b).ok_or(ModelError::SingularSystem)
}

/// Linear model `y = x . coefficients + intercept`. With `alpha > 0` the fit
/// is ridge regression; the intercept is never penalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    coefficients: Array1<f64>,
    intercept: f64,
    alpha: f64,
}

impl LinearModel {
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, alpha: f64) -> Result<Self, ModelError> {
        if x.nrows() == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.nrows() != y.len() {
            return Err(ModelError::DimensionMismatch {
                expected: x.nrows(),
                found: y.len(),
            });
        }

        let n = x.nrows() as f64;
        let x_mean = x.sum_axis(Axis(0)) / n;
        let y_mean = y.sum() / n;
        let xc = &x - &x_mean;
        let yc = &y - y_mean;

        let mut xtx = xc.t().dot(&xc);
        if alpha > 0.0 {
            xtx.diag_mut().mapv_inplace(|v| v + alpha);
        }
        let xty = xc.t().dot(&yc);

        let coefficients = solve_normal_equations(&xtx, &xty)?;
        let intercept = y_mean - coefficients.dot(&x_mean);

        Ok(Self {
            coefficients,
            intercept,
            alpha,
        })
    }

    pub fn coefficients(&self) -> &[f64] {
        self.coefficients.as_slice().unwrap_or(&[])
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        row.dot(&self.coefficients) + self.intercept
    }
}
