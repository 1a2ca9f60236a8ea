//! Weighted least squares solver.
//!
//! The calibration repeatedly solves tiny regression problems of the form:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - We scale rows by `sqrt(w_i)` and solve an ordinary least squares problem.
//! - We use SVD so the tall design matrix (more rows than columns) is handled
//!   robustly. Nalgebra's `QR::solve` is intended for square systems.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Weighted simple linear regression `y ≈ a + b x`.
///
/// Returns `(intercept, slope)`, or `None` when the weighted system cannot be
/// solved (empty input, non-positive weights, or a singular design).
pub fn weighted_line_fit(x: &[f64], y: &[f64], w: &[f64]) -> Option<(f64, f64)> {
    let n = x.len();
    if n < 2 || y.len() != n || w.len() != n {
        return None;
    }
    if w.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
        return None;
    }

    let mut xw = DMatrix::<f64>::zeros(n, 2);
    let mut yw = DVector::<f64>::zeros(n);
    for i in 0..n {
        let sw = w[i].sqrt();
        xw[(i, 0)] = sw;
        xw[(i, 1)] = x[i] * sw;
        yw[i] = y[i] * sw;
    }

    let beta = solve_least_squares(&xw, &yw)?;
    Some((beta[0], beta[1]))
}
