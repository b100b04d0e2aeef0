//! Linear solves for the Newton iterations of logistic regression.
//!
//! Each Newton step solves `H Δ = g` where `H` is the (regularized) Hessian.
//! With L2 regularization `H` is symmetric positive definite, so Cholesky is
//! the fast path. Near-singular systems (e.g. a constant feature column with a
//! tiny weight mass) fall back to SVD with progressively looser tolerances.

use nalgebra::{DMatrix, DVector};

/// Solve a symmetric positive (semi-)definite system.
///
/// Returns `None` if no finite solution could be found.
pub fn solve_spd(h: &DMatrix<f64>, g: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = h.clone().cholesky() {
        let x = chol.solve(g);
        if x.iter().all(|v| v.is_finite()) {
            return Some(x);
        }
    }

    let svd = h.clone().svd(true, true);
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(x) = svd.solve(g, tol) {
            if x.iter().all(|v| v.is_finite()) {
                return Some(x);
            }
        }
    }

    None
}
