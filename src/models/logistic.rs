//! L2-regularized binary logistic regression.
//!
//! Objective (the usual `C` parameterization):
//!
//! ```text
//! minimize  ½ ||β||² + C Σ w_i · logloss(x_i^T β + b, y_i)
//! ```
//!
//! The intercept `b` is not penalized. Features are standardized internally
//! (mean/std from the training table) so one step size works for columns on
//! very different scales (e.g. `fnlwgt` next to encoded categories).
//!
//! We use Newton's method with step halving. For the small column counts of
//! tabular fairness datasets a dense `(d+1)×(d+1)` Hessian is cheap, and
//! Newton converges in a handful of iterations.

use nalgebra::{DMatrix, DVector};

use crate::math::{log_loss, sigmoid, solve_spd};
use crate::models::{Classifier, FitError};

/// Fitting options.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    /// Inverse regularization strength.
    pub c: f64,
    /// Maximum Newton iterations.
    pub max_iter: usize,
    /// Convergence tolerance on the largest Newton step component.
    pub tol: f64,
    /// When `false`, hitting `max_iter` returns the last iterate instead of
    /// `FitError::NotConverged`.
    pub require_convergence: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-8,
            require_convergence: true,
        }
    }
}

/// A fitted logistic regression.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    mean: DVector<f64>,
    scale: DVector<f64>,
    /// Coefficients on standardized features, intercept last.
    beta: DVector<f64>,
    converged: bool,
    iterations: usize,
}

impl LogisticModel {
    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Coefficients on the standardized features (intercept excluded).
    pub fn coefficients(&self) -> Vec<f64> {
        let d = self.beta.len() - 1;
        self.beta.rows(0, d).iter().copied().collect()
    }

    pub fn intercept(&self) -> f64 {
        self.beta[self.beta.len() - 1]
    }

    fn logits(&self, features: &DMatrix<f64>) -> Vec<f64> {
        let d = self.mean.len();
        let b = self.intercept();
        (0..features.nrows())
            .map(|i| {
                let mut z = b;
                for j in 0..d.min(features.ncols()) {
                    z += self.beta[j] * (features[(i, j)] - self.mean[j]) / self.scale[j];
                }
                z
            })
            .collect()
    }
}

impl Classifier for LogisticModel {
    fn predict_proba(&self, features: &DMatrix<f64>) -> Vec<f64> {
        self.logits(features).into_iter().map(sigmoid).collect()
    }
}

impl LogisticRegression {
    /// Fit on `features` (n×d) and binary `labels`, with optional sample weights.
    pub fn fit(
        &self,
        features: &DMatrix<f64>,
        labels: &[u32],
        sample_weight: Option<&[f64]>,
    ) -> Result<LogisticModel, FitError> {
        let n = features.nrows();
        let d = features.ncols();

        validate_inputs(n, labels, sample_weight)?;
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(FitError::Malformed(format!("C must be finite and > 0, got {}", self.c)));
        }

        let weights: Vec<f64> = match sample_weight {
            Some(w) => w.to_vec(),
            None => vec![1.0; n],
        };
        let y: Vec<f64> = labels.iter().map(|&l| f64::from(l)).collect();

        let has_pos = y.iter().zip(&weights).any(|(&yi, &wi)| yi > 0.5 && wi > 0.0);
        let has_neg = y.iter().zip(&weights).any(|(&yi, &wi)| yi < 0.5 && wi > 0.0);
        if !(has_pos && has_neg) {
            return Err(FitError::Degenerate(
                "training labels contain a single class".to_string(),
            ));
        }

        let (mean, scale) = standardization(features);
        let x = design_matrix(features, &mean, &scale);

        let p = d + 1;
        let mut beta = DVector::<f64>::zeros(p);
        let mut objective = self.objective(&x, &y, &weights, &beta);
        let mut converged = false;
        let mut iterations = 0usize;

        for iter in 0..self.max_iter {
            iterations = iter + 1;

            let z = &x * &beta;
            let mut grad_w = DVector::<f64>::zeros(n);
            let mut xs = x.clone();
            for i in 0..n {
                let pi = sigmoid(z[i]);
                grad_w[i] = self.c * weights[i] * (pi - y[i]);
                let curvature = (self.c * weights[i] * pi * (1.0 - pi)).sqrt();
                for j in 0..p {
                    xs[(i, j)] *= curvature;
                }
            }

            let mut grad = x.tr_mul(&grad_w);
            let mut hess = xs.tr_mul(&xs);
            for j in 0..d {
                grad[j] += beta[j];
                hess[(j, j)] += 1.0;
            }
            // Keep the unpenalized intercept row strictly positive.
            hess[(d, d)] += 1e-10;

            let Some(step) = solve_spd(&hess, &grad) else {
                return Err(FitError::Numerical("singular Newton system".to_string()));
            };

            // Step halving keeps the objective monotone.
            let mut t = 1.0;
            let mut accepted = None;
            for _ in 0..30 {
                let candidate = &beta - &step * t;
                let obj = self.objective(&x, &y, &weights, &candidate);
                if obj.is_finite() && obj <= objective + 1e-12 * objective.abs().max(1.0) {
                    accepted = Some((candidate, obj));
                    break;
                }
                t *= 0.5;
            }
            let Some((next, obj)) = accepted else {
                return Err(FitError::Numerical(
                    "line search failed to decrease the objective".to_string(),
                ));
            };

            let max_step = step.iter().fold(0.0_f64, |m, v| m.max((v * t).abs()));
            beta = next;
            objective = obj;

            if !beta.iter().all(|v| v.is_finite()) {
                return Err(FitError::Numerical("non-finite coefficients".to_string()));
            }
            if max_step < self.tol {
                converged = true;
                break;
            }
        }

        if !converged && self.require_convergence {
            return Err(FitError::NotConverged { iterations });
        }

        Ok(LogisticModel {
            mean,
            scale,
            beta,
            converged,
            iterations,
        })
    }

    fn objective(&self, x: &DMatrix<f64>, y: &[f64], w: &[f64], beta: &DVector<f64>) -> f64 {
        let d = beta.len() - 1;
        let z = x * beta;
        let loss: f64 = (0..y.len()).map(|i| w[i] * log_loss(z[i], y[i])).sum();
        let penalty: f64 = beta.rows(0, d).iter().map(|b| b * b).sum::<f64>() * 0.5;
        penalty + self.c * loss
    }
}

fn validate_inputs(n: usize, labels: &[u32], sample_weight: Option<&[f64]>) -> Result<(), FitError> {
    if n == 0 {
        return Err(FitError::Malformed("empty training table".to_string()));
    }
    if labels.len() != n {
        return Err(FitError::Malformed(format!(
            "label count {} does not match row count {n}",
            labels.len()
        )));
    }
    if let Some(&bad) = labels.iter().find(|&&l| l > 1) {
        return Err(FitError::Malformed(format!(
            "labels must be binary (0/1), found {bad}"
        )));
    }
    if let Some(w) = sample_weight {
        if w.len() != n {
            return Err(FitError::Malformed(format!(
                "weight count {} does not match row count {n}",
                w.len()
            )));
        }
        if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(FitError::Malformed(
                "sample weights must be finite and >= 0".to_string(),
            ));
        }
    }
    Ok(())
}

fn standardization(features: &DMatrix<f64>) -> (DVector<f64>, DVector<f64>) {
    let n = features.nrows() as f64;
    let d = features.ncols();
    let mut mean = DVector::<f64>::zeros(d);
    let mut scale = DVector::<f64>::from_element(d, 1.0);
    for j in 0..d {
        let col = features.column(j);
        let m = col.sum() / n;
        let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;
        mean[j] = m;
        if var.is_finite() && var > 1e-24 {
            scale[j] = var.sqrt();
        }
    }
    (mean, scale)
}

fn design_matrix(features: &DMatrix<f64>, mean: &DVector<f64>, scale: &DVector<f64>) -> DMatrix<f64> {
    let n = features.nrows();
    let d = features.ncols();
    DMatrix::from_fn(n, d + 1, |i, j| {
        if j == d {
            1.0
        } else {
            (features[(i, j)] - mean[j]) / scale[j]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (DMatrix<f64>, Vec<u32>) {
        let x = DMatrix::from_row_slice(6, 1, &[-3.0, -2.0, -1.0, 1.0, 2.0, 3.0]);
        (x, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn fits_separable_data_with_regularization() {
        let (x, y) = separable();
        let model = LogisticRegression::default().fit(&x, &y, None).unwrap();
        assert!(model.converged());
        assert_eq!(model.predict(&x), y);
        assert!(model.coefficients()[0] > 0.0);
    }

    #[test]
    fn two_row_dataset_is_fitted_exactly() {
        let x = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let y = vec![0, 1];
        let model = LogisticRegression::default().fit(&x, &y, None).unwrap();
        assert_eq!(model.predict(&x), y);
    }

    #[test]
    fn single_class_is_degenerate() {
        let x = DMatrix::from_row_slice(3, 1, &[0.0, 1.0, 2.0]);
        let err = LogisticRegression::default().fit(&x, &[1, 1, 1], None).unwrap_err();
        assert!(matches!(err, FitError::Degenerate(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn non_binary_labels_are_malformed() {
        let x = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let err = LogisticRegression::default().fit(&x, &[0, 2], None).unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn zero_weight_rows_are_ignored() {
        // The heavily weighted rows say "positive x -> 1"; the zero-weight rows
        // contradict them and must not matter.
        let x = DMatrix::from_row_slice(6, 1, &[-2.0, -1.0, 1.0, 2.0, 5.0, -5.0]);
        let y = vec![0, 0, 1, 1, 0, 1];
        let w = vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.0];
        let model = LogisticRegression::default().fit(&x, &y, Some(&w)).unwrap();
        assert!(model.coefficients()[0] > 0.0);
    }

    #[test]
    fn iteration_cap_is_reported_when_strict() {
        let (x, y) = separable();
        let strict = LogisticRegression {
            max_iter: 1,
            tol: 0.0,
            ..LogisticRegression::default()
        };
        let err = strict.fit(&x, &y, None).unwrap_err();
        assert!(matches!(err, FitError::NotConverged { iterations: 1 }));

        let lenient = LogisticRegression {
            require_convergence: false,
            ..strict
        };
        let model = lenient.fit(&x, &y, None).unwrap();
        assert!(!model.converged());
    }

    #[test]
    fn fitting_is_deterministic() {
        let (x, y) = separable();
        let a = LogisticRegression::default().fit(&x, &y, None).unwrap();
        let b = LogisticRegression::default().fit(&x, &y, None).unwrap();
        assert_eq!(a.predict_proba(&x), b.predict_proba(&x));
    }
}
