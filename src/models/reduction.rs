//! Exponentiated-gradient reduction for demographic parity.
//!
//! The constrained problem
//!
//! ```text
//! minimize err(h)  s.t.  |P(h=1 | A=a) - P(h=1)| <= ε   for every group a
//! ```
//!
//! is solved as a two-player game: the learner plays cost-sensitive best
//! responses (a weighted fit of the base estimator on relabeled rows), and
//! the Lagrange multipliers `λ` follow exponentiated-gradient updates on the
//! observed constraint violations. The result is the uniform mixture of the
//! best responses.
//!
//! With `μ_a = λ⁺_a - λ⁻_a` and `M = Σ_a μ_a`, predicting `1` on row `i`
//! instead of `0` changes the Lagrangian by
//!
//! ```text
//! d_i = (1{y_i=0} - 1{y_i=1}) / n + μ_{a_i} / n_{a_i} - M / n
//! ```
//!
//! so the best response is a weighted classification with label
//! `1{d_i < 0}` and weight `|d_i|`.

use nalgebra::DMatrix;

use crate::domain::Dataset;
use crate::metrics::selection_rates;
use crate::models::{Classifier, FitError, LogisticModel, LogisticRegression};

/// A base estimator that accepts sample weights.
pub trait WeightedEstimator: Send + Sync {
    type Model: Classifier;

    fn fit_weighted(
        &self,
        features: &DMatrix<f64>,
        labels: &[u32],
        weights: &[f64],
    ) -> Result<Self::Model, FitError>;
}

impl WeightedEstimator for LogisticRegression {
    type Model = LogisticModel;

    fn fit_weighted(
        &self,
        features: &DMatrix<f64>,
        labels: &[u32],
        weights: &[f64],
    ) -> Result<LogisticModel, FitError> {
        self.fit(features, labels, Some(weights))
    }
}

/// Reduction options.
#[derive(Debug, Clone)]
pub struct ExponentiatedGradient {
    /// Allowed demographic-parity difference `ε`.
    pub difference_bound: f64,
    /// Number of best responses to collect at most.
    pub max_iter: usize,
    /// Iterations to run before the early-stop check applies.
    pub min_iter: usize,
    /// Initial multiplier step size (decays as `1/sqrt(t)`).
    pub eta0: f64,
    /// Bound on `Σ λ`; defaults to `1/ε`.
    pub bound: Option<f64>,
}

impl ExponentiatedGradient {
    pub fn new(difference_bound: f64) -> Self {
        Self {
            difference_bound,
            max_iter: 50,
            min_iter: 5,
            eta0: 2.0,
            bound: None,
        }
    }
}

/// One best response: a fitted base model, or a constant when the relabeled
/// problem has a single class.
#[derive(Debug, Clone)]
pub enum BestResponse<M> {
    Constant(u32),
    Model(M),
}

impl<M: Classifier> Classifier for BestResponse<M> {
    fn predict_proba(&self, features: &DMatrix<f64>) -> Vec<f64> {
        match self {
            BestResponse::Constant(label) => vec![f64::from(*label); features.nrows()],
            BestResponse::Model(model) => model.predict_proba(features),
        }
    }
}

/// Weighted mixture of hard classifiers.
///
/// `predict_proba` is the mixture weight voting for label `1`; `predict`
/// takes the majority, which keeps predictions deterministic.
#[derive(Debug, Clone)]
pub struct MixtureClassifier<M> {
    members: Vec<BestResponse<M>>,
    weights: Vec<f64>,
}

impl<M> MixtureClassifier<M> {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<M: Classifier> Classifier for MixtureClassifier<M> {
    fn predict_proba(&self, features: &DMatrix<f64>) -> Vec<f64> {
        let mut out = vec![0.0; features.nrows()];
        for (member, &w) in self.members.iter().zip(&self.weights) {
            for (acc, label) in out.iter_mut().zip(member.predict(features)) {
                *acc += w * f64::from(label);
            }
        }
        out
    }
}

impl ExponentiatedGradient {
    /// Fit the reduction around `estimator` on `train`.
    pub fn fit<E: WeightedEstimator>(
        &self,
        estimator: &E,
        train: &Dataset,
    ) -> Result<MixtureClassifier<E::Model>, FitError> {
        let eps = self.difference_bound;
        if !(eps.is_finite() && eps > 0.0) {
            return Err(FitError::Malformed(format!(
                "difference bound must be finite and > 0, got {eps}"
            )));
        }
        let n = train.n_rows();
        if n == 0 {
            return Err(FitError::Malformed("empty training table".to_string()));
        }
        if train.sensitive.len() != n || train.labels.len() != n {
            return Err(FitError::Malformed(
                "labels / sensitive attributes do not match the row count".to_string(),
            ));
        }

        let n_groups = train.group_count();
        let mut group_sizes = vec![0usize; n_groups];
        for &g in &train.sensitive {
            group_sizes[g as usize] += 1;
        }

        let bound = self.bound.unwrap_or(1.0 / eps);
        let mut theta = vec![0.0_f64; 2 * n_groups];
        let mut members = Vec::new();

        // Running sums of per-iterate selection rates, for the mixture's violation.
        let mut rate_sums = vec![0.0_f64; n_groups];
        let mut overall_sum = 0.0_f64;

        for t in 0..self.max_iter.max(1) {
            let lambda = multipliers(&theta, bound);
            let mu: Vec<f64> = (0..n_groups).map(|a| lambda[2 * a] - lambda[2 * a + 1]).collect();
            let mu_total: f64 = mu.iter().sum();

            let mut relabeled = Vec::with_capacity(n);
            let mut weights = Vec::with_capacity(n);
            for i in 0..n {
                let a = train.sensitive[i] as usize;
                let err_term = if train.labels[i] == 0 { 1.0 } else { -1.0 };
                // Scaled by n so the weights are O(1) next to the L2 penalty.
                let d = err_term + mu[a] * n as f64 / group_sizes[a] as f64 - mu_total;
                relabeled.push(u32::from(d < 0.0));
                weights.push(d.abs());
            }
            if weights.iter().any(|w| !w.is_finite()) {
                return Err(FitError::Numerical("non-finite cost-sensitive weights".to_string()));
            }

            let member = best_response(estimator, &train.features, &relabeled, &weights)?;
            let predictions = member.predict(&train.features);
            members.push(member);

            let (rates, overall) = selection_rates(&predictions, &train.sensitive, n_groups);
            for a in 0..n_groups {
                rate_sums[a] += rates[a];
            }
            overall_sum += overall;

            let k = members.len() as f64;
            let mixture_violation = (0..n_groups)
                .filter(|&a| group_sizes[a] > 0)
                .map(|a| (rate_sums[a] / k - overall_sum / k).abs())
                .fold(0.0_f64, f64::max);
            if members.len() >= self.min_iter && mixture_violation <= eps {
                break;
            }

            let eta = self.eta0 / ((t + 1) as f64).sqrt();
            for a in 0..n_groups {
                if group_sizes[a] == 0 {
                    continue;
                }
                let gamma = rates[a] - overall;
                theta[2 * a] += eta * (gamma - eps);
                theta[2 * a + 1] += eta * (-gamma - eps);
            }
            if theta.iter().any(|v| !v.is_finite()) {
                return Err(FitError::Numerical("non-finite Lagrange multipliers".to_string()));
            }
        }

        let k = members.len();
        Ok(MixtureClassifier {
            members,
            weights: vec![1.0 / k as f64; k],
        })
    }
}

/// `λ_k = B · exp(θ_k) / (1 + Σ_j exp(θ_j))`, evaluated with a shifted
/// exponent so large `θ` cannot overflow.
fn multipliers(theta: &[f64], bound: f64) -> Vec<f64> {
    let shift = theta.iter().copied().fold(0.0_f64, f64::max);
    let denom = (-shift).exp() + theta.iter().map(|v| (v - shift).exp()).sum::<f64>();
    theta.iter().map(|v| bound * (v - shift).exp() / denom).collect()
}

fn best_response<E: WeightedEstimator>(
    estimator: &E,
    features: &DMatrix<f64>,
    labels: &[u32],
    weights: &[f64],
) -> Result<BestResponse<E::Model>, FitError> {
    let mut mass = [0.0_f64; 2];
    for (&y, &w) in labels.iter().zip(weights) {
        mass[y as usize] += w;
    }
    if mass[0] <= 0.0 || mass[1] <= 0.0 {
        return Ok(BestResponse::Constant(u32::from(mass[1] > mass[0])));
    }
    estimator
        .fit_weighted(features, labels, weights)
        .map(BestResponse::Model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::demographic_parity_difference;

    /// Two groups; group 0 is mostly positive, group 1 mostly negative, and the
    /// group id is itself a feature, so the unconstrained model is unfair.
    fn unfair_dataset() -> Dataset {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        let mut sensitive = Vec::new();
        for i in 0..100 {
            let x = (i as f64 - 50.0) / 25.0;
            let group = (i % 2) as u32;
            let shift = if group == 0 { 1.0 } else { -1.0 };
            rows.push(x);
            rows.push(f64::from(group));
            labels.push(u32::from(x + shift > 0.0));
            sensitive.push(group);
        }
        Dataset::new(
            vec!["x".to_string(), "group".to_string()],
            DMatrix::from_row_slice(100, 2, &rows),
            labels,
            sensitive,
        )
        .unwrap()
    }

    fn expected_dp_difference(proba: &[f64], sensitive: &[u32]) -> f64 {
        let mut sums = [0.0; 2];
        let mut counts = [0.0; 2];
        for (&p, &g) in proba.iter().zip(sensitive) {
            sums[g as usize] += p;
            counts[g as usize] += 1.0;
        }
        (sums[0] / counts[0] - sums[1] / counts[1]).abs()
    }

    #[test]
    fn reduction_narrows_the_parity_gap() {
        let data = unfair_dataset();
        let estimator = LogisticRegression::default();

        let plain = estimator.fit(&data.features, &data.labels, None).unwrap();
        let plain_gap = demographic_parity_difference(&plain.predict(&data.features), &data.sensitive);

        let mixture = ExponentiatedGradient::new(0.01).fit(&estimator, &data).unwrap();
        let mixed_gap = expected_dp_difference(&mixture.predict_proba(&data.features), &data.sensitive);

        assert!(plain_gap > 0.3, "fixture should be unfair, gap={plain_gap}");
        assert!(mixed_gap < plain_gap, "gap {mixed_gap} should be below {plain_gap}");
    }

    #[test]
    fn single_group_stops_after_min_iter() {
        let mut data = unfair_dataset();
        data.sensitive = vec![0; data.n_rows()];
        let eg = ExponentiatedGradient::new(0.01);
        let mixture = eg.fit(&LogisticRegression::default(), &data).unwrap();
        assert_eq!(mixture.len(), eg.min_iter);
    }

    #[test]
    fn multipliers_respect_the_bound() {
        let lambda = multipliers(&[800.0, -3.0, 0.5, 900.0], 100.0);
        assert!(lambda.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert!(lambda.iter().sum::<f64>() <= 100.0 + 1e-9);
    }

    #[test]
    fn invalid_bound_is_malformed() {
        let err = ExponentiatedGradient::new(0.0)
            .fit(&LogisticRegression::default(), &unfair_dataset())
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
