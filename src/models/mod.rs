//! Classifiers consumed by the sweep.
//!
//! The sweep only sees three seams:
//!
//! - [`Classifier`]: a fitted model that predicts binary labels (and the
//!   probability of label `1`, which bias injection uses as a confidence)
//! - [`Learner`]: produces the reference model, per-point models and the
//!   fairness-constrained wrapper
//! - [`FitError`]: typed fit failures with a retryable / fatal split
//!
//! Concrete implementations live in `logistic` (L2 logistic regression) and
//! `reduction` (exponentiated-gradient reduction for demographic parity).

use nalgebra::DMatrix;
use thiserror::Error;
use tracing::warn;

use crate::domain::Dataset;

pub mod logistic;
pub mod reduction;

pub use logistic::*;
pub use reduction::*;

/// Model fitting failures.
#[derive(Debug, Clone, Error)]
pub enum FitError {
    #[error("did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error("degenerate training data: {0}")]
    Degenerate(String),

    #[error("malformed training data: {0}")]
    Malformed(String),
}

impl FitError {
    /// Whether a fresh attempt (new bias draw, new fit) may succeed.
    ///
    /// Malformed inputs fail the same way every time; everything else depends
    /// on the particular draw of flipped labels.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FitError::Malformed(_))
    }
}

/// A fitted binary classifier.
pub trait Classifier: Send + Sync {
    /// Probability of label `1` for each row.
    fn predict_proba(&self, features: &DMatrix<f64>) -> Vec<f64>;

    /// Hard binary predictions for each row.
    fn predict(&self, features: &DMatrix<f64>) -> Vec<u32> {
        self.predict_proba(features)
            .into_iter()
            .map(|p| u32::from(p >= 0.5))
            .collect()
    }
}

/// Fits the models the sweep needs at each point.
pub trait Learner: Send + Sync {
    type Model: Classifier;
    type Constrained: Classifier;

    /// Reference model, fitted once per trial. Non-convergence is not fatal.
    fn fit_baseline(&self, train: &Dataset) -> Result<Self::Model, FitError>;

    /// Per-point unconstrained model.
    fn fit(&self, train: &Dataset) -> Result<Self::Model, FitError>;

    /// Fairness-constrained wrapper trained on the same table plus its
    /// sensitive attributes.
    fn fit_constrained(&self, train: &Dataset) -> Result<Self::Constrained, FitError>;
}

/// Logistic regression plus a demographic-parity reduction around it.
#[derive(Debug, Clone)]
pub struct LogisticLearner {
    pub estimator: LogisticRegression,
    pub mitigator: ExponentiatedGradient,
}

impl LogisticLearner {
    pub fn new(difference_bound: f64) -> Self {
        Self {
            estimator: LogisticRegression::default(),
            mitigator: ExponentiatedGradient::new(difference_bound),
        }
    }
}

impl Learner for LogisticLearner {
    type Model = LogisticModel;
    type Constrained = MixtureClassifier<LogisticModel>;

    fn fit_baseline(&self, train: &Dataset) -> Result<LogisticModel, FitError> {
        let lenient = LogisticRegression {
            require_convergence: false,
            ..self.estimator.clone()
        };
        let model = lenient.fit(&train.features, &train.labels, None)?;
        if !model.converged() {
            warn!(
                iterations = model.iterations(),
                "Reference model did not converge; keeping the last iterate."
            );
        }
        Ok(model)
    }

    fn fit(&self, train: &Dataset) -> Result<LogisticModel, FitError> {
        self.estimator.fit(&train.features, &train.labels, None)
    }

    fn fit_constrained(&self, train: &Dataset) -> Result<MixtureClassifier<LogisticModel>, FitError> {
        self.mitigator.fit(&self.estimator, train)
    }
}
