//! Point evaluation with bounded retry.
//!
//! One attempt at a point:
//!
//! 1. at `flip_rate == 0`, reuse the trial's clean table and reference model;
//!    otherwise ask the provider for a biased table and fit a fresh model
//! 2. fit the fairness-constrained wrapper on the same table
//! 3. predict the test table with both and score accuracy and fairness ratio
//!
//! A retryable [`FitError`] starts a fresh attempt (new bias seed, new fits)
//! with no backoff. Anything else (provider errors, malformed data) is fatal
//! and aborts the trial.

use tracing::debug;

use crate::data::DataProvider;
use crate::domain::{Dataset, ParameterPoint, PointResult};
use crate::error::AppError;
use crate::math::mix_seed;
use crate::metrics::Metrics;
use crate::models::{Classifier, FitError, Learner};
use crate::sweep::progress::ProgressObserver;

/// Attempt budget per point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Result<Self, AppError> {
        if max_attempts == 0 {
            return Err(AppError::new(2, "max_attempts must be >= 1."));
        }
        Ok(Self { max_attempts })
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// Typed result of evaluating one point.
#[derive(Debug, Clone)]
pub enum PointOutcome {
    /// `failures` attempts failed before this one succeeded.
    Success { result: PointResult, failures: usize },
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: usize, last_error: FitError },
}

impl PointOutcome {
    /// Failed attempts charged to this point.
    pub fn failures(&self) -> usize {
        match self {
            PointOutcome::Success { failures, .. } => *failures,
            PointOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Read-only state shared by every worker of one trial.
pub struct TrialContext<'a, L: Learner> {
    pub trial: usize,
    pub provider: &'a dyn DataProvider,
    pub learner: &'a L,
    pub metrics: &'a dyn Metrics,
    pub observer: &'a dyn ProgressObserver,
    pub reference: &'a L::Model,
    pub train: &'a Dataset,
    pub test: &'a Dataset,
    pub retry: RetryPolicy,
    pub seed: u64,
}

enum AttemptError {
    Fit(FitError),
    Fatal(AppError),
}

/// Evaluate `point` (at grid position `index`), retrying retryable failures.
pub fn evaluate_point<L: Learner>(
    ctx: &TrialContext<'_, L>,
    index: usize,
    point: &ParameterPoint,
) -> Result<PointOutcome, AppError> {
    let mut last_error = None;

    for attempt in 1..=ctx.retry.max_attempts() {
        match attempt_point(ctx, index, point, attempt) {
            Ok(result) => {
                ctx.observer.attempt_finished(ctx.trial, index, attempt, true);
                return Ok(PointOutcome::Success {
                    result,
                    failures: attempt - 1,
                });
            }
            Err(AttemptError::Fit(err)) if err.is_retryable() => {
                ctx.observer.attempt_finished(ctx.trial, index, attempt, false);
                debug!(
                    trial = ctx.trial,
                    flip_rate = point.flip_rate,
                    attempt,
                    error = %err,
                    "Attempt failed"
                );
                last_error = Some(err);
            }
            Err(AttemptError::Fit(err)) => {
                ctx.observer.attempt_finished(ctx.trial, index, attempt, false);
                return Err(AppError::from(err));
            }
            Err(AttemptError::Fatal(err)) => {
                ctx.observer.attempt_finished(ctx.trial, index, attempt, false);
                return Err(err);
            }
        }
    }

    let last_error = last_error.ok_or_else(|| AppError::new(2, "max_attempts must be >= 1."))?;
    ctx.observer.point_exhausted(ctx.trial, point, &last_error);
    Ok(PointOutcome::Exhausted {
        attempts: ctx.retry.max_attempts(),
        last_error,
    })
}

fn attempt_point<L: Learner>(
    ctx: &TrialContext<'_, L>,
    index: usize,
    point: &ParameterPoint,
    attempt: usize,
) -> Result<PointResult, AttemptError> {
    let biased;
    let fitted;
    let (train, model): (&Dataset, &L::Model) = if point.is_unbiased() {
        (ctx.train, ctx.reference)
    } else {
        let seed = attempt_seed(ctx.seed, ctx.trial, index, attempt);
        biased = ctx
            .provider
            .training_data_label_bias(point.flip_rate, point.confidence_threshold, ctx.reference, seed)
            .map_err(AttemptError::Fatal)?;
        fitted = ctx.learner.fit(&biased).map_err(AttemptError::Fit)?;
        (&biased, &fitted)
    };

    let constrained = ctx.learner.fit_constrained(train).map_err(AttemptError::Fit)?;

    let test = ctx.test;
    let unconstrained_pred = model.predict(&test.features);
    let constrained_pred = constrained.predict(&test.features);

    Ok(PointResult {
        flip_rate: point.flip_rate,
        confidence_threshold: point.confidence_threshold,
        unconstrained_accuracy: ctx.metrics.accuracy(&test.labels, &unconstrained_pred),
        unconstrained_fairness_ratio: ctx
            .metrics
            .fairness_ratio(&test.labels, &unconstrained_pred, &test.sensitive),
        constrained_accuracy: ctx.metrics.accuracy(&test.labels, &constrained_pred),
        constrained_fairness_ratio: ctx
            .metrics
            .fairness_ratio(&test.labels, &constrained_pred, &test.sensitive),
    })
}

/// Bias seed for one attempt; stable across runs, thread schedules and
/// toolchains.
pub fn attempt_seed(base: u64, trial: usize, point_index: usize, attempt: usize) -> u64 {
    mix_seed(&[base, trial as u64, point_index as u64, attempt as u64])
}
