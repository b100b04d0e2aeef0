//! One trial: reference model, fan-out over the grid, ordered gather.

use tracing::{info, warn};

use crate::domain::{ExhaustedPolicy, ParameterPoint, SweepRow, TrialResult};
use crate::error::AppError;
use crate::models::Learner;
use crate::sweep::evaluator::{PointOutcome, TrialContext, evaluate_point};
use crate::sweep::pool::WorkerPool;
use crate::sweep::{Collaborators, SweepSettings};

/// Run trial `trial` over `settings.grid` on `pool`.
///
/// Rows come back in grid order and carry the trial index. A trial whose
/// points all exhausted their attempts fails with exit code 3, as does any
/// exhausted point under [`ExhaustedPolicy::FailTrial`].
pub fn run_trial<L: Learner>(
    trial: usize,
    deps: &Collaborators<'_, L>,
    settings: &SweepSettings,
    pool: &WorkerPool,
) -> Result<TrialResult, AppError> {
    if settings.grid.is_empty() {
        return Err(AppError::new(3, format!("Trial {trial}: the parameter grid is empty.")));
    }

    let train = deps.provider.training_data()?;
    let test = deps.provider.test_data()?;
    let reference = deps.learner.fit_baseline(&train)?;

    deps.observer.trial_started(trial, settings.grid.len());

    let ctx = TrialContext {
        trial,
        provider: deps.provider,
        learner: deps.learner,
        metrics: deps.metrics,
        observer: deps.observer,
        reference: &reference,
        train: &train,
        test: &test,
        retry: settings.retry,
        seed: settings.seed,
    };
    let outcomes = pool.map_ordered(&ctx, &settings.grid, |ctx, idx, point| evaluate_point(ctx, idx, point));

    match gather(trial, &settings.grid, outcomes, settings.on_exhausted) {
        Ok(result) => {
            deps.observer.trial_finished(&result);
            info!(
                trial,
                points = result.rows.len(),
                failures = result.failures,
                exhausted = result.exhausted,
                "Trial finished"
            );
            Ok(result)
        }
        Err(err) => {
            deps.observer.trial_failed(trial, &err);
            Err(err)
        }
    }
}

/// Turn per-point outcomes (already in grid order) into the trial's rows.
fn gather(
    trial: usize,
    grid: &[ParameterPoint],
    outcomes: Vec<Result<PointOutcome, AppError>>,
    policy: ExhaustedPolicy,
) -> Result<TrialResult, AppError> {
    let mut rows = Vec::with_capacity(outcomes.len());
    let mut failures = 0usize;
    let mut exhausted = 0usize;

    for (point, outcome) in grid.iter().zip(outcomes) {
        let outcome = outcome.map_err(|e| {
            AppError::new(
                e.exit_code(),
                format!("Trial {trial}, flip_rate={}: {}", point.flip_rate, e.message()),
            )
        })?;
        failures += outcome.failures();

        match outcome {
            PointOutcome::Success { result, failures } => {
                rows.push(SweepRow::from_result(trial, &result, failures));
            }
            PointOutcome::Exhausted { attempts, last_error } => {
                if policy == ExhaustedPolicy::FailTrial {
                    return Err(AppError::new(
                        3,
                        format!(
                            "Trial {trial}: flip_rate={} failed all {attempts} attempts (last error: {last_error}).",
                            point.flip_rate
                        ),
                    ));
                }
                warn!(
                    trial,
                    flip_rate = point.flip_rate,
                    attempts,
                    error = %last_error,
                    "Point exhausted its attempts; writing a sentinel row"
                );
                exhausted += 1;
                rows.push(SweepRow::sentinel(trial, point, attempts));
            }
        }
    }

    if exhausted == rows.len() {
        return Err(AppError::new(
            3,
            format!("Trial {trial}: every point exhausted its attempts; no results survived."),
        ));
    }

    Ok(TrialResult {
        trial,
        rows,
        failures,
        exhausted,
    })
}
