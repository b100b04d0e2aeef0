//! Sequential trials and the concatenated result table.

use serde::Serialize;
use tracing::info;

use crate::domain::{SweepResult, SweepRow};
use crate::error::AppError;
use crate::models::Learner;
use crate::sweep::pool::WorkerPool;
use crate::sweep::trial::run_trial;
use crate::sweep::{Collaborators, SweepSettings};

/// Run trials `1..=trial_count` in order and concatenate their rows.
///
/// The first failing trial stops the sweep.
pub fn run_sweep<L: Learner>(
    trial_count: usize,
    deps: &Collaborators<'_, L>,
    settings: &SweepSettings,
    pool: &WorkerPool,
) -> Result<SweepResult, AppError> {
    if trial_count == 0 {
        return Err(AppError::new(2, "Trial count must be >= 1."));
    }

    info!(
        trials = trial_count,
        points = settings.grid.len(),
        workers = pool.size(),
        max_attempts = settings.retry.max_attempts(),
        "Starting sweep"
    );

    let mut sweep = SweepResult::default();
    for trial in 1..=trial_count {
        sweep.push_trial(run_trial(trial, deps, settings, pool)?);
    }

    info!(
        rows = sweep.rows.len(),
        failures = sweep.total_failures(),
        exhausted = sweep.total_exhausted(),
        "Sweep finished"
    );
    Ok(sweep)
}

/// Means over trials for one grid point (exhausted rows excluded).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointMeans {
    pub flip_rate: f64,
    pub confidence_threshold: f64,
    pub trials_ok: usize,
    pub trials_exhausted: usize,
    pub failures: usize,
    pub unconstrained_accuracy: Option<f64>,
    pub unconstrained_dp_ratio: Option<f64>,
    pub constrained_accuracy: Option<f64>,
    pub constrained_dp_ratio: Option<f64>,
}

/// Per-point means in first-seen (grid) order.
pub fn point_means(rows: &[SweepRow]) -> Vec<PointMeans> {
    let mut keys: Vec<(u64, u64)> = Vec::new();
    let mut groups: Vec<Vec<&SweepRow>> = Vec::new();
    for row in rows {
        let key = (row.flip_rate.to_bits(), row.confidence_threshold.to_bits());
        match keys.iter().position(|k| *k == key) {
            Some(i) => groups[i].push(row),
            None => {
                keys.push(key);
                groups.push(vec![row]);
            }
        }
    }

    groups
        .into_iter()
        .map(|group| {
            let ok: Vec<&SweepRow> = group.iter().copied().filter(|r| !r.is_exhausted()).collect();
            let mean = |f: fn(&SweepRow) -> Option<f64>| {
                let values: Vec<f64> = ok.iter().filter_map(|r| f(r)).collect();
                (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
            };
            PointMeans {
                flip_rate: group[0].flip_rate,
                confidence_threshold: group[0].confidence_threshold,
                trials_ok: ok.len(),
                trials_exhausted: group.len() - ok.len(),
                failures: group.iter().map(|r| r.failures).sum(),
                unconstrained_accuracy: mean(|r| r.unconstrained_accuracy),
                unconstrained_dp_ratio: mean(|r| r.unconstrained_dp_ratio),
                constrained_accuracy: mean(|r| r.constrained_accuracy),
                constrained_dp_ratio: mean(|r| r.constrained_dp_ratio),
            }
        })
        .collect()
}
