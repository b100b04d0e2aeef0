//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed read-only to every worker of a trial
//! - exported to CSV (one row per trial × parameter point)
//! - echoed into the JSON run summary

use std::path::PathBuf;

use clap::ValueEnum;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// One point of the sweep grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterPoint {
    pub flip_rate: f64,
    /// Currently inert: always 1 in practice, but carried through to the
    /// data provider, which still takes it.
    pub confidence_threshold: f64,
}

impl ParameterPoint {
    /// The unbiased point reuses the baseline table and reference model.
    pub fn is_unbiased(&self) -> bool {
        self.flip_rate == 0.0
    }
}

/// Flip-rate range `{min, max, step}` (both ends inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            step: 0.1,
        }
    }
}

/// Metrics of one successfully evaluated point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointResult {
    pub flip_rate: f64,
    pub confidence_threshold: f64,
    pub unconstrained_accuracy: f64,
    pub unconstrained_fairness_ratio: f64,
    pub constrained_accuracy: f64,
    pub constrained_fairness_ratio: f64,
}

/// Whether a row carries metrics or is a sentinel for an exhausted point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointStatus {
    Ok,
    Exhausted,
}

/// One row of the result table.
///
/// Sentinel rows keep the `(trial, flip_rate, confidence_threshold)` key and
/// leave every metric empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub trial: usize,
    pub flip_rate: f64,
    pub confidence_threshold: f64,
    pub unconstrained_accuracy: Option<f64>,
    pub unconstrained_dp_ratio: Option<f64>,
    pub constrained_accuracy: Option<f64>,
    pub constrained_dp_ratio: Option<f64>,
    /// Failed attempts at this point (all attempts when exhausted).
    pub failures: usize,
    pub status: PointStatus,
}

impl SweepRow {
    pub fn from_result(trial: usize, result: &PointResult, failures: usize) -> Self {
        Self {
            trial,
            flip_rate: result.flip_rate,
            confidence_threshold: result.confidence_threshold,
            unconstrained_accuracy: Some(result.unconstrained_accuracy),
            unconstrained_dp_ratio: Some(result.unconstrained_fairness_ratio),
            constrained_accuracy: Some(result.constrained_accuracy),
            constrained_dp_ratio: Some(result.constrained_fairness_ratio),
            failures,
            status: PointStatus::Ok,
        }
    }

    pub fn sentinel(trial: usize, point: &ParameterPoint, attempts: usize) -> Self {
        Self {
            trial,
            flip_rate: point.flip_rate,
            confidence_threshold: point.confidence_threshold,
            unconstrained_accuracy: None,
            unconstrained_dp_ratio: None,
            constrained_accuracy: None,
            constrained_dp_ratio: None,
            failures: attempts,
            status: PointStatus::Exhausted,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.status == PointStatus::Exhausted
    }
}

/// All rows of one trial, in grid order.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    pub trial: usize,
    pub rows: Vec<SweepRow>,
    /// Sum of per-point failure counts.
    pub failures: usize,
    /// Points that used up their retry budget.
    pub exhausted: usize,
}

/// Per-trial counters kept alongside the concatenated table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialSummary {
    pub trial: usize,
    pub points: usize,
    pub failures: usize,
    pub exhausted: usize,
}

/// Concatenation of all trials, trial-major then grid order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SweepResult {
    pub rows: Vec<SweepRow>,
    pub trials: Vec<TrialSummary>,
}

impl SweepResult {
    pub fn push_trial(&mut self, trial: TrialResult) {
        self.trials.push(TrialSummary {
            trial: trial.trial,
            points: trial.rows.len(),
            failures: trial.failures,
            exhausted: trial.exhausted,
        });
        self.rows.extend(trial.rows);
    }

    pub fn total_failures(&self) -> usize {
        self.trials.iter().map(|t| t.failures).sum()
    }

    pub fn total_exhausted(&self) -> usize {
        self.trials.iter().map(|t| t.exhausted).sum()
    }
}

/// One clean fit of both models (the `baseline` command).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineReport {
    pub train_rows: usize,
    pub test_rows: usize,
    pub groups: usize,
    pub unconstrained_accuracy: f64,
    pub unconstrained_dp_ratio: f64,
    pub constrained_accuracy: f64,
    pub constrained_dp_ratio: f64,
}

/// What to do with a point that exhausted its retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ExhaustedPolicy {
    /// Keep the key with empty metrics and `status = exhausted`.
    Sentinel,
    /// Fail the whole trial (and the run).
    FailTrial,
}

/// An encoded feature table with its label and sensitive-group columns.
///
/// `sensitive[i]` is the combined group id of row `i` (one id per distinct
/// combination of sensitive attribute values).
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub features: DMatrix<f64>,
    pub labels: Vec<u32>,
    pub sensitive: Vec<u32>,
}

impl Dataset {
    pub fn new(
        feature_names: Vec<String>,
        features: DMatrix<f64>,
        labels: Vec<u32>,
        sensitive: Vec<u32>,
    ) -> Result<Self, AppError> {
        let n = features.nrows();
        if feature_names.len() != features.ncols() {
            return Err(AppError::new(
                2,
                format!(
                    "Feature name count {} does not match column count {}.",
                    feature_names.len(),
                    features.ncols()
                ),
            ));
        }
        if labels.len() != n || sensitive.len() != n {
            return Err(AppError::new(
                2,
                format!(
                    "Column lengths disagree: rows={n}, labels={}, sensitive={}.",
                    labels.len(),
                    sensitive.len()
                ),
            ));
        }
        Ok(Self {
            feature_names,
            features,
            labels,
            sensitive,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    /// Number of group ids in use (`max id + 1`).
    pub fn group_count(&self) -> usize {
        self.sensitive.iter().max().map_or(0, |&g| g as usize + 1)
    }
}

/// Where the data comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum DataSource {
    Csv {
        train: PathBuf,
        test: PathBuf,
        /// JSON schema file; `None` means the built-in Adult schema.
        schema: Option<PathBuf>,
    },
    Synthetic {
        rows: usize,
    },
}

/// A full run's configuration as understood by the sweep.
///
/// This is derived from CLI flags, `.env` fallbacks and defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub source: DataSource,
    pub grid: GridSpec,
    pub confidence_threshold: f64,
    pub trial_count: usize,
    pub workers: usize,
    pub max_attempts: usize,
    pub difference_bound: f64,
    pub seed: u64,
    pub on_exhausted: ExhaustedPolicy,
    pub output: PathBuf,
    pub summary_json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_rows_keep_the_key_and_drop_metrics() {
        let point = ParameterPoint {
            flip_rate: 0.3,
            confidence_threshold: 1.0,
        };
        let row = SweepRow::sentinel(2, &point, 5);
        assert_eq!((row.trial, row.flip_rate, row.confidence_threshold), (2, 0.3, 1.0));
        assert!(row.unconstrained_accuracy.is_none() && row.constrained_dp_ratio.is_none());
        assert!(row.is_exhausted());
        assert_eq!(row.failures, 5);
    }

    #[test]
    fn dataset_rejects_ragged_columns() {
        let err = Dataset::new(
            vec!["a".to_string()],
            DMatrix::zeros(3, 1),
            vec![0, 1],
            vec![0, 0, 0],
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn sweep_result_concatenates_in_push_order() {
        let point = ParameterPoint {
            flip_rate: 0.0,
            confidence_threshold: 1.0,
        };
        let mut sweep = SweepResult::default();
        for trial in 1..=2 {
            sweep.push_trial(TrialResult {
                trial,
                rows: vec![SweepRow::sentinel(trial, &point, 5)],
                failures: 5,
                exhausted: 1,
            });
        }
        assert_eq!(sweep.rows.iter().map(|r| r.trial).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(sweep.total_failures(), 10);
        assert_eq!(sweep.total_exhausted(), 2);
    }
}
