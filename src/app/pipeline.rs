//! Shared pipeline logic behind the `sweep` and `baseline` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! data source -> provider -> learner + metrics -> sweep (or one clean fit)
//!
//! The command handlers in `app` can then focus on presentation and export.

use crate::data::{CsvDataProvider, DataProvider, DataSchema, SyntheticProvider};
use crate::domain::{BaselineReport, DataSource, SweepConfig, SweepResult};
use crate::error::AppError;
use crate::metrics::{DemographicParityMetrics, Metrics};
use crate::models::{Classifier, Learner, LogisticLearner};
use crate::sweep::{Collaborators, ProgressObserver, SweepSettings, WorkerPool};

/// Open the configured data source. Fails fast on missing files or schema
/// problems, before any fitting starts.
pub fn open_provider(source: &DataSource, seed: u64) -> Result<Box<dyn DataProvider>, AppError> {
    match source {
        DataSource::Csv { train, test, schema } => {
            let schema = match schema {
                Some(path) => DataSchema::from_json_file(path)?,
                None => DataSchema::adult(),
            };
            Ok(Box::new(CsvDataProvider::open(schema, train, test)?))
        }
        DataSource::Synthetic { rows } => Ok(Box::new(SyntheticProvider::new(*rows, seed)?)),
    }
}

/// Run every trial of `config` and return the concatenated table.
pub fn run_sweep(
    config: &SweepConfig,
    settings: &SweepSettings,
    observer: &dyn ProgressObserver,
) -> Result<SweepResult, AppError> {
    let provider = open_provider(&config.source, config.seed)?;
    let learner = LogisticLearner::new(config.difference_bound);
    let pool = WorkerPool::new(config.workers)?;

    let deps = Collaborators {
        provider: provider.as_ref(),
        learner: &learner,
        metrics: &DemographicParityMetrics,
        observer,
    };
    crate::sweep::run_sweep(config.trial_count, &deps, settings, &pool)
}

/// Fit both models once on clean data and score them on the test table.
pub fn run_baseline(source: &DataSource, difference_bound: f64, seed: u64) -> Result<BaselineReport, AppError> {
    let provider = open_provider(source, seed)?;
    let train = provider.training_data()?;
    let test = provider.test_data()?;

    let learner = LogisticLearner::new(difference_bound);
    let model = learner.fit_baseline(&train)?;
    let constrained = learner.fit_constrained(&train)?;

    let metrics = DemographicParityMetrics;
    let unconstrained_pred = model.predict(&test.features);
    let constrained_pred = constrained.predict(&test.features);

    Ok(BaselineReport {
        train_rows: train.n_rows(),
        test_rows: test.n_rows(),
        groups: train.group_count().max(test.group_count()),
        unconstrained_accuracy: metrics.accuracy(&test.labels, &unconstrained_pred),
        unconstrained_dp_ratio: metrics.fairness_ratio(&test.labels, &unconstrained_pred, &test.sensitive),
        constrained_accuracy: metrics.accuracy(&test.labels, &constrained_pred),
        constrained_dp_ratio: metrics.fairness_ratio(&test.labels, &constrained_pred, &test.sensitive),
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::domain::{ExhaustedPolicy, GridSpec};
    use crate::sweep::NullProgress;

    fn config() -> SweepConfig {
        SweepConfig {
            source: DataSource::Synthetic { rows: 120 },
            grid: GridSpec {
                min: 0.0,
                max: 1.0,
                step: 0.5,
            },
            confidence_threshold: 1.0,
            trial_count: 2,
            workers: 2,
            max_attempts: 5,
            difference_bound: 0.05,
            seed: 11,
            on_exhausted: ExhaustedPolicy::Sentinel,
            output: PathBuf::from("unused.csv"),
            summary_json: None,
        }
    }

    #[test]
    fn synthetic_sweep_end_to_end() {
        let config = config();
        let settings = SweepSettings::from_config(&config).unwrap();
        let sweep = run_sweep(&config, &settings, &NullProgress).unwrap();

        assert_eq!(sweep.rows.len(), 2 * 3);
        assert_eq!(sweep.trials.len(), 2);
        for row in &sweep.rows {
            if let Some(acc) = row.unconstrained_accuracy {
                assert!((0.0..=1.0).contains(&acc));
            }
            if let Some(ratio) = row.constrained_dp_ratio {
                assert!((0.0..=1.0).contains(&ratio));
            }
        }
        // The clean point is identical across trials: same table, same model.
        assert_eq!(sweep.rows[0].unconstrained_accuracy, sweep.rows[3].unconstrained_accuracy);
    }

    #[test]
    fn rerun_reproduces_every_row() {
        let config = config();
        let settings = SweepSettings::from_config(&config).unwrap();
        let a = run_sweep(&config, &settings, &NullProgress).unwrap();
        let b = run_sweep(&config, &settings, &NullProgress).unwrap();
        assert_eq!(a.rows, b.rows);
    }

    #[test]
    fn baseline_on_synthetic_data() {
        let report = run_baseline(&DataSource::Synthetic { rows: 200 }, 0.01, 3).unwrap();
        assert_eq!(report.train_rows, 200);
        assert_eq!(report.test_rows, 100);
        assert_eq!(report.groups, 2);
        assert!(report.unconstrained_accuracy > 0.6);
        assert!((0.0..=1.0).contains(&report.constrained_dp_ratio));
    }

    #[test]
    fn missing_csv_fails_before_any_work() {
        let source = DataSource::Csv {
            train: PathBuf::from("/no/such/adult.data"),
            test: PathBuf::from("/no/such/adult.test"),
            schema: None,
        };
        let err = run_baseline(&source, 0.01, 0).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
