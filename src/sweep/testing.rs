//! Test doubles for the sweep.
//!
//! Fixture tables carry a *marker* in feature column 0: the clean table has
//! `0.0` there and a biased table has its flip rate. Scripted learners use it
//! to tell which point a fit belongs to.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use nalgebra::DMatrix;

use crate::data::{DataProvider, inject_label_bias};
use crate::domain::Dataset;
use crate::error::AppError;
use crate::metrics::{Metrics, accuracy};
use crate::models::{Classifier, FitError, Learner};

/// Two-row, trivially separable table: `x = 0 -> 0`, `x = 1 -> 1`.
pub fn separable_rows() -> Dataset {
    Dataset::new(
        vec!["marker".to_string(), "x".to_string()],
        DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 0.0, 1.0]),
        vec![0, 1],
        vec![0, 0],
    )
    .unwrap()
}

fn marker(table: &Dataset) -> f64 {
    if table.n_rows() == 0 || table.features.ncols() == 0 {
        return f64::NAN;
    }
    table.features[(0, 0)]
}

/// Returns one fixed table; biased tables flip labels for real and stamp the
/// marker column.
pub struct FixedProvider {
    table: Dataset,
    fail_bias: bool,
    bias_calls: AtomicUsize,
}

impl FixedProvider {
    pub fn separable() -> Self {
        Self {
            table: separable_rows(),
            fail_bias: false,
            bias_calls: AtomicUsize::new(0),
        }
    }

    /// Every bias request fails with a validation error.
    pub fn failing() -> Self {
        Self {
            fail_bias: true,
            ..Self::separable()
        }
    }

    pub fn bias_calls(&self) -> usize {
        self.bias_calls.load(Ordering::SeqCst)
    }
}

impl DataProvider for FixedProvider {
    fn training_data(&self) -> Result<Dataset, AppError> {
        Ok(self.table.clone())
    }

    fn test_data(&self) -> Result<Dataset, AppError> {
        Ok(self.table.clone())
    }

    fn training_data_label_bias(
        &self,
        flip_rate: f64,
        confidence_threshold: f64,
        reference: &dyn Classifier,
        seed: u64,
    ) -> Result<Dataset, AppError> {
        self.bias_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_bias {
            return Err(AppError::new(2, "bias source unavailable"));
        }
        let mut biased = inject_label_bias(&self.table, flip_rate, confidence_threshold, reference, seed)?;
        biased.features.column_mut(0).fill(flip_rate);
        Ok(biased)
    }
}

/// Predicts `1` when feature column 1 is at least `0.5`.
#[derive(Debug, Clone, Copy)]
pub struct StubModel;

impl Classifier for StubModel {
    fn predict_proba(&self, features: &DMatrix<f64>) -> Vec<f64> {
        features
            .column(1)
            .iter()
            .map(|&x| if x >= 0.5 { 1.0 } else { 0.0 })
            .collect()
    }
}

/// A learner whose constrained fits fail on cue, per point marker.
#[derive(Default)]
pub struct ScriptedLearner {
    fail_first: HashMap<u64, usize>,
    malformed_at: Option<u64>,
    delay_early_points: bool,
    constrained_calls: Mutex<HashMap<u64, usize>>,
    fit_calls: AtomicUsize,
    unbiased_table: Mutex<Option<Dataset>>,
}

impl ScriptedLearner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `k` constrained fits at `flip_rate` (`usize::MAX`: all).
    pub fn fail_first(mut self, flip_rate: f64, k: usize) -> Self {
        self.fail_first.insert(flip_rate.to_bits(), k);
        self
    }

    pub fn malformed_at(mut self, flip_rate: f64) -> Self {
        self.malformed_at = Some(flip_rate.to_bits());
        self
    }

    /// Sleep longer for lower flip rates so early points finish last.
    pub fn delay_early_points(mut self) -> Self {
        self.delay_early_points = true;
        self
    }

    pub fn constrained_calls(&self, flip_rate: f64) -> usize {
        self.constrained_calls
            .lock()
            .unwrap()
            .get(&flip_rate.to_bits())
            .copied()
            .unwrap_or(0)
    }

    pub fn fit_calls(&self) -> usize {
        self.fit_calls.load(Ordering::SeqCst)
    }

    /// The table the constrained fit saw at the unbiased point.
    pub fn unbiased_table(&self) -> Option<Dataset> {
        self.unbiased_table.lock().unwrap().clone()
    }
}

impl Learner for ScriptedLearner {
    type Model = StubModel;
    type Constrained = StubModel;

    fn fit_baseline(&self, _train: &Dataset) -> Result<StubModel, FitError> {
        Ok(StubModel)
    }

    fn fit(&self, _train: &Dataset) -> Result<StubModel, FitError> {
        self.fit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(StubModel)
    }

    fn fit_constrained(&self, train: &Dataset) -> Result<StubModel, FitError> {
        let m = marker(train);
        let key = m.to_bits();
        let call = {
            let mut calls = self.constrained_calls.lock().unwrap();
            let entry = calls.entry(key).or_insert(0);
            *entry += 1;
            *entry
        };
        if m == 0.0 {
            *self.unbiased_table.lock().unwrap() = Some(train.clone());
        }
        if self.delay_early_points {
            std::thread::sleep(Duration::from_millis(((1.0 - m.clamp(0.0, 1.0)) * 60.0) as u64));
        }
        if self.malformed_at == Some(key) {
            return Err(FitError::Malformed("scripted".to_string()));
        }
        match self.fail_first.get(&key) {
            Some(&k) if call <= k => Err(FitError::NotConverged { iterations: 0 }),
            _ => Ok(StubModel),
        }
    }
}

/// Real accuracy, fairness ratio fixed at `1.0`.
#[derive(Debug, Clone, Copy)]
pub struct UnitRatioMetrics;

impl Metrics for UnitRatioMetrics {
    fn accuracy(&self, y_true: &[u32], y_pred: &[u32]) -> f64 {
        accuracy(y_true, y_pred)
    }

    fn fairness_ratio(&self, _y_true: &[u32], _y_pred: &[u32], _sensitive: &[u32]) -> f64 {
        1.0
    }
}
