//! Seeded synthetic two-group dataset.
//!
//! Each row has a group `g ∈ {0, 1}` and two standard-normal features. The
//! label is a noisy threshold of `x1 + 0.5·x2 + shift(g)`, where group 0 is
//! shifted up and group 1 down, so an unconstrained model selects group 0
//! more often. The group id is also a feature.

use nalgebra::DMatrix;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::DataProvider;
use crate::data::bias::inject_label_bias;
use crate::domain::Dataset;
use crate::error::AppError;
use crate::math::mix_seed;
use crate::models::Classifier;

/// Label shift applied to group 0 (and negated for group 1).
const GROUP_SHIFT: f64 = 0.8;

/// Standard deviation of the label noise.
const LABEL_NOISE: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    train: Dataset,
    test: Dataset,
}

impl SyntheticProvider {
    /// `rows` training rows and `rows / 2` (at least 2) test rows.
    pub fn new(rows: usize, seed: u64) -> Result<Self, AppError> {
        if rows < 2 {
            return Err(AppError::new(2, "Synthetic row count must be at least 2."));
        }
        let train = generate(rows, split_seed(seed, TRAIN_SPLIT))?;
        let test = generate((rows / 2).max(2), split_seed(seed, TEST_SPLIT))?;
        Ok(Self { train, test })
    }
}

impl DataProvider for SyntheticProvider {
    fn training_data(&self) -> Result<Dataset, AppError> {
        Ok(self.train.clone())
    }

    fn test_data(&self) -> Result<Dataset, AppError> {
        Ok(self.test.clone())
    }

    fn training_data_label_bias(
        &self,
        flip_rate: f64,
        confidence_threshold: f64,
        reference: &dyn Classifier,
        seed: u64,
    ) -> Result<Dataset, AppError> {
        inject_label_bias(&self.train, flip_rate, confidence_threshold, reference, seed)
    }
}

fn generate(rows: usize, seed: u64) -> Result<Dataset, AppError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let mut values = Vec::with_capacity(rows * 3);
    let mut labels = Vec::with_capacity(rows);
    let mut groups = Vec::with_capacity(rows);

    for i in 0..rows {
        // Alternate groups so both are always present.
        let group = (i % 2) as u32;
        let x1: f64 = normal.sample(&mut rng);
        let x2: f64 = normal.sample(&mut rng);
        let shift = if group == 0 { GROUP_SHIFT } else { -GROUP_SHIFT };
        let score = x1 + 0.5 * x2 + shift + LABEL_NOISE * normal.sample(&mut rng);

        values.extend_from_slice(&[x1, x2, f64::from(group)]);
        labels.push(u32::from(score > 0.0));
        groups.push(group);
    }

    // Two rows cannot guarantee both classes by chance; pin them.
    if labels.iter().all(|&l| l == labels[0]) {
        labels[0] = 0;
        labels[rows - 1] = 1;
    }

    Dataset::new(
        vec!["x1".to_string(), "x2".to_string(), "group".to_string()],
        DMatrix::from_row_slice(rows, 3, &values),
        labels,
        groups,
    )
}

const TRAIN_SPLIT: u64 = 0;
const TEST_SPLIT: u64 = 1;

fn split_seed(seed: u64, split: u64) -> u64 {
    mix_seed(&[seed, split])
}
