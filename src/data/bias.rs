//! Label-flip bias injection.
//!
//! Given a clean training table and a reference model:
//!
//! 1. a row is *eligible* when the reference model's confidence
//!    `max(p, 1 - p)` is at most `confidence_threshold` (a threshold of 1
//!    makes every row eligible)
//! 2. exactly `round(flip_rate × eligible)` eligible rows are drawn uniformly
//!    without replacement
//! 3. their binary labels are flipped
//!
//! The draw is driven by a `StdRng` seeded from the caller's seed, so the same
//! `(table, model, rate, threshold, seed)` always flips the same rows.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;

use crate::domain::Dataset;
use crate::error::AppError;
use crate::models::Classifier;

/// Check that a flip rate is a valid probability.
pub fn validate_flip_rate(flip_rate: f64) -> Result<(), AppError> {
    if !(flip_rate.is_finite() && (0.0..=1.0).contains(&flip_rate)) {
        return Err(AppError::new(
            2,
            format!("flip_rate must be between 0 and 1 inclusive, got {flip_rate}."),
        ));
    }
    Ok(())
}

/// Return a copy of `train` with a fraction of its labels flipped.
pub fn inject_label_bias(
    train: &Dataset,
    flip_rate: f64,
    confidence_threshold: f64,
    reference: &dyn Classifier,
    seed: u64,
) -> Result<Dataset, AppError> {
    validate_flip_rate(flip_rate)?;
    if !confidence_threshold.is_finite() {
        return Err(AppError::new(2, "confidence_threshold must be finite."));
    }
    if let Some(&bad) = train.labels.iter().find(|&&l| l > 1) {
        return Err(AppError::new(
            2,
            format!("Label flipping needs binary labels, found code {bad}."),
        ));
    }

    let eligible: Vec<usize> = if confidence_threshold >= 1.0 {
        (0..train.n_rows()).collect()
    } else {
        reference
            .predict_proba(&train.features)
            .iter()
            .enumerate()
            .filter(|(_, p)| p.max(1.0 - **p) <= confidence_threshold)
            .map(|(i, _)| i)
            .collect()
    };

    let n_flip = (flip_rate * eligible.len() as f64).round() as usize;
    let mut biased = train.clone();
    if n_flip == 0 {
        return Ok(biased);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    for pick in sample(&mut rng, eligible.len(), n_flip.min(eligible.len())).iter() {
        let row = eligible[pick];
        biased.labels[row] = 1 - biased.labels[row];
    }

    Ok(biased)
}
