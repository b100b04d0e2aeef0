//! The sweep driver.
//!
//! Responsibilities:
//!
//! - build the flip-rate × confidence-threshold grid
//! - run each trial: reference model, parallel point evaluation with bounded
//!   retry, ordered gather
//! - run trials `1..=T` sequentially and concatenate their tables
//!
//! Parallelism lives inside a trial only; one [`WorkerPool`] serves every
//! trial of a run.

use crate::data::DataProvider;
use crate::domain::{ExhaustedPolicy, ParameterPoint, SweepConfig};
use crate::error::AppError;
use crate::metrics::Metrics;
use crate::models::Learner;

pub mod aggregate;
pub mod evaluator;
pub mod grid;
pub mod pool;
pub mod progress;
pub mod trial;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::*;
pub use evaluator::*;
pub use grid::*;
pub use pool::*;
pub use progress::*;
pub use trial::*;

/// The external collaborators every trial talks to.
pub struct Collaborators<'a, L: Learner> {
    pub provider: &'a dyn DataProvider,
    pub learner: &'a L,
    pub metrics: &'a dyn Metrics,
    pub observer: &'a dyn ProgressObserver,
}

/// Per-run settings shared by all trials.
#[derive(Debug, Clone)]
pub struct SweepSettings {
    pub grid: Vec<ParameterPoint>,
    pub retry: RetryPolicy,
    pub on_exhausted: ExhaustedPolicy,
    /// Base seed for every attempt's bias draw.
    pub seed: u64,
}

impl SweepSettings {
    pub fn from_config(config: &SweepConfig) -> Result<Self, AppError> {
        Ok(Self {
            grid: build_grid(&config.grid, config.confidence_threshold)?,
            retry: RetryPolicy::new(config.max_attempts)?,
            on_exhausted: config.on_exhausted,
            seed: config.seed,
        })
    }
}
