//! Data sources for the sweep.
//!
//! The sweep talks to its data through [`DataProvider`] only. Two providers
//! ship with the crate:
//!
//! - [`CsvDataProvider`]: header-less CSV files described by a [`DataSchema`]
//! - [`SyntheticProvider`]: a seeded two-group table, handy without real data
//!
//! Both share the label-flip routine in `bias`.

use crate::domain::Dataset;
use crate::error::AppError;
use crate::models::Classifier;

pub mod bias;
pub mod encode;
pub mod provider;
pub mod schema;
pub mod synthetic;

pub use bias::*;
pub use encode::*;
pub use provider::*;
pub use schema::*;
pub use synthetic::*;

/// Supplies the clean training/test tables and bias-injected training tables.
///
/// Implementations are shared read-only by every worker of a trial.
pub trait DataProvider: Send + Sync {
    fn training_data(&self) -> Result<Dataset, AppError>;

    fn test_data(&self) -> Result<Dataset, AppError>;

    /// Training table with a `flip_rate` fraction of eligible labels flipped.
    ///
    /// Fails with a validation error (exit code 2) when `flip_rate` is outside
    /// `[0, 1]`.
    fn training_data_label_bias(
        &self,
        flip_rate: f64,
        confidence_threshold: f64,
        reference: &dyn Classifier,
        seed: u64,
    ) -> Result<Dataset, AppError>;
}
