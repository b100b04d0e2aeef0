//! Domain types used throughout the sweep.
//!
//! This module defines:
//!
//! - the parameter grid (`GridSpec`, `ParameterPoint`)
//! - per-point and per-trial results (`PointResult`, `SweepRow`, `TrialResult`)
//! - the encoded table shared with workers (`Dataset`)
//! - the resolved run configuration (`SweepConfig`)

pub mod types;

pub use types::*;
