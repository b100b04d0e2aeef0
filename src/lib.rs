//! `label-bias-sweep` library crate.
//!
//! The binary (`lbs`) is a thin wrapper around this library so that:
//!
//! - the sweep, retry and aggregation logic is testable without spawning
//!   processes
//! - data providers, learners and metrics can be swapped behind their traits

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod metrics;
pub mod models;
pub mod report;
pub mod sweep;
