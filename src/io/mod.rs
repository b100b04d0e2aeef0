//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - result table export (`export`)
//! - JSON run summary (`summary`)

pub mod export;
pub mod ingest;
pub mod summary;

pub use export::*;
pub use ingest::*;
pub use summary::*;
