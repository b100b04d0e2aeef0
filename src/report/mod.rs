//! Formatted terminal output.
//!
//! We keep formatting code in one place so the sweep code stays free of
//! presentation details and output changes are localized.

pub mod format;

pub use format::*;
