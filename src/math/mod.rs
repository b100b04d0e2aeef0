//! Mathematical utilities: stable logistic functions, the Newton solve and
//! seed mixing.

pub mod linalg;
pub mod logistic;
pub mod seed;

pub use linalg::*;
pub use logistic::*;
pub use seed::*;
