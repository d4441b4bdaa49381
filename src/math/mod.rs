//! Numeric helpers: descriptive statistics and least-squares trends.

pub mod stats;
pub mod trend;

pub use stats::*;
pub use trend::*;
