//! Analyses over fetched explorer data.
//!
//! - `grouping`: well-known accounts grouped by display name
//! - `aggregate`: period bucketing of transactions and count rows
//! - `ratio`: zero-safe ratios and percentages per period
//! - `cost`: per-payment fee/slippage, monthly means
//! - `amm`: AMM adoption vs. payment path failures

pub mod aggregate;
pub mod amm;
pub mod cost;
pub mod grouping;
pub mod ratio;

pub use aggregate::*;
pub use grouping::*;
pub use ratio::*;
