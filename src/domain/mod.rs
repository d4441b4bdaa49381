//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw explorer records (`TransactionRecord`, `MetricRow`, `WellKnownAccount`)
//! - the tagged aggregator input (`LedgerRecord`)
//! - period accumulators and series (`Period`, `PeriodStats`, `TimeSeries`)
//! - run configuration (`config`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
