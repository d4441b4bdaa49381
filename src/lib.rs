//! `xrpscan-analytics` library crate.
//!
//! The binary (`xsa`) is a thin wrapper around this library so that:
//!
//! - fetch and analysis logic is testable without spawning processes
//! - the pipelines can be driven against a mock explorer or a fixture directory

pub mod analysis;
pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
