//! Input/output helpers.
//!
//! - JSON persistence of fetched data (`store`)
//! - CSV exports of computed series (`export`)

pub mod export;
pub mod store;

pub use export::*;
pub use store::*;
