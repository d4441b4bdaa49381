//! Run configuration.
//!
//! These structs are built from CLI arguments in `app` and passed down to the
//! pipelines, so nothing below `app` reads argv or the environment directly.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::data::RetryPolicy;
use crate::domain::{Granularity, MergeMode};

/// Metric categories fetched by `collect-metrics`: output file stem and endpoint name.
pub const METRIC_CATEGORIES: [(&str, &str); 4] = [
    ("aggregate_ledger", "metric"),
    ("tx_type", "type"),
    ("tx_result", "result"),
    ("amm", "amm"),
];

pub const WELL_KNOWN_FILE: &str = "well_known_accounts.json";
pub const SORTED_WELL_KNOWN_FILE: &str = "sorted_well_known_accounts.json";
pub const TRANSACTIONS_DIR: &str = "transactions";
/// Account group whose payments `analyze-cost` reads by default.
pub const DEFAULT_COST_GROUP: &str = "UPbit";

/// Settings shared by every command that talks to the explorer.
#[derive(Debug, Clone)]
pub struct CollectConfig {
    pub data_dir: PathBuf,
    pub retry: RetryPolicy,
    pub page_size: usize,
}

impl CollectConfig {
    pub fn transactions_dir(&self) -> PathBuf {
        self.data_dir.join(TRANSACTIONS_DIR)
    }
}

/// Which accounts `collect-transactions` backfills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// The `top` account groups with the most addresses, `num_tx` each.
    TopGroups { top: usize, num_tx: usize },
    /// Every well-known account, `num_tx` each, one file per account.
    AllWellKnown { num_tx: usize },
}

/// Where and how analysis results are shown.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Directory for SVG charts; no charts when unset.
    pub chart_dir: Option<PathBuf>,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    /// CSV export of the computed series.
    pub export: Option<PathBuf>,
}

/// `analyze-metrics`: monthly ledger-wide success/failure percentages.
#[derive(Debug, Clone)]
pub struct MetricsAnalysisConfig {
    pub data_dir: PathBuf,
    pub start: Option<NaiveDate>,
    pub granularity: Granularity,
    pub output: OutputConfig,
}

/// `analyze-amm`: payment path errors against AMM adoption.
#[derive(Debug, Clone)]
pub struct AmmAnalysisConfig {
    pub data_dir: PathBuf,
    pub start: NaiveDate,
    pub bins: usize,
    pub merge: MergeMode,
    /// Per-transaction file to aggregate instead of the pre-aggregated `tx_type` counts.
    pub transactions: Option<PathBuf>,
    /// Day marked on the error-ratio chart (AMM launch).
    pub marker_date: Option<NaiveDate>,
    pub output: OutputConfig,
}

/// `analyze-cost`: monthly payment fee/slippage for one account group file.
#[derive(Debug, Clone)]
pub struct CostAnalysisConfig {
    pub input: PathBuf,
    pub start: NaiveDate,
    pub output: OutputConfig,
}

/// File name for a top-group transactions file: spaces become underscores.
pub fn group_file_name(name: &str) -> String {
    format!("{}.json", file_safe(name).replace(' ', "_"))
}

/// File name for a single-account transactions file.
pub fn account_file_name(name: &str, account: &str) -> String {
    format!("{}_{}.json", file_safe(name), file_safe(account))
}

/// Explorer names are free text; keep them to a single path component.
fn file_safe(raw: &str) -> String {
    raw.chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect()
}

/// Path of a metric category file inside the data directory.
pub fn metric_file(data_dir: &Path, category: &str) -> PathBuf {
    data_dir.join(format!("{category}.json"))
}
