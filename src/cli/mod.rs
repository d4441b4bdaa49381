//! Command-line parsing for the xrpscan fetch-and-analyze tool.
//!
//! Argument parsing and command dispatch stay separate from the fetch and
//! analysis code: `app` turns these structs into `domain::config` values.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::data::{Backoff, DEFAULT_PAGE_SIZE, RetryOn};
use crate::domain::{Granularity, MergeMode};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "xsa", version, about = "XRP Ledger explorer (xrpscan) data collector and analyzer")]
pub struct Cli {
    /// Directory holding fetched JSON files.
    #[arg(long, global = true, default_value = "data")]
    pub data_dir: PathBuf,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the daily ledger, type, result and AMM metrics.
    CollectMetrics(RetryArgs),
    /// Group the saved well-known accounts by name, most addresses first.
    GroupAccounts,
    /// Backfill recent transactions for well-known accounts.
    CollectTransactions(CollectTransactionsArgs),
    /// Monthly success and path-failure percentages of all ledger transactions.
    AnalyzeMetrics(AnalyzeMetricsArgs),
    /// Payment path failures against the number of AMM pools.
    AnalyzeAmm(AnalyzeAmmArgs),
    /// Monthly fees and slippage of one account group's payments.
    AnalyzeCost(AnalyzeCostArgs),
}

/// Retry behavior for explorer requests.
#[derive(Debug, Args, Clone)]
pub struct RetryArgs {
    /// Total attempts per request (first try included).
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Base delay between attempts, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    pub retry_delay_ms: u64,

    /// How the delay grows with each failed attempt.
    #[arg(long, value_enum, default_value_t = Backoff::Linear)]
    pub backoff: Backoff,

    /// `any`, or a comma-separated list of HTTP statuses worth retrying.
    #[arg(long, default_value = "any")]
    pub retry_on: RetryOn,

    /// Upper bound of the random delay added to each wait, in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub jitter_ms: u64,
}

#[derive(Debug, Args, Clone)]
pub struct CollectTransactionsArgs {
    #[command(flatten)]
    pub retry: RetryArgs,

    /// Number of account groups (by address count) to backfill.
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Sweep every well-known account instead of the top groups.
    #[arg(long)]
    pub all: bool,

    /// Transactions per account [default: 10000, or 100 with --all].
    #[arg(long)]
    pub num_tx: Option<usize>,

    /// Page size requested from the explorer.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

/// Where analysis results go.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Write SVG charts into this directory.
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Export the computed series to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct AnalyzeMetricsArgs {
    /// Ignore rows before this date (YYYY-MM-DD).
    #[arg(long)]
    pub start: Option<NaiveDate>,

    #[arg(long, value_enum, default_value_t = Granularity::Month)]
    pub granularity: Granularity,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct AnalyzeAmmArgs {
    /// First day analyzed (YYYY-MM-DD).
    #[arg(long, default_value = "2023-03-22")]
    pub start: NaiveDate,

    /// Number of equal-frequency AMM-count bins.
    #[arg(long, default_value_t = 10)]
    pub bins: usize,

    /// How result counts for days missing from the payment table are handled.
    #[arg(long, value_enum, default_value_t = MergeMode::Upsert)]
    pub merge: MergeMode,

    /// Aggregate this per-transaction file instead of the daily `tx_type` counts.
    #[arg(long, value_name = "JSON")]
    pub transactions: Option<PathBuf>,

    /// Day marked on the error-ratio chart.
    #[arg(long, default_value = "2024-03-22")]
    pub marker_date: NaiveDate,

    /// Do not mark any day.
    #[arg(long)]
    pub no_marker: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct AnalyzeCostArgs {
    /// Transactions file [default: <data-dir>/transactions/UPbit.json].
    #[arg(long, value_name = "JSON")]
    pub input: Option<PathBuf>,

    /// Ignore payments before this date (YYYY-MM-DD).
    #[arg(long, default_value = "2021-01-01")]
    pub start: NaiveDate,

    #[command(flatten)]
    pub output: OutputArgs,
}
