//! Top-level application orchestration.
//!
//! `src/main.rs` only maps the result to an exit code; this module is the "real
//! main" that:
//! - parses CLI arguments and sets up logging
//! - builds run configuration and the explorer client
//! - runs the requested pipeline
//! - prints reports/plots and writes charts and exports

use std::fs;
use std::path::Path;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{
    AnalyzeAmmArgs, AnalyzeCostArgs, AnalyzeMetricsArgs, Command, CollectTransactionsArgs, OutputArgs, RetryArgs,
};
use crate::data::{ExplorerClient, RetryPolicy};
use crate::domain::{
    AmmAnalysisConfig, CollectConfig, CostAnalysisConfig, DEFAULT_COST_GROUP, MetricsAnalysisConfig, OutputConfig,
    Sweep, TRANSACTIONS_DIR, TimeSeries, group_file_name,
};
use crate::error::{AppError, EXIT_INPUT};
use crate::plot::{LineChart, Marker, render_series_plot, write_svg_chart};

pub mod pipeline;

/// Entry point for the `xsa` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_tracing(&cli.log_level);

    let data_dir = cli.data_dir;
    match cli.command {
        Command::CollectMetrics(args) => handle_collect_metrics(&data_dir, &args),
        Command::GroupAccounts => handle_group_accounts(&data_dir),
        Command::CollectTransactions(args) => handle_collect_transactions(&data_dir, &args),
        Command::AnalyzeMetrics(args) => handle_analyze_metrics(&data_dir, &args),
        Command::AnalyzeAmm(args) => handle_analyze_amm(&data_dir, &args),
        Command::AnalyzeCost(args) => handle_analyze_cost(&data_dir, &args),
    }
}

/// Log to stderr so stdout carries only reports. `RUST_LOG` wins over `level`.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed (tests); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_collect_metrics(data_dir: &Path, args: &RetryArgs) -> Result<(), AppError> {
    let client = ExplorerClient::from_env(retry_policy_from_args(args))?;
    info!(base_url = client.base_url(), "collecting metrics");
    let out = pipeline::collect_metrics(&client, data_dir)?;
    println!("{}", crate::report::format_metrics_collection(&out));
    Ok(())
}

fn handle_group_accounts(data_dir: &Path) -> Result<(), AppError> {
    let groups = pipeline::group_accounts(data_dir)?;
    println!("{}", crate::report::format_account_groups(&groups));
    Ok(())
}

fn handle_collect_transactions(data_dir: &Path, args: &CollectTransactionsArgs) -> Result<(), AppError> {
    let (config, sweep) = collect_config_from_args(data_dir, args);
    let client = ExplorerClient::from_env(config.retry.clone())?;
    info!(base_url = client.base_url(), ?sweep, "collecting transactions");
    let saved = pipeline::collect_transactions(&client, &config, sweep)?;
    println!("{}", crate::report::format_saved_histories(&saved));
    Ok(())
}

fn handle_analyze_metrics(data_dir: &Path, args: &AnalyzeMetricsArgs) -> Result<(), AppError> {
    let config = MetricsAnalysisConfig {
        data_dir: data_dir.to_path_buf(),
        start: args.start,
        granularity: args.granularity,
        output: output_config_from_args(&args.output),
    };
    let run = pipeline::analyze_metrics(&config)?;

    let mut all = run.percentages.clone();
    all.extend(run.counts.iter().cloned());
    println!("{}", crate::report::format_series_table("Ledger transaction results", &all));
    println!(
        "{}",
        crate::report::format_trends(&crate::report::summarize_trends(&all))
    );

    let figures = [
        Figure::new("success_trend.svg", "Successful Transactions (%)", "Percentage (%)", &run.percentages[..1]),
        Figure::new(
            "partial_trend.svg",
            "Paths with not enough liquidity / Total Transactions (%)",
            "Percentage (%)",
            &run.percentages[1..2],
        ),
        Figure::new(
            "dry_trend.svg",
            "Insufficient liquidity / Total Transactions (%)",
            "Percentage (%)",
            &run.percentages[2..],
        ),
        Figure::new("tecpath_partial_counts.svg", "tecPATH_PARTIAL Counts Over Time", "Count", &run.counts[..1]),
        Figure::new("tecpath_dry_counts.svg", "tecPATH_DRY Counts Over Time", "Count", &run.counts[1..]),
    ];
    emit_figures(&config.output, &figures)?;

    if let Some(path) = &config.output.export {
        crate::io::write_series_csv(path, &all)?;
    }
    Ok(())
}

fn handle_analyze_amm(data_dir: &Path, args: &AnalyzeAmmArgs) -> Result<(), AppError> {
    let config = amm_config_from_args(data_dir, args);
    let run = pipeline::analyze_amm(&config)?;

    println!("{}", crate::report::format_amm_summary(&run, &config));
    println!("{}", crate::report::format_amm_bins(&run.bins));

    let overview = run.overview_series();
    let ratios = run.error_ratio_series();
    println!("{}", crate::report::format_trends(&crate::report::summarize_trends(&ratios)));

    let mut figures = vec![
        Figure::new("amm_count.svg", "AMM Count Over Time", "AMM Count", &overview[..1]),
        Figure::new(
            "payment_success_ratio.svg",
            "Payment Success Ratio Over Time",
            "Success Ratio",
            &overview[1..2],
        ),
        Figure::new(
            "offercreate_totals.svg",
            "OfferCreate Total Transactions Over Time",
            "Total Transactions",
            &overview[2..3],
        ),
        Figure::new(
            "payment_totals.svg",
            "Payment Total and Successful Transactions Over Time",
            "Transactions",
            &overview[3..],
        ),
    ];
    let mut error_ratios = Figure::new(
        "liquidity_before_and_after_AMM.svg",
        "Error Ratios of tecPATH_PARTIAL and tecPATH_DRY Over Time",
        "Error Ratio",
        &ratios,
    );
    error_ratios.marker = config.marker_date.map(|date| Marker { date, label: "add AMM" });
    figures.push(error_ratios);
    emit_figures(&config.output, &figures)?;

    if let Some(path) = &config.output.export {
        let mut all = overview.clone();
        all.extend(ratios.iter().cloned());
        crate::io::write_series_csv(path, &all)?;
    }
    Ok(())
}

fn handle_analyze_cost(data_dir: &Path, args: &AnalyzeCostArgs) -> Result<(), AppError> {
    let config = cost_config_from_args(data_dir, args);
    let run = pipeline::analyze_cost(&config)?;

    println!("{}", crate::report::format_cost_table(&run.months, run.payments));
    let series = run.series();
    println!("{}", crate::report::format_trends(&crate::report::summarize_trends(&series)));

    let figures = [
        Figure::new("avg_fee.svg", "Average Fee per Month", "Average Fee (drops)", &series[..1]),
        Figure::new(
            "avg_slippage.svg",
            "Average Slippage per Month",
            "Average Slippage (%)",
            &series[1..2],
        ),
        Figure::new(
            "avg_total_cost.svg",
            "Average Total Cost per Month",
            "Average Total Cost (Currency)",
            &series[2..3],
        ),
        Figure::new(
            "transaction_count.svg",
            "Monthly Transaction Count",
            "Transaction Count",
            &series[3..],
        ),
    ];
    emit_figures(&config.output, &figures)?;

    if let Some(path) = &config.output.export {
        crate::io::write_monthly_cost_csv(path, &run.months)?;
    }
    Ok(())
}

/// One chart: shown as an ASCII plot and/or written as SVG.
struct Figure<'a> {
    file: &'a str,
    title: &'a str,
    y_desc: &'a str,
    series: &'a [TimeSeries],
    marker: Option<Marker<'a>>,
}

impl<'a> Figure<'a> {
    fn new(file: &'a str, title: &'a str, y_desc: &'a str, series: &'a [TimeSeries]) -> Self {
        Self {
            file,
            title,
            y_desc,
            series,
            marker: None,
        }
    }
}

fn emit_figures(output: &OutputConfig, figures: &[Figure<'_>]) -> Result<(), AppError> {
    if output.plot {
        for fig in figures {
            println!(
                "{}",
                render_series_plot(fig.title, fig.series, output.plot_width, output.plot_height)
            );
        }
    }

    let Some(dir) = &output.chart_dir else {
        return Ok(());
    };
    fs::create_dir_all(dir)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to create directory '{}': {e}", dir.display())))?;
    for fig in figures {
        let chart = LineChart {
            title: fig.title,
            y_desc: fig.y_desc,
            series: fig.series,
            marker: fig.marker,
        };
        write_svg_chart(&dir.join(fig.file), &chart)?;
    }
    Ok(())
}

pub fn retry_policy_from_args(args: &RetryArgs) -> RetryPolicy {
    RetryPolicy {
        max_attempts: args.retries.max(1),
        base_delay: Duration::from_millis(args.retry_delay_ms),
        backoff: args.backoff,
        retry_on: args.retry_on.clone(),
        jitter: Duration::from_millis(args.jitter_ms),
    }
}

pub fn collect_config_from_args(data_dir: &Path, args: &CollectTransactionsArgs) -> (CollectConfig, Sweep) {
    let config = CollectConfig {
        data_dir: data_dir.to_path_buf(),
        retry: retry_policy_from_args(&args.retry),
        page_size: args.page_size.max(1),
    };
    let sweep = if args.all {
        Sweep::AllWellKnown {
            num_tx: args.num_tx.unwrap_or(100),
        }
    } else {
        Sweep::TopGroups {
            top: args.top,
            num_tx: args.num_tx.unwrap_or(10_000),
        }
    };
    (config, sweep)
}

pub fn output_config_from_args(args: &OutputArgs) -> OutputConfig {
    OutputConfig {
        chart_dir: args.out_dir.clone(),
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export: args.export.clone(),
    }
}

pub fn amm_config_from_args(data_dir: &Path, args: &AnalyzeAmmArgs) -> AmmAnalysisConfig {
    AmmAnalysisConfig {
        data_dir: data_dir.to_path_buf(),
        start: args.start,
        bins: args.bins.max(1),
        merge: args.merge,
        transactions: args.transactions.clone(),
        marker_date: (!args.no_marker).then_some(args.marker_date),
        output: output_config_from_args(&args.output),
    }
}

pub fn cost_config_from_args(data_dir: &Path, args: &AnalyzeCostArgs) -> CostAnalysisConfig {
    let input = args
        .input
        .clone()
        .unwrap_or_else(|| data_dir.join(TRANSACTIONS_DIR).join(group_file_name(DEFAULT_COST_GROUP)));
    CostAnalysisConfig {
        input,
        start: args.start,
        output: output_config_from_args(&args.output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::data::{Backoff, RetryOn};
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("xsa").chain(args.iter().copied()))
    }

    #[test]
    fn retry_flags_become_policy() {
        let Command::CollectMetrics(args) = parse(&[
            "collect-metrics",
            "--retries",
            "4",
            "--retry-delay-ms",
            "250",
            "--backoff",
            "none",
            "--jitter-ms",
            "10",
        ])
        .command
        else {
            panic!("wrong subcommand");
        };
        let policy = retry_policy_from_args(&args);
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.backoff, Backoff::None);
        assert_eq!(policy.retry_on, RetryOn::Any);
        assert_eq!(policy.jitter, Duration::from_millis(10));
    }

    #[test]
    fn sweep_defaults_depend_on_mode() {
        let Command::CollectTransactions(args) = parse(&["collect-transactions"]).command else {
            panic!("wrong subcommand");
        };
        let (config, sweep) = collect_config_from_args(Path::new("d"), &args);
        assert_eq!(sweep, Sweep::TopGroups { top: 5, num_tx: 10_000 });
        assert_eq!(config.transactions_dir(), PathBuf::from("d/transactions"));

        let Command::CollectTransactions(args) = parse(&["collect-transactions", "--all"]).command else {
            panic!("wrong subcommand");
        };
        assert_eq!(collect_config_from_args(Path::new("d"), &args).1, Sweep::AllWellKnown { num_tx: 100 });
    }

    #[test]
    fn cost_input_defaults_to_upbit_group_file() {
        let Command::AnalyzeCost(args) = parse(&["analyze-cost", "--no-plot"]).command else {
            panic!("wrong subcommand");
        };
        let config = cost_config_from_args(Path::new("data"), &args);
        assert_eq!(config.input, PathBuf::from("data/transactions/UPbit.json"));
        assert!(!config.output.plot);
    }

    #[test]
    fn no_marker_clears_marker_date() {
        let Command::AnalyzeAmm(args) = parse(&["analyze-amm", "--no-marker"]).command else {
            panic!("wrong subcommand");
        };
        assert_eq!(amm_config_from_args(Path::new("data"), &args).marker_date, None);
    }

    #[test]
    fn figures_are_written_as_svg() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig {
            chart_dir: Some(dir.path().join("charts")),
            plot: false,
            plot_width: 80,
            plot_height: 20,
            export: None,
        };
        let series = [TimeSeries::new(
            "s",
            vec![(crate::domain::Period::month(2022, 1).unwrap(), Some(1.0))],
        )];
        emit_figures(&output, &[Figure::new("s.svg", "S", "y", &series)]).unwrap();
        assert!(dir.path().join("charts").join("s.svg").exists());
    }
}
