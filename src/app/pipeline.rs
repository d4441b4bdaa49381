//! Fetch and analysis workflows behind each subcommand.
//!
//! Every function here returns computed outputs; printing, plotting and exports
//! are left to `app` so the workflows stay testable against a mock explorer and
//! temporary data directories.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::analysis::amm::{
    AlignedDay, AmmBin, AmmPoint, OUTLIER_K, align, amm_series, bin_by_amm_count, extract_amm_counts,
    remove_outliers,
};
use crate::analysis::cost::{MonthlyCost, cost_series, monthly_cost_metrics, payment_costs};
use crate::analysis::{
    Aggregator, MergeSummary, Scale, annotate_error_ratios, group_and_count_accounts, merge_result_counts,
    metric_ratio, metric_series, month_grid, payment_success_ratio, ratio_key, ratio_series,
};
use crate::data::{ExplorerClient, Paginator};
use crate::domain::{
    AccountGroup, AmmAnalysisConfig, CollectConfig, CostAnalysisConfig, CountKey, Granularity, LedgerRecord,
    METRIC_CATEGORIES, MetricRecord, MetricRow, MetricsAnalysisConfig, OFFER_CREATE, PATH_DRY_CODE,
    PATH_PARTIAL_CODE, PAYMENT, PeriodTable, SORTED_WELL_KNOWN_FILE, SUCCESS_CODE, Sweep, TimeSeries,
    TransactionFile, TransactionRecord, WELL_KNOWN_FILE, WellKnownAccount, account_file_name, group_file_name,
    metric_file,
};
use crate::error::{AppError, EXIT_ANALYSIS, EXIT_FETCH};
use crate::io::{read_json, write_json_pretty};

/// Metric name of the ledger-wide daily transaction count.
const TRANSACTION_COUNT: &str = "transaction_count";

/// Files written by `collect_metrics`, and the metric types that returned nothing.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollection {
    pub saved: Vec<PathBuf>,
    pub unavailable: Vec<String>,
}

/// Fetch every metric category and save it as `<category>.json`.
///
/// A category that cannot be fetched is skipped; the run fails only when none could.
pub fn collect_metrics(client: &ExplorerClient, data_dir: &Path) -> Result<MetricsCollection, AppError> {
    let mut out = MetricsCollection::default();
    for (category, metric_type) in METRIC_CATEGORIES {
        match client.fetch_metrics(metric_type) {
            Some(rows) => {
                let path = metric_file(data_dir, category);
                write_json_pretty(&path, &rows)?;
                info!(metric_type, rows = rows.len(), "metrics saved");
                out.saved.push(path);
            }
            None => {
                warn!(metric_type, "failed to fetch metrics");
                out.unavailable.push(metric_type.to_string());
            }
        }
    }
    if out.saved.is_empty() {
        return Err(AppError::new(EXIT_FETCH, "No metrics could be fetched from the explorer."));
    }
    Ok(out)
}

/// Group the saved well-known accounts and write the sorted groups next to them.
pub fn group_accounts(data_dir: &Path) -> Result<Vec<AccountGroup>, AppError> {
    let entries: Vec<WellKnownAccount> = read_json(&data_dir.join(WELL_KNOWN_FILE))?;
    let groups = group_and_count_accounts(&entries);
    write_json_pretty(&data_dir.join(SORTED_WELL_KNOWN_FILE), &groups)?;
    Ok(groups)
}

/// One transactions file written by `collect_transactions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedHistory {
    pub path: PathBuf,
    pub name: String,
    pub accounts: usize,
    pub transactions: usize,
}

/// Fetch the well-known accounts, then backfill transaction histories per `sweep`.
///
/// Each file is written as soon as its accounts are done, so an interrupted run
/// keeps everything finished before it.
pub fn collect_transactions(
    client: &ExplorerClient,
    config: &CollectConfig,
    sweep: Sweep,
) -> Result<Vec<SavedHistory>, AppError> {
    let entries = client
        .fetch_well_known()
        .ok_or_else(|| AppError::new(EXIT_FETCH, "Well-known accounts could not be fetched."))?;
    write_json_pretty(&config.data_dir.join(WELL_KNOWN_FILE), &entries)?;

    let paginator = Paginator::new(client, config.page_size);
    let dir = config.transactions_dir();
    let mut saved = Vec::new();

    match sweep {
        Sweep::TopGroups { top, num_tx } => {
            let groups = group_and_count_accounts(&entries);
            write_json_pretty(&config.data_dir.join(SORTED_WELL_KNOWN_FILE), &groups)?;

            for group in groups.iter().take(top) {
                let mut histories: BTreeMap<String, Vec<TransactionRecord>> = BTreeMap::new();
                for account in &group.accounts {
                    info!(name = %group.name, account = %account, num_tx, "fetching transactions");
                    histories.insert(account.clone(), paginator.fetch_all(account, num_tx));
                }
                let transactions = histories.values().map(Vec::len).sum();
                let path = dir.join(group_file_name(&group.name));
                write_json_pretty(&path, &TransactionFile::ByAccount(histories))?;
                saved.push(SavedHistory {
                    path,
                    name: group.name.clone(),
                    accounts: group.accounts.len(),
                    transactions,
                });
            }
        }
        Sweep::AllWellKnown { num_tx } => {
            for entry in &entries {
                let (Some(name), Some(account)) = (entry.name.as_deref(), entry.account.as_deref()) else {
                    warn!("skipping well-known entry without name or account");
                    continue;
                };
                info!(name, account, num_tx, "fetching transactions");
                let history = paginator.fetch_all(account, num_tx);
                let transactions = history.len();
                let path = dir.join(account_file_name(name, account));
                write_json_pretty(&path, &TransactionFile::Flat(history))?;
                saved.push(SavedHistory {
                    path,
                    name: name.to_string(),
                    accounts: 1,
                    transactions,
                });
            }
        }
    }
    Ok(saved)
}

/// Ledger-wide result percentages and raw failure counts.
#[derive(Debug, Clone)]
pub struct MetricsAnalysis {
    pub table: PeriodTable,
    /// Success, path-partial and path-dry shares of all transactions (%).
    pub percentages: Vec<TimeSeries>,
    /// Raw path-partial and path-dry counts.
    pub counts: Vec<TimeSeries>,
}

/// Fold `aggregate_ledger.json` and `tx_result.json` into periods and derive the trends.
pub fn analyze_metrics(config: &MetricsAnalysisConfig) -> Result<MetricsAnalysis, AppError> {
    let ledger: Vec<MetricRow> = read_json(&metric_file(&config.data_dir, "aggregate_ledger"))?;
    let results: Vec<MetricRow> = read_json(&metric_file(&config.data_dir, "tx_result"))?;

    let records: Vec<MetricRecord> = ledger.iter().chain(&results).flat_map(MetricRow::records).collect();
    let mut aggregator = Aggregator::new(config.granularity);
    if let Some(start) = config.start {
        aggregator = aggregator.since(start);
    }
    let table = aggregator.fold_metrics(&records, &["metric", "result"]);
    if table.is_empty() {
        return Err(AppError::new(EXIT_ANALYSIS, "No ledger metrics to analyze."));
    }

    let pct = |code: &str, label: &str| {
        let mut s = on_grid(&table, metric_ratio(&table, code, TRANSACTION_COUNT, Scale::Percent));
        s.label = label.to_string();
        s
    };
    let percentages = vec![
        pct(SUCCESS_CODE, "Successful Transactions (%)"),
        pct(PATH_PARTIAL_CODE, "tecPATH_PARTIAL / Total Transactions (%)"),
        pct(PATH_DRY_CODE, "tecPATH_DRY / Total Transactions (%)"),
    ];
    let counts = vec![
        on_grid(&table, metric_series(&table, PATH_PARTIAL_CODE)),
        on_grid(&table, metric_series(&table, PATH_DRY_CODE)),
    ];

    Ok(MetricsAnalysis {
        table,
        percentages,
        counts,
    })
}

/// Re-key `series` onto the gap-free period grid of `table`; missing periods become `None`.
fn on_grid(table: &PeriodTable, series: TimeSeries) -> TimeSeries {
    let values: BTreeMap<_, _> = series.points.into_iter().collect();
    let points = month_grid(table)
        .into_iter()
        .map(|(p, _)| (p, values.get(&p).copied().flatten()))
        .collect();
    TimeSeries::new(series.label, points)
}

/// AMM adoption against payment path failures.
#[derive(Debug, Clone)]
pub struct AmmAnalysis {
    pub amm: Vec<AmmPoint>,
    pub payment: PeriodTable,
    pub offer_create: PeriodTable,
    pub merge: MergeSummary,
    /// Days with both an AMM count and payment data, before outlier removal.
    pub aligned: Vec<AlignedDay>,
    pub kept: Vec<AlignedDay>,
    pub bins: Vec<AmmBin>,
}

impl AmmAnalysis {
    /// AMM count, payment success ratio, OfferCreate totals and payment totals/successes.
    pub fn overview_series(&self) -> Vec<TimeSeries> {
        let mut offers = metric_series(&self.offer_create, "total");
        offers.label = "OfferCreate Total Transactions".to_string();
        let mut totals = metric_series(&self.payment, "total");
        totals.label = "Payment Total Transactions".to_string();
        let mut successes = metric_series(&self.payment, "success");
        successes.label = "Payment Successful Transactions".to_string();
        vec![
            amm_series(&self.amm),
            payment_success_ratio(&self.payment, &self.offer_create),
            offers,
            totals,
            successes,
        ]
    }

    /// Daily path-partial and path-dry ratios of payments.
    pub fn error_ratio_series(&self) -> Vec<TimeSeries> {
        [PATH_PARTIAL_CODE, PATH_DRY_CODE]
            .into_iter()
            .map(|code| {
                let mut s = ratio_series(&self.payment, &ratio_key(code));
                s.label = format!("{code} Ratio");
                s
            })
            .collect()
    }
}

/// Daily payment statistics from `tx_type.json` (or a per-transaction file) and
/// `tx_result.json`, aligned with `amm.json` and binned by AMM count.
pub fn analyze_amm(config: &AmmAnalysisConfig) -> Result<AmmAnalysis, AppError> {
    let amm_rows: Vec<MetricRow> = read_json(&metric_file(&config.data_dir, "amm"))?;
    let amm = extract_amm_counts(&amm_rows, config.start);
    if amm.is_empty() {
        return Err(AppError::new(
            EXIT_ANALYSIS,
            format!("No AMM counts on or after {}.", config.start),
        ));
    }

    let aggregator = Aggregator::new(Granularity::Day).since(config.start);
    let per_transaction = config.transactions.is_some();
    let records = match &config.transactions {
        Some(path) => LedgerRecord::from_transactions(read_json::<TransactionFile>(path)?.into_records()),
        None => {
            let rows: Vec<MetricRow> = read_json(&metric_file(&config.data_dir, "tx_type"))?;
            LedgerRecord::from_metric_rows(&rows, CountKey::ByType)
        }
    };
    let by_type = aggregator.aggregate(records);
    let mut payment = by_type.table(PAYMENT);
    let offer_create = by_type.table(OFFER_CREATE);

    let codes = [PATH_PARTIAL_CODE, PATH_DRY_CODE];
    let merge = if per_transaction {
        // Result codes come from the same transactions as the totals.
        MergeSummary::default()
    } else {
        let result_rows: Vec<MetricRow> = read_json(&metric_file(&config.data_dir, "tx_result"))?;
        let results = aggregator
            .aggregate(LedgerRecord::from_metric_rows(&result_rows, CountKey::ByResult))
            .results;
        merge_result_counts(&mut payment, &results, &codes, config.merge)
    };
    annotate_error_ratios(&mut payment, &codes);

    let aligned = align(&amm, &payment);
    let kept = remove_outliers(aligned.clone(), OUTLIER_K);
    let bins = bin_by_amm_count(&kept, config.bins);
    info!(
        aligned = aligned.len(),
        kept = kept.len(),
        bins = bins.len(),
        "amm analysis done"
    );

    Ok(AmmAnalysis {
        amm,
        payment,
        offer_create,
        merge,
        aligned,
        kept,
        bins,
    })
}

/// Monthly payment cost for one transactions file.
#[derive(Debug, Clone)]
pub struct CostAnalysis {
    pub payments: usize,
    pub months: Vec<MonthlyCost>,
}

impl CostAnalysis {
    pub fn series(&self) -> Vec<TimeSeries> {
        cost_series(&self.months)
    }
}

pub fn analyze_cost(config: &CostAnalysisConfig) -> Result<CostAnalysis, AppError> {
    let records = read_json::<TransactionFile>(&config.input)?.into_records();
    let costs = payment_costs(&records, config.start);
    if costs.is_empty() {
        return Err(AppError::new(
            EXIT_ANALYSIS,
            format!("No payments on or after {} in '{}'.", config.start, config.input.display()),
        ));
    }
    Ok(CostAnalysis {
        payments: costs.len(),
        months: monthly_cost_metrics(&costs),
    })
}
