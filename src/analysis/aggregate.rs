//! Time-bucketed aggregation of ledger records.
//!
//! The aggregator folds records into per-period running totals. It never
//! resamples or fills gaps: a period exists only if some record landed in it.
//! Use `month_grid` when a gap-free grid is needed.
//!
//! Nothing is deduplicated. Feeding the same file twice counts it twice.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::domain::{
    CountKey, Granularity, LedgerRecord, MergeMode, MetricRecord, OFFER_CREATE, PAYMENT, Period, PeriodStats,
    PeriodTable, SUCCESS_CODE,
};

/// Output of `Aggregator::aggregate`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    /// Totals per tracked transaction type.
    pub by_type: BTreeMap<String, PeriodTable>,
    /// Result-code counts from pre-aggregated `result` rows.
    /// `success` holds `tesSUCCESS`, `total` the sum over all codes.
    pub results: PeriodTable,
    pub skipped_before_start: usize,
    pub skipped_undated: usize,
}

impl Aggregation {
    /// Table for one transaction type; empty if nothing was counted.
    pub fn table(&self, tx_type: &str) -> PeriodTable {
        self.by_type.get(tx_type).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    granularity: Granularity,
    start: Option<NaiveDateTime>,
    tracked_types: Vec<String>,
}

impl Aggregator {
    /// Aggregator with no start filter, tracking `Payment` and `OfferCreate`.
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            start: None,
            tracked_types: vec![PAYMENT.to_string(), OFFER_CREATE.to_string()],
        }
    }

    /// Skip anything timestamped strictly before midnight of `start`.
    pub fn since(mut self, start: NaiveDate) -> Self {
        self.start = start.and_hms_opt(0, 0, 0);
        self
    }

    fn is_tracked(&self, tx_type: &str) -> bool {
        self.tracked_types.iter().any(|t| t == tx_type)
    }

    fn admits(&self, ts: NaiveDateTime) -> bool {
        self.start.is_none_or(|start| ts >= start)
    }

    fn period_of(&self, ts: NaiveDateTime) -> Period {
        Period::containing(ts.date(), self.granularity)
    }

    /// Fold records into per-type and per-result period tables.
    ///
    /// - per-transaction records: `total += 1`, `counts[result] += 1`, and
    ///   `success += 1` when the result is `tesSUCCESS`
    /// - pre-aggregated type counts: the count is added to `total`
    /// - pre-aggregated result counts: each code is added to `results`
    pub fn aggregate(&self, records: impl IntoIterator<Item = LedgerRecord>) -> Aggregation {
        let mut out = Aggregation::default();

        for record in records {
            let Some(ts) = record.timestamp() else {
                out.skipped_undated += 1;
                continue;
            };
            if !self.admits(ts) {
                out.skipped_before_start += 1;
                continue;
            }
            let period = self.period_of(ts);

            match record {
                LedgerRecord::PerTransaction(tx) => {
                    let tx_type = tx.tx_type();
                    if !self.is_tracked(tx_type) {
                        continue;
                    }
                    let stats = out
                        .by_type
                        .entry(tx_type.to_string())
                        .or_default()
                        .entry(period)
                        .or_default();
                    stats.total += 1;
                    stats.add_count(tx.result_code(), 1);
                    if tx.result_code() == SUCCESS_CODE {
                        stats.success += 1;
                    }
                }
                LedgerRecord::PreAggregated(counts) => match counts.key {
                    CountKey::ByType => {
                        for (tx_type, n) in &counts.counts {
                            if !self.is_tracked(tx_type) {
                                continue;
                            }
                            out.by_type
                                .entry(tx_type.clone())
                                .or_default()
                                .entry(period)
                                .or_default()
                                .total += n;
                        }
                        // Tracked types absent from the row still get the period, as a zero.
                        for tx_type in &self.tracked_types {
                            out.by_type
                                .entry(tx_type.clone())
                                .or_default()
                                .entry(period)
                                .or_default();
                        }
                    }
                    CountKey::ByResult => {
                        let stats = out.results.entry(period).or_default();
                        for (code, n) in &counts.counts {
                            stats.add_count(code, *n);
                            stats.total += n;
                        }
                        stats.success += counts.get(SUCCESS_CODE);
                    }
                },
            }
        }

        debug!(
            types = out.by_type.len(),
            result_periods = out.results.len(),
            before_start = out.skipped_before_start,
            undated = out.skipped_undated,
            "aggregated"
        );
        out
    }

    /// Sum metric records of the given categories into `counts[metric_name]`.
    ///
    /// Values are rounded to whole counts.
    pub fn fold_metrics<'a>(
        &self,
        records: impl IntoIterator<Item = &'a MetricRecord>,
        categories: &[&str],
    ) -> PeriodTable {
        let mut table = PeriodTable::new();
        for record in records {
            if !categories.contains(&record.category.as_str()) || !self.admits(record.date) {
                continue;
            }
            let value = record.value.max(0.0).round() as u64;
            table
                .entry(self.period_of(record.date))
                .or_default()
                .add_count(&record.metric_name, value);
        }
        table
    }
}

/// What `merge_result_counts` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub merged: usize,
    /// Periods created because the target did not have them (upsert only).
    pub created: usize,
    /// Periods ignored because the target did not have them (existing-only).
    pub dropped: usize,
}

/// Merge success counts and the given failure codes from a result table into `target`.
///
/// Both datasets are fetched separately and need not cover the same periods.
/// With `MergeMode::Upsert` missing periods are created; with
/// `MergeMode::ExistingOnly` they are dropped and the loss is logged.
pub fn merge_result_counts(
    target: &mut PeriodTable,
    results: &PeriodTable,
    codes: &[&str],
    mode: MergeMode,
) -> MergeSummary {
    let mut summary = MergeSummary::default();

    for (period, source) in results {
        let stats = match mode {
            MergeMode::Upsert => {
                if !target.contains_key(period) {
                    summary.created += 1;
                }
                target.entry(*period).or_default()
            }
            MergeMode::ExistingOnly => match target.get_mut(period) {
                Some(stats) => stats,
                None => {
                    summary.dropped += 1;
                    continue;
                }
            },
        };
        stats.success += source.success;
        for code in codes {
            stats.add_count(code, source.metric(code));
        }
        summary.merged += 1;
    }

    if summary.dropped > 0 {
        warn!(dropped = summary.dropped, "result counts for periods missing from the target were dropped");
    }
    if summary.created > 0 {
        info!(created = summary.created, "result counts created periods missing from the target");
    }
    summary
}

/// Every period from the first to the last key of `table`, with `None` for gaps.
pub fn month_grid(table: &PeriodTable) -> Vec<(Period, Option<&PeriodStats>)> {
    let (Some(first), Some(last)) = (table.keys().next(), table.keys().next_back()) else {
        return Vec::new();
    };
    Period::range_inclusive(*first, *last)
        .into_iter()
        .map(|p| (p, table.get(&p)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CountRecord, MetricRow, PATH_DRY_CODE, PATH_PARTIAL_CODE, TransactionRecord};
    use serde_json::json;

    fn tx(date: &str, tx_type: &str, result: &str) -> LedgerRecord {
        let tx: TransactionRecord = serde_json::from_value(json!({
            "TransactionType": tx_type,
            "date": date,
            "meta": {"TransactionResult": result}
        }))
        .unwrap();
        LedgerRecord::PerTransaction(tx)
    }

    fn day(y: i32, m: u32, d: u32) -> Period {
        Period::day(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn rows(value: serde_json::Value) -> Vec<MetricRow> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn counts_totals_and_successes_per_day() {
        let records = vec![
            tx("2023-04-01T01:00:00.000Z", "Payment", "tesSUCCESS"),
            tx("2023-04-01T05:00:00.000Z", "Payment", "tecPATH_DRY"),
            tx("2023-04-02T00:00:00.000Z", "OfferCreate", "tesSUCCESS"),
            tx("2023-04-02T00:00:00.000Z", "TrustSet", "tesSUCCESS"),
        ];
        let agg = Aggregator::new(Granularity::Day).aggregate(records);

        let payment = agg.table(PAYMENT);
        let stats = &payment[&day(2023, 4, 1)];
        assert_eq!((stats.total, stats.success), (2, 1));
        assert_eq!(stats.metric(PATH_DRY_CODE), 1);
        assert_eq!(stats.metric(SUCCESS_CODE), 1);

        let offers = agg.table(OFFER_CREATE);
        assert_eq!(offers[&day(2023, 4, 2)].success, 1);
        assert!(!agg.by_type.contains_key("TrustSet"));
    }

    #[test]
    fn never_counts_records_before_start() {
        let records = vec![
            tx("2023-03-21T23:59:59.999Z", "Payment", "tesSUCCESS"),
            tx("2023-03-22T00:00:00.000Z", "Payment", "tesSUCCESS"),
        ];
        let start = NaiveDate::from_ymd_opt(2023, 3, 22).unwrap();
        let agg = Aggregator::new(Granularity::Day).since(start).aggregate(records);

        let payment = agg.table(PAYMENT);
        assert_eq!(payment.len(), 1);
        assert!(payment.keys().all(|p| p.start() >= start));
        assert_eq!(agg.skipped_before_start, 1);
    }

    #[test]
    fn month_granularity_buckets_by_calendar_month() {
        let records = vec![
            tx("2021-01-03T00:00:00.000Z", "Payment", "tesSUCCESS"),
            tx("2021-01-30T00:00:00.000Z", "Payment", "tesSUCCESS"),
            tx("2021-02-01T00:00:00.000Z", "Payment", "tesSUCCESS"),
        ];
        let payment = Aggregator::new(Granularity::Month).aggregate(records).table(PAYMENT);
        let keys: Vec<String> = payment.keys().map(Period::key).collect();
        assert_eq!(keys, ["2021-01", "2021-02"]);
        assert_eq!(payment[&Period::month(2021, 1).unwrap()].total, 2);
    }

    #[test]
    fn adds_pre_aggregated_type_counts() {
        let rows = rows(json!([
            {"date": "2023-04-01T00:00:00.000Z", "type": {"Payment": 100, "OfferCreate": 40, "AMMDeposit": 3}},
            {"date": "2023-04-02T00:00:00.000Z", "type": {"OfferCreate": 10}}
        ]));
        let records = LedgerRecord::from_metric_rows(&rows, CountKey::ByType);
        let agg = Aggregator::new(Granularity::Day).aggregate(records);

        let payment = agg.table(PAYMENT);
        assert_eq!(payment[&day(2023, 4, 1)].total, 100);
        assert_eq!(payment[&day(2023, 4, 2)].total, 0);
        assert_eq!(agg.table(OFFER_CREATE)[&day(2023, 4, 2)].total, 10);
        assert!(!agg.by_type.contains_key("AMMDeposit"));
    }

    #[test]
    fn result_rows_feed_the_result_table() {
        let rows = rows(json!([
            {"date": "2023-04-01T00:00:00.000Z", "result": {"tesSUCCESS": 90, "tecPATH_DRY": 6, "tecPATH_PARTIAL": 4}}
        ]));
        let agg = Aggregator::new(Granularity::Day).aggregate(LedgerRecord::from_metric_rows(&rows, CountKey::ByResult));
        let stats = &agg.results[&day(2023, 4, 1)];
        assert_eq!(stats.success, 90);
        assert_eq!(stats.total, 100);
        assert_eq!(stats.metric(PATH_DRY_CODE), 6);
    }

    fn result_table(day_period: Period, success: u64, partial: u64) -> PeriodTable {
        let mut stats = PeriodStats {
            success,
            ..PeriodStats::default()
        };
        stats.add_count(PATH_PARTIAL_CODE, partial);
        PeriodTable::from([(day_period, stats)])
    }

    #[test]
    fn upsert_creates_missing_periods() {
        let mut target = PeriodTable::new();
        target.entry(day(2023, 4, 1)).or_default().total = 10;

        let mut results = result_table(day(2023, 4, 1), 8, 1);
        results.extend(result_table(day(2023, 4, 2), 5, 2));

        let summary = merge_result_counts(&mut target, &results, &[PATH_PARTIAL_CODE], MergeMode::Upsert);

        assert_eq!(summary, MergeSummary { merged: 2, created: 1, dropped: 0 });
        assert_eq!(target[&day(2023, 4, 1)].success, 8);
        assert_eq!(target[&day(2023, 4, 2)].success, 5);
        assert_eq!(target[&day(2023, 4, 2)].metric(PATH_PARTIAL_CODE), 2);
    }

    #[test]
    fn existing_only_drops_and_reports() {
        let mut target = PeriodTable::new();
        target.entry(day(2023, 4, 1)).or_default().total = 10;

        let results = result_table(day(2023, 4, 2), 5, 0);
        let summary = merge_result_counts(&mut target, &results, &[], MergeMode::ExistingOnly);

        assert_eq!(summary.dropped, 1);
        assert_eq!(target.len(), 1);
    }

    #[test]
    fn folds_metric_records_by_month() {
        let rows = rows(json!([
            {"date": "2021-01-01T00:00:00.000Z", "metric": {"transaction_count": 100, "ledger_count": 20000}},
            {"date": "2021-01-02T00:00:00.000Z", "metric": {"transaction_count": 50}},
            {"date": "2021-01-02T00:00:00.000Z", "result": {"tesSUCCESS": 140}}
        ]));
        let records: Vec<MetricRecord> = rows.iter().flat_map(MetricRow::records).collect();
        let table = Aggregator::new(Granularity::Month).fold_metrics(&records, &["metric", "result"]);

        let jan = &table[&Period::month(2021, 1).unwrap()];
        assert_eq!(jan.metric("transaction_count"), 150);
        assert_eq!(jan.metric(SUCCESS_CODE), 140);

        let only_results = Aggregator::new(Granularity::Month).fold_metrics(&records, &["result"]);
        assert_eq!(only_results[&Period::month(2021, 1).unwrap()].metric("transaction_count"), 0);
    }

    #[test]
    fn month_grid_fills_gaps_with_none() {
        let mut table = PeriodTable::new();
        table.insert(Period::month(2021, 1).unwrap(), PeriodStats::default());
        table.insert(Period::month(2021, 4).unwrap(), PeriodStats::default());

        let grid = month_grid(&table);
        let keys: Vec<String> = grid.iter().map(|(p, _)| p.key()).collect();
        assert_eq!(keys, ["2021-01", "2021-02", "2021-03", "2021-04"]);
        assert!(grid[1].1.is_none() && grid[2].1.is_none());
    }

    #[test]
    fn count_records_are_decided_at_ingestion() {
        let rows = rows(json!([{"date": "2023-04-01T00:00:00.000Z", "type": {"Payment": 1}}]));
        let records = LedgerRecord::from_metric_rows(&rows, CountKey::ByType);
        assert!(matches!(
            &records[0],
            LedgerRecord::PreAggregated(CountRecord { key: CountKey::ByType, .. })
        ));
    }
}
