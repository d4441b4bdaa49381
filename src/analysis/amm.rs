//! AMM adoption against payment path failures.
//!
//! Pairs the daily number of AMM pools with the daily share of payments failing
//! with `tecPATH_PARTIAL` / `tecPATH_DRY`, drops outlier days, then compares the
//! median error ratios across equal-frequency AMM-count bins.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::analysis::ratio::ratio_key;
use crate::domain::{MetricRow, PATH_DRY_CODE, PATH_PARTIAL_CODE, Period, PeriodTable, TimeSeries};
use crate::math::{bin_index, iqr_fences, median, quantile_edges};

pub const AMM_CATEGORY: &str = "amm";
pub const AMM_COUNT: &str = "amm_count";

/// Tukey fence multiplier.
pub const OUTLIER_K: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AmmPoint {
    pub date: NaiveDate,
    pub amm_count: f64,
}

/// Daily AMM counts on or after `start`, sorted by date.
pub fn extract_amm_counts(rows: &[MetricRow], start: NaiveDate) -> Vec<AmmPoint> {
    let mut points: Vec<AmmPoint> = rows
        .iter()
        .flat_map(MetricRow::records)
        .filter(|r| r.category == AMM_CATEGORY && r.metric_name == AMM_COUNT && r.date.date() >= start)
        .map(|r| AmmPoint {
            date: r.date.date(),
            amm_count: r.value,
        })
        .collect();
    points.sort_by_key(|p| p.date);
    points
}

pub fn amm_series(points: &[AmmPoint]) -> TimeSeries {
    TimeSeries::new(
        "AMM Count",
        points.iter().map(|p| (Period::day(p.date), Some(p.amm_count))).collect(),
    )
}

/// One day with both an AMM count and payment error ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlignedDay {
    pub date: NaiveDate,
    pub amm_count: f64,
    pub partial_ratio: f64,
    pub dry_ratio: f64,
}

/// Join AMM counts with the error ratios stored on a daily payment table.
///
/// Only days present in both survive.
pub fn align(amm: &[AmmPoint], payment: &PeriodTable) -> Vec<AlignedDay> {
    let by_date: BTreeMap<NaiveDate, f64> = amm.iter().map(|p| (p.date, p.amm_count)).collect();
    let partial_key = ratio_key(PATH_PARTIAL_CODE);
    let dry_key = ratio_key(PATH_DRY_CODE);

    payment
        .iter()
        .filter_map(|(period, stats)| {
            let amm_count = *by_date.get(&period.start())?;
            Some(AlignedDay {
                date: period.start(),
                amm_count,
                partial_ratio: stats.ratios.get(&partial_key).copied().unwrap_or(0.0),
                dry_ratio: stats.ratios.get(&dry_key).copied().unwrap_or(0.0),
            })
        })
        .collect()
}

/// Drop days outside the IQR fences of the partial ratio, then of the dry ratio.
///
/// Fences for the second pass are computed on what survived the first.
pub fn remove_outliers(mut days: Vec<AlignedDay>, k: f64) -> Vec<AlignedDay> {
    let selectors: [fn(&AlignedDay) -> f64; 2] = [|d| d.partial_ratio, |d| d.dry_ratio];
    for select in selectors {
        let values: Vec<f64> = days.iter().map(select).collect();
        let Some((lo, hi)) = iqr_fences(&values, k) else {
            break;
        };
        days.retain(|d| {
            let v = select(d);
            v >= lo && v <= hi
        });
    }
    days
}

/// Median error ratios of the days falling in one AMM-count bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmmBin {
    pub label: String,
    pub amm_min: f64,
    pub amm_max: f64,
    pub partial_median: f64,
    pub dry_median: f64,
    pub days: usize,
}

/// Split days into (up to) `bins` equal-frequency AMM-count bins.
///
/// Bins that end up empty are omitted.
pub fn bin_by_amm_count(days: &[AlignedDay], bins: usize) -> Vec<AmmBin> {
    let counts: Vec<f64> = days.iter().map(|d| d.amm_count).collect();
    let edges = quantile_edges(&counts, bins);

    let mut members: Vec<Vec<&AlignedDay>> = vec![Vec::new(); edges.len().saturating_sub(1)];
    for day in days {
        if let Some(i) = bin_index(&edges, day.amm_count) {
            members[i].push(day);
        }
    }

    members
        .into_iter()
        .enumerate()
        .filter(|(_, m)| !m.is_empty())
        .filter_map(|(i, m)| {
            let amm: Vec<f64> = m.iter().map(|d| d.amm_count).collect();
            let partial: Vec<f64> = m.iter().map(|d| d.partial_ratio).collect();
            let dry: Vec<f64> = m.iter().map(|d| d.dry_ratio).collect();
            Some(AmmBin {
                label: format!("Bin {}", i + 1),
                amm_min: amm.iter().copied().fold(f64::INFINITY, f64::min),
                amm_max: amm.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                partial_median: median(&partial)?,
                dry_median: median(&dry)?,
                days: m.len(),
            })
        })
        .collect()
}
