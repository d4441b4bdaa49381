//! Formatted terminal output.
//!
//! All table layout lives here so the fetch and analysis code never prints.
//! Missing values render as `-`.

use std::collections::BTreeMap;

use crate::analysis::amm::AmmBin;
use crate::analysis::cost::MonthlyCost;
use crate::app::pipeline::{AmmAnalysis, MetricsCollection, SavedHistory};
use crate::domain::{AccountGroup, AmmAnalysisConfig, Period, TimeSeries};
use crate::report::TrendRow;

pub fn format_metrics_collection(out: &MetricsCollection) -> String {
    let mut s = String::new();
    s.push_str("Saved metrics:\n");
    for path in &out.saved {
        s.push_str(&format!("- {}\n", path.display()));
    }
    if !out.unavailable.is_empty() {
        s.push_str(&format!("Unavailable: {}\n", out.unavailable.join(", ")));
    }
    s
}

/// Account groups, most addresses first.
pub fn format_account_groups(groups: &[AccountGroup]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<32} {:>8} {:<36}", "name", "accounts", "first account").trim_end().to_string());
    out.push('\n');
    out.push_str(&format!("{:-<32} {:-<8} {:-<36}", "", "", ""));
    out.push('\n');
    for g in groups {
        out.push_str(
            format!(
                "{:<32} {:>8} {:<36}",
                truncate(&g.name, 32),
                g.account_count,
                g.accounts.first().map(String::as_str).unwrap_or(""),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out.push_str(&format!("{} groups\n", groups.len()));
    out
}

pub fn format_saved_histories(saved: &[SavedHistory]) -> String {
    let mut out = String::new();
    for h in saved {
        out.push_str(&format!(
            "{:<32} {:>4} account(s) {:>8} tx -> {}\n",
            truncate(&h.name, 32),
            h.accounts,
            h.transactions,
            h.path.display()
        ));
    }
    out.push_str(&format!(
        "Saved {} file(s), {} transactions\n",
        saved.len(),
        saved.iter().map(|h| h.transactions).sum::<usize>()
    ));
    out
}

/// One row per period, one column per series.
pub fn format_series_table(title: &str, series: &[TimeSeries]) -> String {
    let mut rows: BTreeMap<Period, Vec<Option<f64>>> = BTreeMap::new();
    for (col, s) in series.iter().enumerate() {
        for (period, value) in &s.points {
            rows.entry(*period).or_insert_with(|| vec![None; series.len()])[col] = *value;
        }
    }

    let mut out = format!("{title}:\n");
    let mut header = format!("{:<10}", "period");
    for s in series {
        header.push_str(&format!(" {:>14}", truncate(&s.label, 14)));
    }
    out.push_str(header.trim_end());
    out.push('\n');

    for (period, values) in rows {
        let mut line = format!("{:<10}", period.key());
        for v in values {
            line.push_str(&format!(" {:>14}", fmt_opt(v, 4)));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

pub fn format_trends(rows: &[TrendRow]) -> String {
    let mut out = String::new();
    out.push_str("Trends (least-squares slope per period):\n");
    out.push_str(
        format!(
            "{:<40} {:>7} {:>12} {:>12} {:>12} {:>12}",
            "series", "periods", "first", "last", "mean", "slope"
        )
        .trim_end(),
    );
    out.push('\n');
    for r in rows {
        out.push_str(
            format!(
                "{:<40} {:>7} {:>12} {:>12} {:>12} {:>12}",
                truncate(&r.label, 40),
                r.periods,
                fmt_opt(r.first, 4),
                fmt_opt(r.last, 4),
                fmt_opt(r.mean, 4),
                fmt_opt(r.trend.map(|t| t.slope), 6),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Monthly cost table; gap months show a zero count and no averages.
pub fn format_cost_table(months: &[MonthlyCost], payments: usize) -> String {
    let mut out = format!("Payments analyzed: {payments}\n");
    out.push_str(
        format!(
            "{:<8} {:>14} {:>14} {:>16} {:>8}",
            "month", "avg_fee", "avg_slip_%", "avg_total_cost", "count"
        )
        .trim_end(),
    );
    out.push('\n');
    for m in months {
        let avg = m.averages;
        out.push_str(
            format!(
                "{:<8} {:>14} {:>14} {:>16} {:>8}",
                m.month.key(),
                fmt_opt(avg.map(|a| a.avg_fee), 2),
                fmt_opt(avg.map(|a| a.avg_slippage_pct), 4),
                fmt_opt(avg.map(|a| a.avg_total_cost), 6),
                m.transaction_count,
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

pub fn format_amm_summary(run: &AmmAnalysis, config: &AmmAnalysisConfig) -> String {
    let mut out = String::new();
    out.push_str("=== AMM liquidity vs payment path errors ===\n");
    out.push_str(&format!("Start: {} | bins: {}\n", config.start, config.bins));
    if let (Some(first), Some(last)) = (run.amm.first(), run.amm.last()) {
        out.push_str(&format!(
            "AMM counts: n={} | {} .. {} | {:.0} -> {:.0}\n",
            run.amm.len(),
            first.date,
            last.date,
            first.amm_count,
            last.amm_count
        ));
    }
    out.push_str(&format!(
        "Payment days: {} | OfferCreate days: {}\n",
        run.payment.len(),
        run.offer_create.len()
    ));
    out.push_str(&format!(
        "Result merge ({:?}): merged={} created={} dropped={}\n",
        config.merge, run.merge.merged, run.merge.created, run.merge.dropped
    ));
    out.push_str(&format!(
        "Aligned days: {} | after outlier removal: {}\n",
        run.aligned.len(),
        run.kept.len()
    ));
    out
}

pub fn format_amm_bins(bins: &[AmmBin]) -> String {
    if bins.is_empty() {
        return "No AMM-count bins (no aligned days).\n".to_string();
    }
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<8} {:>21} {:>6} {:>16} {:>16}",
            "bin", "amm_count", "days", "partial_median", "dry_median"
        )
        .trim_end(),
    );
    out.push('\n');
    for b in bins {
        out.push_str(
            format!(
                "{:<8} {:>21} {:>6} {:>16.6} {:>16.6}",
                b.label,
                format!("{:.0}-{:.0}", b.amm_min, b.amm_max),
                b.days,
                b.partial_median,
                b.dry_median,
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(v) => format!("{v:.decimals$}"),
        None => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cost::CostAverages;

    #[test]
    fn account_groups_table() {
        let groups = vec![
            AccountGroup {
                name: "A".into(),
                accounts: vec!["r1".into(), "r2".into()],
                account_count: 2,
            },
            AccountGroup {
                name: "B".into(),
                accounts: vec!["r3".into()],
                account_count: 1,
            },
        ];
        let txt = format_account_groups(&groups);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines[0], format!("{:<32} {:>8} first account", "name", "accounts"));
        assert_eq!(lines[2], format!("{:<32} {:>8} r1", "A", 2));
        assert_eq!(lines.last(), Some(&"2 groups"));
    }

    #[test]
    fn series_table_marks_gaps() {
        let jan = Period::month(2022, 1).unwrap();
        let feb = Period::month(2022, 2).unwrap();
        let s = TimeSeries::new("pct", vec![(jan, Some(75.0)), (feb, None)]);
        let txt = format_series_table("T", &[s]);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines[0], "T:");
        assert_eq!(lines[2], format!("{:<10} {:>14}", "2022-01", "75.0000"));
        assert_eq!(lines[3], format!("{:<10} {:>14}", "2022-02", "-"));
    }

    #[test]
    fn cost_table_rows() {
        let months = vec![
            MonthlyCost {
                month: Period::month(2021, 1).unwrap(),
                transaction_count: 2,
                averages: Some(CostAverages {
                    avg_fee: 15.0,
                    avg_slippage_pct: 5.0,
                    avg_total_cost: 5.000015,
                }),
            },
            MonthlyCost {
                month: Period::month(2021, 2).unwrap(),
                transaction_count: 0,
                averages: None,
            },
        ];
        let txt = format_cost_table(&months, 2);
        assert!(txt.starts_with("Payments analyzed: 2\n"));
        let gap = txt.lines().last().unwrap();
        assert!(gap.starts_with("2021-02"));
        assert!(gap.ends_with(" 0"));
        assert_eq!(gap.matches('-').count(), 4);
    }

    #[test]
    fn truncate_long_names() {
        assert_eq!(truncate("Bitstamp", 20), "Bitstamp");
        assert_eq!(truncate("abcdefghij", 5), "abcd.");
    }
}
