//! Ratios and percentages derived from period tables.
//!
//! A zero denominator always yields 0. Results are chronological because
//! `PeriodTable` is ordered by period.

use crate::domain::{PeriodTable, TimeSeries};

/// Fraction in `[0, 1]` or percentage in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Fraction,
    Percent,
}

impl Scale {
    fn factor(self) -> f64 {
        match self {
            Scale::Fraction => 1.0,
            Scale::Percent => 100.0,
        }
    }
}

/// `numerator / denominator`, or 0 when the denominator is 0 or the result is not finite.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let r = numerator / denominator;
    if r.is_finite() { r } else { 0.0 }
}

/// Ratio of two metrics per period (see `PeriodStats::metric` for names).
pub fn metric_ratio(table: &PeriodTable, numerator: &str, denominator: &str, scale: Scale) -> TimeSeries {
    let points = table
        .iter()
        .map(|(period, stats)| {
            let r = ratio(stats.metric(numerator) as f64, stats.metric(denominator) as f64);
            (*period, Some(r * scale.factor()))
        })
        .collect();
    TimeSeries::new(format!("{numerator} / {denominator}"), points)
}

/// Raw metric values per period.
pub fn metric_series(table: &PeriodTable, metric: &str) -> TimeSeries {
    let points = table
        .iter()
        .map(|(period, stats)| (*period, Some(stats.metric(metric) as f64)))
        .collect();
    TimeSeries::new(metric, points)
}

/// Name under which `annotate_error_ratios` stores a code's ratio.
pub fn ratio_key(code: &str) -> String {
    format!("{code}_ratio")
}

/// Store `counts[code] / total` for each code in every period's `ratios`.
pub fn annotate_error_ratios(table: &mut PeriodTable, codes: &[&str]) {
    for stats in table.values_mut() {
        for code in codes {
            let r = ratio(stats.metric(code) as f64, stats.total as f64);
            stats.ratios.insert(ratio_key(code), r);
        }
    }
}

/// Stored ratio per period; periods without it read as 0.
pub fn ratio_series(table: &PeriodTable, name: &str) -> TimeSeries {
    let points = table
        .iter()
        .map(|(period, stats)| (*period, Some(stats.ratios.get(name).copied().unwrap_or(0.0))))
        .collect();
    TimeSeries::new(name, points)
}

/// Payment successes over all Payment and OfferCreate transactions, per payment period.
pub fn payment_success_ratio(payment: &PeriodTable, offer_create: &PeriodTable) -> TimeSeries {
    let points = payment
        .iter()
        .map(|(period, stats)| {
            let offers = offer_create.get(period).map(|s| s.total).unwrap_or(0);
            let r = ratio(stats.success as f64, (stats.total + offers) as f64);
            (*period, Some(r))
        })
        .collect();
    TimeSeries::new("Payment Success Ratio", points)
}
