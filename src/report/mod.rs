//! Reporting utilities: trend summaries and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::TimeSeries;
use crate::math::{TrendLine, linear_trend, mean};

/// One line of a trend table.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendRow {
    pub label: String,
    pub periods: usize,
    pub first: Option<f64>,
    pub last: Option<f64>,
    pub mean: Option<f64>,
    pub trend: Option<TrendLine>,
}

/// First/last/mean value and least-squares slope of each series.
pub fn summarize_trends(series: &[TimeSeries]) -> Vec<TrendRow> {
    series
        .iter()
        .map(|s| {
            let values = s.values();
            TrendRow {
                label: s.label.clone(),
                periods: s.points.len(),
                first: values.first().copied(),
                last: values.last().copied(),
                mean: mean(&values),
                trend: linear_trend(s),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Period;

    #[test]
    fn summarizes_rising_series() {
        let s = TimeSeries::new(
            "success %",
            (1..=4)
                .map(|m| (Period::month(2022, m).unwrap(), Some(m as f64 * 10.0)))
                .collect(),
        );
        let rows = summarize_trends(&[s]);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!((row.first, row.last), (Some(10.0), Some(40.0)));
        assert_eq!(row.mean, Some(25.0));
        assert!((row.trend.unwrap().slope - 10.0).abs() < 1e-9);
    }

    #[test]
    fn empty_series_has_no_trend() {
        let rows = summarize_trends(&[TimeSeries::new("empty", Vec::new())]);
        assert_eq!(rows[0].periods, 0);
        assert!(rows[0].trend.is_none() && rows[0].mean.is_none());
    }
}
