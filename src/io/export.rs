//! Export computed series to CSV.
//!
//! One row per period, one column per series. Missing values are left empty so
//! spreadsheets treat them as blanks rather than zeros.

use std::collections::BTreeMap;
use std::path::Path;

use crate::analysis::cost::MonthlyCost;
use crate::domain::{Period, TimeSeries};
use crate::error::{AppError, EXIT_INPUT};

fn csv_error(path: &Path, e: impl std::fmt::Display) -> AppError {
    AppError::new(EXIT_INPUT, format!("Failed to write export CSV '{}': {e}", path.display()))
}

/// Write several series side by side, joined on period.
pub fn write_series_csv(path: &Path, series: &[TimeSeries]) -> Result<(), AppError> {
    let mut rows: BTreeMap<Period, Vec<Option<f64>>> = BTreeMap::new();
    for (col, s) in series.iter().enumerate() {
        for (period, value) in &s.points {
            let row = rows.entry(*period).or_insert_with(|| vec![None; series.len()]);
            row[col] = *value;
        }
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;

    let mut header = vec!["period".to_string()];
    header.extend(series.iter().map(|s| s.label.clone()));
    writer.write_record(&header).map_err(|e| csv_error(path, e))?;

    for (period, values) in rows {
        let mut record = vec![period.key()];
        record.extend(values.iter().map(|v| v.map(|v| format!("{v:.10}")).unwrap_or_default()));
        writer.write_record(&record).map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| csv_error(path, e))?;
    Ok(())
}

/// Write the monthly cost table.
pub fn write_monthly_cost_csv(path: &Path, months: &[MonthlyCost]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    writer
        .write_record(["month", "avg_fee", "avg_slippage_pct", "avg_total_cost", "transaction_count"])
        .map_err(|e| csv_error(path, e))?;

    for m in months {
        let avg = |f: fn(&crate::analysis::cost::CostAverages) -> f64| {
            m.averages.as_ref().map(|a| format!("{:.10}", f(a))).unwrap_or_default()
        };
        writer
            .write_record([
                m.month.key(),
                avg(|a| a.avg_fee),
                avg(|a| a.avg_slippage_pct),
                avg(|a| a.avg_total_cost),
                m.transaction_count.to_string(),
            ])
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|e| csv_error(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_series_on_period() {
        let jan = Period::month(2022, 1).unwrap();
        let feb = Period::month(2022, 2).unwrap();
        let a = TimeSeries::new("a", vec![(jan, Some(1.0)), (feb, Some(2.0))]);
        let b = TimeSeries::new("b", vec![(feb, None)]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.csv");
        write_series_csv(&path, &[a, b]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "period,a,b");
        assert_eq!(lines[1], "2022-01,1.0000000000,");
        assert_eq!(lines[2], "2022-02,2.0000000000,");
    }

    #[test]
    fn cost_rows_leave_gap_months_blank() {
        let months = vec![MonthlyCost {
            month: Period::month(2021, 2).unwrap(),
            transaction_count: 0,
            averages: None,
        }];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cost.csv");
        write_monthly_cost_csv(&path, &months).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().nth(1), Some("2021-02,,,,0"));
    }
}
