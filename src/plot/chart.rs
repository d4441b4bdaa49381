//! SVG line charts via Plotters.
//!
//! The x axis is days since the earliest period in the chart, labelled back as
//! dates. Periods without a value split a series into separate line runs.

use std::path::Path;

use chrono::{Duration, NaiveDate};
use plotters::prelude::*;
use tracing::{info, warn};

use crate::domain::TimeSeries;
use crate::error::{AppError, EXIT_INPUT};
use crate::plot::ascii::pad_range;

const PALETTE: [RGBColor; 4] = [
    RGBColor(31, 119, 180),
    RGBColor(214, 39, 40),
    RGBColor(44, 160, 44),
    RGBColor(255, 127, 14),
];

/// A vertical annotation line, e.g. a protocol launch date.
#[derive(Debug, Clone, Copy)]
pub struct Marker<'a> {
    pub date: NaiveDate,
    pub label: &'a str,
}

/// Render-only chart description.
pub struct LineChart<'a> {
    pub title: &'a str,
    pub y_desc: &'a str,
    pub series: &'a [TimeSeries],
    pub marker: Option<Marker<'a>>,
}

/// Write `chart` as an SVG file. Charts with no data are skipped with a warning.
pub fn write_svg_chart(path: &Path, chart: &LineChart<'_>) -> Result<(), AppError> {
    let Some(origin) = chart
        .series
        .iter()
        .flat_map(|s| s.points.iter().map(|(p, _)| p.start()))
        .min()
    else {
        warn!(title = chart.title, "nothing to chart");
        return Ok(());
    };

    draw(path, chart, origin)
        .map_err(|e| AppError::new(EXIT_INPUT, format!("Failed to render chart '{}': {e}", path.display())))?;
    info!(path = %path.display(), "chart saved");
    Ok(())
}

fn day_offset(origin: NaiveDate, date: NaiveDate) -> f64 {
    (date - origin).num_days() as f64
}

/// Maximal runs of consecutive present values, as chart coordinates.
fn runs(series: &TimeSeries, origin: NaiveDate) -> Vec<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for (p, v) in &series.points {
        match v.filter(|v| v.is_finite()) {
            Some(v) => current.push((day_offset(origin, p.start()), v)),
            None if !current.is_empty() => out.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn draw(path: &Path, chart: &LineChart<'_>, origin: NaiveDate) -> Result<(), Box<dyn std::error::Error>> {
    let runs: Vec<Vec<Vec<(f64, f64)>>> = chart.series.iter().map(|s| runs(s, origin)).collect();

    let x_max = chart
        .series
        .iter()
        .flat_map(|s| s.points.iter().map(|(p, _)| day_offset(origin, p.start())))
        .chain(chart.marker.map(|m| day_offset(origin, m.date)))
        .fold(1.0_f64, f64::max);

    let values: Vec<f64> = runs.iter().flatten().flatten().map(|&(_, y)| y).collect();
    let y_min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let y_max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (y_min, y_max) = if !y_min.is_finite() {
        (0.0, 1.0)
    } else if y_max - y_min < 1e-9 {
        (y_min - 1.0, y_max + 1.0)
    } else {
        pad_range(y_min, y_max, 0.05)
    };

    let root = SVGBackend::new(path, (1200, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(chart.title, ("sans-serif", 22))
        .margin(12)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 45)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;

    let fmt_date = |v: &f64| (origin + Duration::days(v.round() as i64)).format("%Y-%m").to_string();
    ctx.configure_mesh()
        .x_desc("Date")
        .y_desc(chart.y_desc)
        .x_labels(10)
        .y_labels(8)
        .x_label_formatter(&fmt_date)
        .draw()?;

    for ((series, series_runs), color) in chart.series.iter().zip(&runs).zip(PALETTE.iter().cycle()) {
        let color = *color;
        for (i, run) in series_runs.iter().enumerate() {
            let drawn = ctx.draw_series(LineSeries::new(run.iter().copied(), color.stroke_width(2)))?;
            if i == 0 {
                drawn
                    .label(series.label.clone())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            }
            if run.len() == 1 {
                ctx.draw_series(run.iter().map(|&p| Circle::new(p, 3, color.filled())))?;
            }
        }
    }

    if let Some(marker) = chart.marker {
        let x = day_offset(origin, marker.date);
        let accent = RGBColor(255, 165, 0);
        ctx.draw_series(LineSeries::new([(x, y_min), (x, y_max)], accent.stroke_width(3)))?;
        ctx.draw_series(std::iter::once(Text::new(
            marker.label.to_string(),
            (x, y_max),
            ("sans-serif", 16).into_font().color(&accent),
        )))?;
    }

    ctx.configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Period;

    fn day(d: u32) -> Period {
        Period::day(NaiveDate::from_ymd_opt(2024, 3, d).unwrap())
    }

    #[test]
    fn runs_split_on_gaps() {
        let s = TimeSeries::new(
            "s",
            vec![(day(1), Some(1.0)), (day(2), None), (day(3), Some(2.0)), (day(4), Some(3.0))],
        );
        let origin = day(1).start();
        assert_eq!(runs(&s, origin), vec![vec![(0.0, 1.0)], vec![(2.0, 2.0), (3.0, 3.0)]]);
    }

    #[test]
    fn writes_svg_with_title_and_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratios.svg");
        let series = [TimeSeries::new(
            "tecPATH_DRY ratio",
            vec![(day(20), Some(0.1)), (day(21), Some(0.2)), (day(23), Some(0.15))],
        )];
        let chart = LineChart {
            title: "Error Ratios",
            y_desc: "Error Ratio",
            series: &series,
            marker: Some(Marker {
                date: NaiveDate::from_ymd_opt(2024, 3, 22).unwrap(),
                label: "add AMM",
            }),
        };

        write_svg_chart(&path, &chart).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Error Ratios"));
        assert!(svg.contains("add AMM"));
    }

    #[test]
    fn empty_chart_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.svg");
        let chart = LineChart {
            title: "Empty",
            y_desc: "",
            series: &[],
            marker: None,
        };
        write_svg_chart(&path, &chart).unwrap();
        assert!(!path.exists());
    }
}
