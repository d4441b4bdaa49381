//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, deterministic (golden-testable). Each series gets
//! its own glyph; periods without a value break the line rather than bridging it.
//! The x axis is the period index over the union of all series' periods.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{Period, TimeSeries};

const GLYPHS: [char; 4] = ['*', '+', 'x', '#'];

/// Render one or more series on a shared grid, with a range header and a legend.
pub fn render_series_plot(title: &str, series: &[TimeSeries], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let periods: BTreeSet<Period> = series.iter().flat_map(|s| s.points.iter().map(|(p, _)| *p)).collect();
    let (Some(first), Some(last)) = (periods.first(), periods.last()) else {
        return format!("{title}: no data\n");
    };
    let index: BTreeMap<Period, f64> = periods.iter().enumerate().map(|(i, p)| (*p, i as f64)).collect();
    let x_max = (periods.len() as f64 - 1.0).max(1.0);

    let (y_min, y_max) = y_range(series).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    let cell = |p: &Period, v: f64| {
        let x = map_x(index.get(p).copied().unwrap_or(0.0), 0.0, x_max, width);
        (x, map_y(v, y_min, y_max, height))
    };

    // Lines first (only into blank cells), then points on top.
    for (s, glyph) in series.iter().zip(GLYPHS.iter().cycle()) {
        let mut prev: Option<(usize, usize)> = None;
        for (p, v) in &s.points {
            match v {
                Some(v) if v.is_finite() => {
                    let (x, y) = cell(p, *v);
                    if let Some((x0, y0)) = prev {
                        draw_line(&mut grid, x0, y0, x, y, *glyph);
                    }
                    prev = Some((x, y));
                }
                _ => prev = None,
            }
        }
    }
    for (s, glyph) in series.iter().zip(GLYPHS.iter().cycle()) {
        for (p, v) in &s.points {
            if let Some(v) = v.filter(|v| v.is_finite()) {
                let (x, y) = cell(p, v);
                grid[y][x] = *glyph;
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format!("{title}: {first}..{last} | y=[{y_min:.2}, {y_max:.2}]\n"));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    for (s, glyph) in series.iter().zip(GLYPHS.iter().cycle()) {
        out.push_str(&format!("  {glyph} {}\n", s.label));
    }
    out
}

fn y_range(series: &[TimeSeries]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for v in series.iter().flat_map(|s| s.points.iter().filter_map(|(_, v)| *v)) {
        if v.is_finite() {
            min_y = min_y.min(v);
            max_y = max_y.max(v);
        }
    }
    if min_y.is_finite() && max_y.is_finite() && max_y >= min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

pub(crate) fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(m: u32) -> Period {
        Period::month(2022, m).unwrap()
    }

    #[test]
    fn plot_golden_snapshot_small() {
        let a = TimeSeries::new(
            "a",
            vec![(month(1), Some(0.0)), (month(2), Some(5.0)), (month(3), Some(10.0))],
        );
        let b = TimeSeries::new("b", vec![(month(1), Some(10.0)), (month(2), None), (month(3), Some(0.0))]);

        let txt = render_series_plot("Test", &[a, b], 10, 5);
        let expected = concat!(
            "Test: 2022-01..2022-03 | y=[-0.50, 10.50]\n",
            "+       **\n",
            "      **  \n",
            "    **    \n",
            "  **      \n",
            "**       +\n",
            "  * a\n",
            "  + b\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn empty_input_says_so() {
        assert_eq!(render_series_plot("Nothing", &[], 20, 5), "Nothing: no data\n");
    }

    #[test]
    fn single_period_does_not_panic() {
        let s = TimeSeries::new("one", vec![(month(1), Some(3.0))]);
        let txt = render_series_plot("One", &[s], 10, 5);
        assert!(txt.starts_with("One: 2022-01..2022-01"));
        assert_eq!(txt.matches('*').count(), 2);
    }
}
