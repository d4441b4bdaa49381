//! Linear trend of a time series.
//!
//! Fits `y = intercept + slope · i` where `i` is the period index (0, 1, 2, ...),
//! so the slope reads as "change per period". Missing periods keep their index,
//! which keeps gaps from compressing the time axis.
//!
//! The system is tall and thin (n × 2), so it is solved through SVD; nalgebra's
//! `QR::solve` only handles square systems.

use nalgebra::{DMatrix, DVector};

use crate::domain::TimeSeries;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
    /// Points used in the fit.
    pub n: usize,
}

/// Least-squares trend over the present points. `None` with fewer than two points.
pub fn linear_trend(series: &TimeSeries) -> Option<TrendLine> {
    let points: Vec<(f64, f64)> = series
        .points
        .iter()
        .enumerate()
        .filter_map(|(i, (_, v))| v.filter(|v| v.is_finite()).map(|v| (i as f64, v)))
        .collect();
    fit_line(&points)
}

/// Least-squares line through `(x, y)` points.
pub fn fit_line(points: &[(f64, f64)]) -> Option<TrendLine> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len();
    let x = DMatrix::from_fn(n, 2, |r, c| if c == 0 { 1.0 } else { points[r].0 });
    let y = DVector::from_iterator(n, points.iter().map(|&(_, y)| y));

    let svd = x.svd(true, true);
    let beta = svd.solve(&y, 1e-10).ok()?;
    if !beta.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(TrendLine {
        intercept: beta[0],
        slope: beta[1],
        n,
    })
}
