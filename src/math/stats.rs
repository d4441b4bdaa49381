//! Descriptive statistics over plain `f64` slices.
//!
//! Quantiles use linear interpolation between closest ranks. Non-finite values
//! are ignored.

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Quantile `q` in `[0, 1]` of `values` (any order). `None` for an empty slice.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let sorted = sorted_finite(values);
    quantile_sorted(&sorted, q)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Tukey fences: `[q1 - k·IQR, q3 + k·IQR]`.
pub fn iqr_fences(values: &[f64], k: f64) -> Option<(f64, f64)> {
    let sorted = sorted_finite(values);
    let q1 = quantile_sorted(&sorted, 0.25)?;
    let q3 = quantile_sorted(&sorted, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - k * iqr, q3 + k * iqr))
}

/// Edges of `bins` equal-frequency bins, ascending, duplicates collapsed.
///
/// Heavily repeated values can collapse edges, so the result may describe fewer
/// than `bins` bins. Empty for no data or `bins == 0`.
pub fn quantile_edges(values: &[f64], bins: usize) -> Vec<f64> {
    let sorted = sorted_finite(values);
    if sorted.is_empty() || bins == 0 {
        return Vec::new();
    }
    let mut edges: Vec<f64> = Vec::with_capacity(bins + 1);
    for i in 0..=bins {
        let Some(edge) = quantile_sorted(&sorted, i as f64 / bins as f64) else {
            continue;
        };
        if edges.last().is_none_or(|last| edge > *last) {
            edges.push(edge);
        }
    }
    edges
}

/// Index of the bin holding `value`: bins are `(e[i], e[i+1]]`, the first one
/// also includes `e[0]`. `None` outside the edges.
pub fn bin_index(edges: &[f64], value: f64) -> Option<usize> {
    if edges.len() < 2 || !value.is_finite() {
        return None;
    }
    if value < edges[0] || value > edges[edges.len() - 1] {
        return None;
    }
    (0..edges.len() - 1).find(|&i| value <= edges[i + 1])
}
