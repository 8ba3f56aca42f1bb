//! Quantile-derived bin edges and fixed-edge histograms.
//!
//! Bins are right-open except the last, which is closed, so a value equal
//! to the top edge still counts. Values outside the edge range (and
//! non-finite values) are dropped, not clamped.

use super::quantile::quantile_sorted;

/// Bin edges at `bins + 1` evenly spaced quantiles of `values`, with exact
/// duplicates removed. A constant series collapses to a single edge.
///
/// Non-finite values are ignored; an empty input yields no edges.
pub fn quantile_cuts(values: &[f64], bins: usize) -> Vec<f64> {
    let bins = bins.max(1);
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return Vec::new();
    }
    sorted.sort_by(f64::total_cmp);

    let mut cuts = Vec::with_capacity(bins + 1);
    for i in 0..=bins {
        let q = i as f64 / bins as f64;
        let edge = quantile_sorted(&sorted, q);
        if cuts.last() != Some(&edge) {
            cuts.push(edge);
        }
    }
    cuts
}

/// Count values into the bins described by ascending `edges`.
///
/// Returns `edges.len() - 1` counts; fewer than two edges yields no bins.
pub fn histogram_counts(values: &[f64], edges: &[f64]) -> Vec<u64> {
    if edges.len() < 2 {
        return Vec::new();
    }
    let nbins = edges.len() - 1;
    let mut counts = vec![0u64; nbins];
    let lo = edges[0];
    let hi = edges[nbins];
    for &v in values {
        if !v.is_finite() || v < lo || v > hi {
            continue;
        }
        let idx = if v == hi {
            nbins - 1
        } else {
            edges.partition_point(|e| *e <= v) - 1
        };
        counts[idx] += 1;
    }
    counts
}
