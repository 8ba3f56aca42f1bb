//! Distribution shift between the recent and baseline drift series.

use ds_math::{histogram_counts, quantile_cuts};

/// Population-stability-style shift index.
///
/// Cut points come from baseline quantiles at `bins + 1` evenly spaced
/// probabilities, deduplicated. Fewer than `max(3, min_bins)` distinct
/// cuts means the baseline is too degenerate to bin, and the index is 0
/// rather than a meaningless number. Both series are bucketed over the
/// same cuts, shares are floored at `floor` before the log-ratio.
pub fn population_stability_index(
    recent: &[f64],
    baseline: &[f64],
    bins: usize,
    min_bins: usize,
    floor: f64,
) -> f64 {
    let cuts = quantile_cuts(baseline, bins.max(2));
    if cuts.len() < min_bins.max(3) {
        return 0.0;
    }
    let expected = histogram_counts(baseline, &cuts);
    let actual = histogram_counts(recent, &cuts);
    let e_den = expected.iter().sum::<u64>().max(1) as f64;
    let a_den = actual.iter().sum::<u64>().max(1) as f64;
    expected
        .iter()
        .zip(&actual)
        .map(|(&e, &a)| {
            let e_pct = (e as f64 / e_den).max(floor);
            let a_pct = (a as f64 / a_den).max(floor);
            (a_pct - e_pct) * (a_pct / e_pct).ln()
        })
        .sum()
}
