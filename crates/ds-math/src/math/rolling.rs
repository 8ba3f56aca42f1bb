//! Trailing-window statistics with a minimum-observation rule.
//!
//! Positions that have seen fewer than `min_periods` observations are NaN;
//! [`backfill`] then fills the leading NaN run from the first defined
//! value, which is how windowed threshold models avoid an undefined warmup
//! region.

use super::quantile::quantile;

/// Rolling q-quantile over a trailing window.
///
/// `window` and `min_periods` are clamped to at least 1. Undefined
/// positions are NaN.
pub fn rolling_quantile(values: &[f64], window: usize, q: f64, min_periods: usize) -> Vec<f64> {
    let window = window.max(1);
    let min_periods = min_periods.max(1);
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let slice = &values[start..=i];
        if slice.len() < min_periods {
            out.push(f64::NAN);
        } else {
            out.push(quantile(slice, q));
        }
    }
    out
}

/// Rolling mean and population (ddof = 0) standard deviation over a
/// trailing window. Undefined positions are NaN in both outputs.
pub fn rolling_mean_std(
    values: &[f64],
    window: usize,
    min_periods: usize,
) -> (Vec<f64>, Vec<f64>) {
    let window = window.max(1);
    let min_periods = min_periods.max(1);
    let mut means = Vec::with_capacity(values.len());
    let mut stds = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let slice = &values[start..=i];
        if slice.len() < min_periods {
            means.push(f64::NAN);
            stds.push(f64::NAN);
            continue;
        }
        let m = slice.iter().sum::<f64>() / slice.len() as f64;
        let var = slice.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / slice.len() as f64;
        means.push(m);
        stds.push(var.sqrt());
    }
    (means, stds)
}

/// Replace the leading NaN run with the first finite value. A series with
/// no finite value is returned unchanged.
pub fn backfill(values: &[f64]) -> Vec<f64> {
    let first = values.iter().copied().find(|v| v.is_finite());
    let Some(fill) = first else {
        return values.to_vec();
    };
    values
        .iter()
        .map(|&v| if v.is_finite() { v } else { fill })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_rolling_quantile_with_min_periods() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = rolling_quantile(&values, 3, 0.5, 2);
        assert!(out[0].is_nan());
        assert!(approx_eq(out[1], 1.5, 1e-12));
        assert!(approx_eq(out[2], 2.0, 1e-12));
        assert!(approx_eq(out[3], 3.0, 1e-12));
        assert!(approx_eq(out[4], 4.0, 1e-12));
    }

    #[test]
    fn test_rolling_mean_std_population() {
        let values = [1.0, 2.0, 3.0];
        let (means, stds) = rolling_mean_std(&values, 2, 1);
        assert_eq!(means, vec![1.0, 1.5, 2.5]);
        assert!(approx_eq(stds[0], 0.0, 1e-12));
        assert!(approx_eq(stds[1], 0.5, 1e-12));
        assert!(approx_eq(stds[2], 0.5, 1e-12));
    }

    #[test]
    fn test_backfill_leading_nans() {
        let filled = backfill(&[f64::NAN, f64::NAN, 2.0, 3.0]);
        assert_eq!(filled, vec![2.0, 2.0, 2.0, 3.0]);
    }

    #[test]
    fn test_backfill_all_nan_is_unchanged() {
        let filled = backfill(&[f64::NAN, f64::NAN]);
        assert!(filled.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_window_shorter_than_series() {
        let out = rolling_quantile(&[4.0], 14, 0.8, 2);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_nan());
    }
}
