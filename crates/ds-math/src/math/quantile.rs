//! Quantiles with linear interpolation.
//!
//! Follows the common "linear" convention: the q-quantile of a sorted
//! sample sits at fractional position `q * (n - 1)` and is interpolated
//! between its neighbors.

/// Arithmetic mean. Returns 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// q-quantile of an unsorted slice. `q` is clamped into [0, 1].
/// Returns 0 for an empty slice.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, q)
}

/// q-quantile of an ascending-sorted slice. `q` is clamped into [0, 1].
/// Returns 0 for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Median shorthand.
pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_empty_slices() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(quantile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
        // pos = 0.5 * 3 = 1.5 -> between 2 and 3
        assert!(approx_eq(quantile(&values, 0.5), 2.5, 1e-12));
        // pos = 0.25 * 3 = 0.75
        assert!(approx_eq(quantile(&values, 0.25), 1.75, 1e-12));
    }

    #[test]
    fn test_quantile_unsorted_input() {
        let values = [3.0, 1.0, 4.0, 2.0];
        assert!(approx_eq(quantile(&values, 0.5), 2.5, 1e-12));
    }

    #[test]
    fn test_quantile_clamps_q() {
        let values = [1.0, 2.0];
        assert_eq!(quantile(&values, -1.0), 1.0);
        assert_eq!(quantile(&values, 2.0), 2.0);
    }

    #[test]
    fn test_median_odd_length() {
        assert_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
    }

    #[test]
    fn test_mean() {
        assert!(approx_eq(mean(&[1.0, 2.0, 6.0]), 3.0, 1e-12));
    }
}
