//! Breach-time projection from the margin trend.

use ds_math::fit_line;

use crate::report::EtaRationale;

/// Estimate steps until the margin trend sustains `k` consecutive
/// breaches (margin > 0).
///
/// Non-finite margins are dropped. The trend is a least-squares line over
/// the trailing `lookback` points. An ETA of 0 with
/// [`EtaRationale::AlreadyBreaching`] means the last `k` observed margins
/// are already positive; a projected ETA counts steps past the last
/// observed point, scanning at most `horizon` offsets.
pub fn eta_to_breach(
    margins: &[f64],
    k: usize,
    lookback: usize,
    min_points: usize,
    horizon: usize,
) -> (Option<i64>, EtaRationale) {
    let finite: Vec<f64> = margins.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < min_points.max(1) {
        return (None, EtaRationale::InsufficientPoints);
    }
    let tail = if finite.len() > lookback {
        &finite[finite.len() - lookback..]
    } else {
        &finite[..]
    };
    let Some(fit) = fit_line(tail) else {
        return (None, EtaRationale::FitFailed);
    };
    let k = k.max(1);
    let last_k = &tail[tail.len().saturating_sub(k)..];
    if last_k.iter().all(|&v| v > 0.0) {
        return (Some(0), EtaRationale::AlreadyBreaching);
    }
    let n = tail.len();
    for offset in 0..horizon {
        if (0..k).all(|j| fit.at((n + offset + j) as f64) > 0.0) {
            return (Some(offset as i64), EtaRationale::Projected);
        }
    }
    (None, EtaRationale::NoBreachWithinHorizon)
}
