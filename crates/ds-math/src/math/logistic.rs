//! The logistic function, used to calibrate rupture margins into [0, 1].

/// 1 / (1 + e^(-x)).
///
/// Saturates cleanly at 0 and 1 for large |x|; no special-casing needed
/// because `exp` overflow to infinity gives exactly 0.
pub fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
