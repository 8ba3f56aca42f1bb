//! Box-Muller transform: standard-normal variates from uniform draws.
//!
//! Kept pure so the engine can feed it from any seeded uniform source and
//! stay bit-for-bit reproducible.

use std::f64::consts::TAU;

/// Two independent standard-normal variates from two uniforms.
///
/// `u1` is clamped away from 0 so the log stays finite; `u2` wraps
/// naturally through the trig terms.
pub fn standard_normal_pair(u1: f64, u2: f64) -> (f64, f64) {
    let u1 = u1.clamp(f64::MIN_POSITIVE, 1.0);
    let r = (-2.0 * u1.ln()).sqrt();
    let theta = TAU * u2;
    (r * theta.cos(), r * theta.sin())
}

/// One standard-normal variate from two uniforms.
pub fn standard_normal(u1: f64, u2: f64) -> f64 {
    standard_normal_pair(u1, u2).0
}
