//! Numeric primitives for the drift engine and its diagnostics.
//!
//! Everything here is pure and deterministic: no RNG, no I/O. Randomness
//! stays in the engine, which feeds uniform draws into [`gauss`].

pub mod ewm;
pub mod gauss;
pub mod histogram;
pub mod logistic;
pub mod quantile;
pub mod rolling;
pub mod trend;
