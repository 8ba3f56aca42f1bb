//! Threshold strategies.
//!
//! A [`ThresholdPlan`] is built fresh per stream and stepped in row order.
//! Stateful variants (the EWMA accumulator) live inside the plan so the
//! engine's loop stays a plain fold. Custom models run up front and
//! become a precomputed series; the external adaptive policy is consulted
//! per step.

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::Rng;

use ds_config::EngineConfig;
use ds_math::{standard_normal, EwmState};

use crate::backend::ThresholdPolicy;

/// Per-stream threshold producer.
pub enum ThresholdPlan {
    /// `max(0, base + sensitivity*memory + noise)`, noise ~ N(0, sigma).
    Stochastic {
        base: f64,
        sensitivity: f64,
        sigma: f64,
    },
    /// `ewm_mean + k*ewm_std` of the drift series up to the current point.
    Ewma { state: EwmState, k: f64 },
    /// A full threshold series computed up front (custom models).
    Precomputed { label: String, series: Vec<f64> },
    /// External adaptive policy consulted per step.
    External { policy: Arc<dyn ThresholdPolicy> },
}

impl ThresholdPlan {
    pub fn stochastic(config: &EngineConfig) -> Self {
        ThresholdPlan::Stochastic {
            base: config.base_threshold,
            sensitivity: config.sensitivity,
            sigma: config.noise_sigma,
        }
    }

    pub fn ewma(config: &EngineConfig) -> Self {
        ThresholdPlan::Ewma {
            state: EwmState::new(config.ewma_alpha),
            k: config.ewma_k,
        }
    }

    /// `series` must be exactly one threshold per input row; the model
    /// registry validates this before a plan is built from it.
    pub fn precomputed(label: impl Into<String>, series: Vec<f64>) -> Self {
        ThresholdPlan::Precomputed {
            label: label.into(),
            series,
        }
    }

    pub fn external(policy: Arc<dyn ThresholdPolicy>) -> Self {
        ThresholdPlan::External { policy }
    }

    /// Engine label for the report summary.
    pub fn label(&self) -> String {
        match self {
            ThresholdPlan::Stochastic { .. } => "stochastic".to_string(),
            ThresholdPlan::Ewma { .. } => "ewma".to_string(),
            ThresholdPlan::Precomputed { label, .. } => label.clone(),
            ThresholdPlan::External { .. } => "adaptive".to_string(),
        }
    }

    /// Threshold for row `idx`.
    ///
    /// `drifts` is the full drift series for the stream, `memory` the
    /// accumulated drift memory entering this step. The stochastic
    /// variant consumes exactly two uniform draws per step when sigma is
    /// positive and none at all when it is zero.
    pub fn threshold_at(
        &mut self,
        idx: usize,
        drifts: &[f64],
        memory: f64,
        rng: &mut StdRng,
    ) -> f64 {
        match self {
            ThresholdPlan::Stochastic {
                base,
                sensitivity,
                sigma,
            } => {
                let noise = if *sigma > 0.0 {
                    let u1 = rng.random::<f64>();
                    let u2 = rng.random::<f64>();
                    *sigma * standard_normal(u1, u2)
                } else {
                    0.0
                };
                (*base + *sensitivity * memory + noise).max(0.0)
            }
            ThresholdPlan::Ewma { state, k } => {
                state.update(drifts[idx]);
                state.mean() + *k * state.std_dev()
            }
            ThresholdPlan::Precomputed { series, .. } => series[idx],
            ThresholdPlan::External { policy } => {
                policy.produce(&drifts[..=idx], memory).max(0.0)
            }
        }
    }
}

impl fmt::Debug for ThresholdPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdPlan::Stochastic { base, sensitivity, sigma } => f
                .debug_struct("Stochastic")
                .field("base", base)
                .field("sensitivity", sensitivity)
                .field("sigma", sigma)
                .finish(),
            ThresholdPlan::Ewma { state, k } => f
                .debug_struct("Ewma")
                .field("n", &state.len())
                .field("k", k)
                .finish(),
            ThresholdPlan::Precomputed { label, series } => f
                .debug_struct("Precomputed")
                .field("label", label)
                .field("len", &series.len())
                .finish(),
            ThresholdPlan::External { policy } => f
                .debug_struct("External")
                .field("policy", &policy.name())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn test_stochastic_memory_coupling() {
        let mut plan = ThresholdPlan::Stochastic {
            base: 100.0,
            sensitivity: 0.1,
            sigma: 0.0,
        };
        let drifts = [5.0];
        assert_eq!(plan.threshold_at(0, &drifts, 50.0, &mut rng(1)), 105.0);
        assert_eq!(plan.threshold_at(0, &drifts, 0.0, &mut rng(1)), 100.0);
    }

    #[test]
    fn test_stochastic_floors_at_zero() {
        let mut plan = ThresholdPlan::Stochastic {
            base: -5.0,
            sensitivity: 0.0,
            sigma: 0.0,
        };
        assert_eq!(plan.threshold_at(0, &[1.0], 0.0, &mut rng(1)), 0.0);
    }

    #[test]
    fn test_zero_sigma_consumes_no_draws() {
        let mut plan = ThresholdPlan::Stochastic {
            base: 120.0,
            sensitivity: 0.02,
            sigma: 0.0,
        };
        let mut stepped = rng(9);
        for i in 0..5 {
            plan.threshold_at(i, &[0.0; 5], 0.0, &mut stepped);
        }
        let mut fresh = rng(9);
        assert_eq!(stepped.random::<f64>(), fresh.random::<f64>());
    }

    #[test]
    fn test_stochastic_noise_is_seed_deterministic() {
        let run = |seed| {
            let mut plan = ThresholdPlan::Stochastic {
                base: 120.0,
                sensitivity: 0.0,
                sigma: 5.0,
            };
            let mut r = rng(seed);
            (0..10)
                .map(|i| plan.threshold_at(i, &[0.0; 10], 0.0, &mut r))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(123), run(123));
        assert_ne!(run(123), run(124));
    }

    #[test]
    fn test_ewma_first_point_is_value() {
        let mut plan = ThresholdPlan::Ewma {
            state: EwmState::new(0.2),
            k: 3.0,
        };
        let drifts = [10.0, 12.0];
        let first = plan.threshold_at(0, &drifts, 0.0, &mut rng(1));
        assert!((first - 10.0).abs() < 1e-12);
        let second = plan.threshold_at(1, &drifts, 0.0, &mut rng(1));
        assert!(second > 10.0);
    }

    #[test]
    fn test_precomputed_series() {
        let mut plan = ThresholdPlan::precomputed("custom:fixed", vec![7.0, 8.0]);
        assert_eq!(plan.label(), "custom:fixed");
        assert_eq!(plan.threshold_at(1, &[0.0, 0.0], 0.0, &mut rng(1)), 8.0);
    }

    #[test]
    fn test_external_policy_floors_at_zero() {
        struct Negative;
        impl ThresholdPolicy for Negative {
            fn name(&self) -> &str {
                "negative"
            }
            fn produce(&self, _history: &[f64], _memory: f64) -> f64 {
                -3.0
            }
        }
        let mut plan = ThresholdPlan::external(Arc::new(Negative));
        assert_eq!(plan.label(), "adaptive");
        assert_eq!(plan.threshold_at(0, &[1.0], 0.0, &mut rng(1)), 0.0);
    }
}
