//! Typed engine overrides.
//!
//! Callers build an [`EngineOverrides`] with only the knobs they want to
//! change and apply it over a base config. Every field is optional, so the
//! struct also deserializes cleanly from sparse JSON documents.

use serde::{Deserialize, Serialize};

use crate::engine::{EngineConfig, StrategyKind};

/// Sparse overlay over [`EngineConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineOverrides {
    pub strategy: Option<StrategyKind>,
    pub base_threshold: Option<f64>,
    pub sensitivity: Option<f64>,
    pub memory_gain: Option<f64>,
    pub noise_sigma: Option<f64>,
    pub seed: Option<u64>,
    pub ewma_alpha: Option<f64>,
    pub ewma_k: Option<f64>,
    pub prob_slope: Option<f64>,
    pub prob_midpoint: Option<f64>,
    pub custom_model: Option<String>,
    pub custom_params: Option<serde_json::Value>,
    pub coupled: Option<bool>,
    pub segment_col: Option<String>,
    pub policy_col: Option<String>,
}

impl EngineOverrides {
    /// Apply the set fields over `base`, leaving the rest untouched.
    pub fn apply(&self, base: EngineConfig) -> EngineConfig {
        let mut cfg = base;
        if let Some(strategy) = self.strategy {
            cfg.strategy = strategy;
        }
        if let Some(v) = self.base_threshold {
            cfg.base_threshold = v;
        }
        if let Some(v) = self.sensitivity {
            cfg.sensitivity = v;
        }
        if let Some(v) = self.memory_gain {
            cfg.memory_gain = v;
        }
        if let Some(v) = self.noise_sigma {
            cfg.noise_sigma = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
        if let Some(v) = self.ewma_alpha {
            cfg.ewma_alpha = v;
        }
        if let Some(v) = self.ewma_k {
            cfg.ewma_k = v;
        }
        if let Some(v) = self.prob_slope {
            cfg.prob_slope = v;
        }
        if let Some(v) = self.prob_midpoint {
            cfg.prob_midpoint = v;
        }
        if let Some(name) = &self.custom_model {
            cfg.custom_model = Some(name.clone());
        }
        if let Some(params) = &self.custom_params {
            cfg.custom_params = params.clone();
        }
        if let Some(coupled) = self.coupled {
            cfg.coupling.enabled = coupled;
        }
        if let Some(col) = &self.segment_col {
            cfg.columns.segment = Some(col.clone());
        }
        if let Some(col) = &self.policy_col {
            cfg.columns.policy = Some(col.clone());
        }
        cfg
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == EngineOverrides::default()
    }
}
