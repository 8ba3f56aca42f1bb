//! Engine configuration: threshold strategy knobs, column mapping, and
//! cross-stream coupling parameters.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::validate::{require_finite, ValidationResult};

/// Threshold strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Memory-coupled base threshold with optional Gaussian noise.
    #[default]
    Stochastic,
    /// Exponentially weighted mean plus k standard deviations of drift.
    Ewma,
    /// Registered custom model producing a full threshold series.
    Custom,
    /// External adaptive policy resolved from the backend registry.
    /// Degrades to `Stochastic` with a report flag when none is registered.
    Adaptive,
}

impl StrategyKind {
    /// Label used in reports and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::Stochastic => "stochastic",
            StrategyKind::Ewma => "ewma",
            StrategyKind::Custom => "custom",
            StrategyKind::Adaptive => "adaptive",
        }
    }
}

/// Maps input column headers to the roles the engine needs.
///
/// Defaults follow the canonical schema; overriding lets the engine ingest
/// frames whose producers used different header names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ColumnMap {
    /// Timestamp column.
    pub date: String,
    /// Forecast value column.
    pub forecast: String,
    /// Actual value column.
    pub actual: String,
    /// Per-unit cost column.
    pub unit_cost: String,
    /// Optional stream/segment identifier column.
    pub segment: Option<String>,
    /// Optional boolean policy flag column.
    pub policy: Option<String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        ColumnMap {
            date: "Date".to_string(),
            forecast: "Forecast".to_string(),
            actual: "Actual".to_string(),
            unit_cost: "Unit_Cost".to_string(),
            segment: None,
            policy: None,
        }
    }
}

/// Cross-stream coupling parameters.
///
/// When enabled and a coupling backend is registered, a rupture in one
/// stream lowers the thresholds of linked streams for a few steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CouplingConfig {
    /// Whether coupled mode is requested.
    pub enabled: bool,
    /// Fraction of threshold suppressed on a directly linked stream.
    pub link_weight: f64,
    /// Per-step multiplicative decay of accumulated pressure.
    pub link_decay: f64,
    /// Steps a pressure contribution stays alive before expiring.
    pub cooldown_steps: u32,
    /// Attenuation applied per propagation hop past the first.
    pub damping: f64,
    /// Maximum propagation depth through the link graph.
    pub max_depth: u32,
}

impl Default for CouplingConfig {
    fn default() -> Self {
        CouplingConfig {
            enabled: false,
            link_weight: 0.2,
            link_decay: 0.9,
            cooldown_steps: 3,
            damping: 0.5,
            max_depth: 1,
        }
    }
}

impl CouplingConfig {
    /// Clamp all knobs into their usable ranges.
    pub fn normalized(mut self) -> Self {
        self.link_weight = self.link_weight.clamp(0.0, 1.0);
        self.link_decay = self.link_decay.clamp(0.0, 1.0);
        self.damping = self.damping.clamp(0.0, 1.0);
        self.cooldown_steps = self.cooldown_steps.max(1);
        self.max_depth = self.max_depth.max(1);
        self
    }
}

/// Full engine configuration.
///
/// All fields have serde defaults so a partial JSON document deserializes
/// into a usable config. Call [`EngineConfig::normalized`] before use to
/// clamp out-of-range knobs, and [`EngineConfig::validate`] to reject
/// values clamping cannot repair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Threshold strategy.
    pub strategy: StrategyKind,
    /// Base threshold level for the stochastic strategy.
    pub base_threshold: f64,
    /// Memory-to-threshold coupling coefficient.
    pub sensitivity: f64,
    /// Fraction of drift absorbed into memory on non-rupture steps.
    pub memory_gain: f64,
    /// Standard deviation of threshold noise. Zero disables the draw.
    pub noise_sigma: f64,
    /// RNG seed. Each stream reseeds from this value.
    pub seed: u64,
    /// EWMA smoothing factor.
    pub ewma_alpha: f64,
    /// EWMA band width in standard deviations.
    pub ewma_k: f64,
    /// Logistic slope for rupture probability.
    pub prob_slope: f64,
    /// Margin at which rupture probability is 0.5.
    pub prob_midpoint: f64,
    /// Registered model name when `strategy` is `custom`.
    pub custom_model: Option<String>,
    /// Parameters forwarded to the custom model.
    pub custom_params: serde_json::Value,
    /// Input column mapping.
    pub columns: ColumnMap,
    /// Cross-stream coupling parameters.
    pub coupling: CouplingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            strategy: StrategyKind::Stochastic,
            base_threshold: 120.0,
            sensitivity: 0.02,
            memory_gain: 0.25,
            noise_sigma: 5.0,
            seed: 123,
            ewma_alpha: 0.2,
            ewma_k: 3.0,
            prob_slope: 6.0,
            prob_midpoint: 0.0,
            custom_model: None,
            custom_params: serde_json::Value::Null,
            columns: ColumnMap::default(),
            coupling: CouplingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Clamp knobs into their usable ranges.
    ///
    /// Scale-like knobs are floored at zero, the EWMA alpha is pulled
    /// strictly inside (0, 1), and coupling knobs are clamped by
    /// [`CouplingConfig::normalized`].
    pub fn normalized(mut self) -> Self {
        self.base_threshold = self.base_threshold.max(0.0);
        self.sensitivity = self.sensitivity.max(0.0);
        self.memory_gain = self.memory_gain.max(0.0);
        self.noise_sigma = self.noise_sigma.max(0.0);
        self.ewma_alpha = self.ewma_alpha.clamp(1e-6, 1.0 - 1e-6);
        self.ewma_k = self.ewma_k.max(0.0);
        self.coupling = self.coupling.normalized();
        self
    }

    /// Reject values clamping cannot repair.
    pub fn validate(&self) -> ValidationResult<()> {
        require_finite("base_threshold", self.base_threshold)?;
        require_finite("sensitivity", self.sensitivity)?;
        require_finite("memory_gain", self.memory_gain)?;
        require_finite("noise_sigma", self.noise_sigma)?;
        require_finite("ewma_alpha", self.ewma_alpha)?;
        require_finite("ewma_k", self.ewma_k)?;
        require_finite("prob_slope", self.prob_slope)?;
        require_finite("prob_midpoint", self.prob_midpoint)?;
        require_finite("coupling.link_weight", self.coupling.link_weight)?;
        require_finite("coupling.link_decay", self.coupling.link_decay)?;
        require_finite("coupling.damping", self.coupling.damping)?;
        Ok(())
    }

    /// Strategy label including the custom model name when set.
    pub fn strategy_label(&self) -> String {
        match (self.strategy, &self.custom_model) {
            (StrategyKind::Custom, Some(name)) => format!("custom:{name}"),
            _ => self.strategy.label().to_string(),
        }
    }
}
