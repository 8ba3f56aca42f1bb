//! Diagnostics layer configuration: baseline sourcing, scope band,
//! distribution-shift binning, and breach projection knobs.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::validate::{require_finite, ValidationError, ValidationResult};

/// Where the baseline drift series comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "snake_case")]
pub enum BaselineMode {
    /// Leading window of the series under analysis.
    #[default]
    Window,
    /// External reference CSV with a `drift` or `Delta` column.
    File,
}

/// Diagnostics configuration.
///
/// All fields have serde defaults. [`EpistemicConfig::normalized`] clamps
/// knobs into usable ranges; [`EpistemicConfig::validate`] rejects what
/// clamping cannot repair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EpistemicConfig {
    /// Baseline source.
    pub baseline_mode: BaselineMode,
    /// Reference CSV path, required in file mode.
    pub baseline_file: Option<PathBuf>,
    /// Baseline length in window mode, clamped to the series length.
    pub baseline_window: usize,
    /// Lower quantile of the in-scope band.
    pub scope_q_lo: f64,
    /// Upper quantile of the in-scope band.
    pub scope_q_hi: f64,
    /// Histogram bin count for the distribution-shift index.
    pub psi_bins: usize,
    /// Minimum distinct cut points for the index to be meaningful.
    pub psi_min_bins: usize,
    /// Floor applied to bin shares before the log-ratio.
    pub psi_floor: f64,
    /// Consecutive positive margins that count as a persistent breach.
    pub expiry_k: usize,
    /// Trailing margin points used for the trend fit.
    pub expiry_lookback: usize,
    /// Minimum finite margin points required to attempt projection.
    pub min_points_for_trend: usize,
    /// Projection horizon in steps.
    pub horizon: usize,
    /// Percentage error at or under which a step is on target.
    pub on_target_pct: f64,
    /// Percentage error at or over which a miss is severe.
    pub severe_pct: f64,
    /// Recent slice length. None means baseline length.
    pub recent_window: Option<usize>,
    /// Segment column for the by-group breakdown.
    pub group_col: Option<String>,
    /// Boolean policy column for the policy breakdown.
    pub policy_col: Option<String>,
    /// Evaluation date used for the expiry estimate. None means today.
    pub as_of: Option<NaiveDate>,
}

impl Default for EpistemicConfig {
    fn default() -> Self {
        EpistemicConfig {
            baseline_mode: BaselineMode::Window,
            baseline_file: None,
            baseline_window: 30,
            scope_q_lo: 0.05,
            scope_q_hi: 0.95,
            psi_bins: 10,
            psi_min_bins: 4,
            psi_floor: 1e-6,
            expiry_k: 3,
            expiry_lookback: 28,
            min_points_for_trend: 10,
            horizon: 365,
            on_target_pct: 0.05,
            severe_pct: 0.20,
            recent_window: None,
            group_col: None,
            policy_col: None,
            as_of: None,
        }
    }
}

impl EpistemicConfig {
    /// Clamp knobs into their usable ranges.
    pub fn normalized(mut self) -> Self {
        self.baseline_window = self.baseline_window.max(1);
        self.scope_q_lo = self.scope_q_lo.clamp(0.0, 1.0);
        self.scope_q_hi = self.scope_q_hi.clamp(0.0, 1.0).max(self.scope_q_lo);
        self.psi_bins = self.psi_bins.max(2);
        self.psi_min_bins = self.psi_min_bins.max(2);
        self.psi_floor = self.psi_floor.max(1e-12);
        self.expiry_k = self.expiry_k.max(1);
        self.expiry_lookback = self.expiry_lookback.max(7);
        self.min_points_for_trend = self.min_points_for_trend.max(5);
        self.horizon = self.horizon.max(1);
        self.on_target_pct = self.on_target_pct.clamp(0.0, 1.0);
        self.severe_pct = self.severe_pct.clamp(0.0, 1.0);
        if self.recent_window == Some(0) {
            self.recent_window = None;
        }
        self
    }

    /// Reject values clamping cannot repair.
    pub fn validate(&self) -> ValidationResult<()> {
        require_finite("scope_q_lo", self.scope_q_lo)?;
        require_finite("scope_q_hi", self.scope_q_hi)?;
        require_finite("psi_floor", self.psi_floor)?;
        require_finite("on_target_pct", self.on_target_pct)?;
        require_finite("severe_pct", self.severe_pct)?;
        if self.baseline_mode == BaselineMode::File && self.baseline_file.is_none() {
            return Err(ValidationError::MissingField("baseline_file".to_string()));
        }
        Ok(())
    }
}
