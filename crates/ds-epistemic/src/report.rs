//! Diagnostics report schema.
//!
//! The report is a JSON-compatible tree: an economics block, an epistemic
//! block, a window-diagnostics block, and optional per-group, per-policy,
//! and custom breakdowns. Optional blocks are `skip_serializing_if` so only
//! populated sections appear in output.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Economics
// ---------------------------------------------------------------------------

/// Loss and forecast-quality aggregates over the whole table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EconomicsSummary {
    /// Sum of per-row loss.
    pub total_loss: f64,
    /// Mean of loss / (|actual| + eps) across rows.
    pub loss_per_unit_mean: f64,
    /// Rows where forecast > actual and the miss is off target.
    pub overforecast_count: usize,
    /// Rows where forecast < actual and the miss is off target.
    pub underforecast_count: usize,
    /// Rows with percentage error at or under the on-target threshold.
    pub on_target_count: usize,
    /// Rows with percentage error at or over the severe threshold.
    pub severe_miss_count: usize,
    /// Severe misses as a fraction of all rows.
    pub severe_miss_rate: f64,
}

// ---------------------------------------------------------------------------
// Epistemic
// ---------------------------------------------------------------------------

/// Why the breach ETA is what it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtaRationale {
    /// The trailing margins are already all positive.
    AlreadyBreaching,
    /// The fitted trend crosses into persistent breach within the horizon.
    Projected,
    /// Too few finite margin points to fit a trend.
    InsufficientPoints,
    /// The fitted trend never breaches within the horizon.
    NoBreachWithinHorizon,
    /// The trend fit was degenerate.
    FitFailed,
}

impl EtaRationale {
    pub fn as_str(&self) -> &'static str {
        match self {
            EtaRationale::AlreadyBreaching => "already_breaching",
            EtaRationale::Projected => "projected",
            EtaRationale::InsufficientPoints => "insufficient_points",
            EtaRationale::NoBreachWithinHorizon => "no_breach_within_horizon",
            EtaRationale::FitFailed => "fit_failed",
        }
    }
}

/// Scope, distribution shift, and breach projection results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpistemicSummary {
    /// Fraction of the recent slice inside the baseline quantile band.
    pub scope_score_0to1: f64,
    /// Population-stability-style distribution shift index.
    pub psi: f64,
    /// Steps until the margin trend sustains a breach, if projectable.
    pub eta_days_to_persistent_breach: Option<i64>,
    /// Explains a null or zero ETA.
    pub eta_rationale: EtaRationale,
    /// Evaluation date plus ETA, when the ETA is known.
    pub expiry_estimate_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Window diagnostics
// ---------------------------------------------------------------------------

/// Quantile snapshot of a drift series.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuantileSnapshot {
    pub q05: f64,
    pub q50: f64,
    pub q95: f64,
}

/// Window sizes and quantiles actually used, for auditability.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WindowDiagnostics {
    pub baseline_window_used: usize,
    pub recent_window_used: usize,
    pub baseline_quantiles: QuantileSnapshot,
    pub recent_quantiles: QuantileSnapshot,
}

// ---------------------------------------------------------------------------
// Breakdowns
// ---------------------------------------------------------------------------

/// Per-segment rupture and quality stats.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupBreakdown {
    pub n: usize,
    pub ruptures: usize,
    pub loss: f64,
    pub on_target_rate: f64,
    pub severe_rate: f64,
}

/// Economics over one policy slice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EconSlice {
    pub n: usize,
    pub ruptures: usize,
    pub total_loss: f64,
    pub loss_per_unit_mean: f64,
    pub mean_drift: f64,
}

/// Economics split by the boolean policy flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicyBreakdown {
    pub policy_true: EconSlice,
    pub policy_false: EconSlice,
}

// ---------------------------------------------------------------------------
// Top-level report
// ---------------------------------------------------------------------------

/// Full diagnostics report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticsReport {
    pub economics: EconomicsSummary,
    pub epistemic: EpistemicSummary,
    pub diagnostics: WindowDiagnostics,

    /// Per-segment breakdown, present when a group column was requested
    /// and matched the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_group: Option<BTreeMap<String, GroupBreakdown>>,

    /// Policy split, present when a policy column was requested and
    /// matched the table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_breakdown: Option<PolicyBreakdown>,

    /// Outputs of caller-registered diagnostics, keyed by name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<BTreeMap<String, serde_json::Value>>,
}

impl DiagnosticsReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Render a short human-readable summary.
    pub fn render_summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push("Epistemic".to_string());
        lines.push(format!(
            "  scope score      {:.3}",
            self.epistemic.scope_score_0to1
        ));
        lines.push(format!("  shift index      {:.3}", self.epistemic.psi));
        match self.epistemic.eta_days_to_persistent_breach {
            Some(days) => lines.push(format!(
                "  breach eta       {} days ({})",
                days,
                self.epistemic.eta_rationale.as_str()
            )),
            None => lines.push(format!(
                "  breach eta       none ({})",
                self.epistemic.eta_rationale.as_str()
            )),
        }
        if let Some(date) = self.epistemic.expiry_estimate_date {
            lines.push(format!("  expiry estimate  {date}"));
        }

        lines.push("Economics".to_string());
        lines.push(format!("  total loss       {:.2}", self.economics.total_loss));
        lines.push(format!(
            "  on target        {}   over {}   under {}",
            self.economics.on_target_count,
            self.economics.overforecast_count,
            self.economics.underforecast_count
        ));
        lines.push(format!(
            "  severe misses    {} ({:.1}%)",
            self.economics.severe_miss_count,
            self.economics.severe_miss_rate * 100.0
        ));

        lines.push("Windows".to_string());
        lines.push(format!(
            "  baseline         {} rows (q05 {:.2}, q50 {:.2}, q95 {:.2})",
            self.diagnostics.baseline_window_used,
            self.diagnostics.baseline_quantiles.q05,
            self.diagnostics.baseline_quantiles.q50,
            self.diagnostics.baseline_quantiles.q95
        ));
        lines.push(format!(
            "  recent           {} rows (q05 {:.2}, q50 {:.2}, q95 {:.2})",
            self.diagnostics.recent_window_used,
            self.diagnostics.recent_quantiles.q05,
            self.diagnostics.recent_quantiles.q50,
            self.diagnostics.recent_quantiles.q95
        ));

        if let Some(groups) = &self.by_group {
            lines.push("By group".to_string());
            for (name, g) in groups {
                lines.push(format!(
                    "  {name}: n={} ruptures={} loss={:.2} on_target={:.2} severe={:.2}",
                    g.n, g.ruptures, g.loss, g.on_target_rate, g.severe_rate
                ));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> DiagnosticsReport {
        DiagnosticsReport {
            economics: EconomicsSummary {
                total_loss: 100.0,
                loss_per_unit_mean: 0.5,
                overforecast_count: 3,
                underforecast_count: 2,
                on_target_count: 5,
                severe_miss_count: 1,
                severe_miss_rate: 0.1,
            },
            epistemic: EpistemicSummary {
                scope_score_0to1: 0.9,
                psi: 0.02,
                eta_days_to_persistent_breach: None,
                eta_rationale: EtaRationale::NoBreachWithinHorizon,
                expiry_estimate_date: None,
            },
            diagnostics: WindowDiagnostics::default(),
            by_group: None,
            policy_breakdown: None,
            custom: None,
        }
    }

    #[test]
    fn test_optional_blocks_omitted_from_json() {
        let json = sample_report().to_json().unwrap();
        assert!(!json.contains("by_group"));
        assert!(!json.contains("policy_breakdown"));
        assert!(!json.contains("custom"));
        assert!(json.contains("\"scope_score_0to1\":0.9"));
    }

    #[test]
    fn test_eta_rationale_snake_case() {
        let json = serde_json::to_string(&EtaRationale::NoBreachWithinHorizon).unwrap();
        assert_eq!(json, "\"no_breach_within_horizon\"");
        let back: EtaRationale = serde_json::from_str("\"already_breaching\"").unwrap();
        assert_eq!(back, EtaRationale::AlreadyBreaching);
    }

    #[test]
    fn test_render_summary_mentions_key_figures() {
        let text = sample_report().render_summary();
        assert!(text.contains("scope score"));
        assert!(text.contains("total loss"));
        assert!(text.contains("no_breach_within_horizon"));
    }

    #[test]
    fn test_report_roundtrip() {
        let report = sample_report();
        let json = report.to_json().unwrap();
        let back: DiagnosticsReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
