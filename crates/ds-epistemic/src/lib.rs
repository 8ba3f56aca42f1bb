//! Drift Sentinel epistemic diagnostics.
//!
//! This crate turns an engine output table into a board-level diagnostics
//! report:
//! - Economics: loss totals and forecast-quality counts
//! - Scope: how much of the recent drift lies inside the baseline band
//! - Distribution shift: PSI-style index between recent and baseline
//! - Breach projection: ETA until the margin trend sustains a breach
//! - Optional per-segment, per-policy, and caller-registered breakdowns
//!
//! Everything here is a read-only pass over the materialized table; no
//! component mutates engine output.

pub mod baseline;
pub mod breach;
pub mod economics;
pub mod registry;
pub mod report;
pub mod shift;

use chrono::{Days, Utc};
use ds_common::table::DriftTable;
use ds_common::Error;
use ds_config::EpistemicConfig;
use ds_math::quantile;

pub use baseline::{load_baseline, scope_score};
pub use breach::eta_to_breach;
pub use economics::{economics_summary, group_breakdown, policy_breakdown};
pub use registry::{DiagnosticFn, DiagnosticRegistry};
pub use report::{
    DiagnosticsReport, EconSlice, EconomicsSummary, EpistemicSummary, EtaRationale,
    GroupBreakdown, PolicyBreakdown, QuantileSnapshot, WindowDiagnostics,
};
pub use shift::population_stability_index;

/// Compute the diagnostics report for an engine output table.
///
/// Knobs are clamped via [`EpistemicConfig::normalized`]; semantic
/// validation (file mode without a file, NaN knobs) is the caller's job
/// through [`EpistemicConfig::validate`].
pub fn enrich(table: &DriftTable, cfg: &EpistemicConfig) -> Result<DiagnosticsReport, Error> {
    enrich_with(table, cfg, &DiagnosticRegistry::new())
}

/// [`enrich`] plus evaluation of caller-registered diagnostics.
pub fn enrich_with(
    table: &DriftTable,
    cfg: &EpistemicConfig,
    registry: &DiagnosticRegistry,
) -> Result<DiagnosticsReport, Error> {
    let cfg = cfg.clone().normalized();
    if table.is_empty() {
        return Err(Error::EmptyInput);
    }

    let economics = economics_summary(&table.records, &cfg);

    let baseline = load_baseline(table, &cfg)?;
    let recent_len = cfg
        .recent_window
        .unwrap_or(baseline.len())
        .clamp(1, table.len());
    let drifts = table.drifts();
    let recent = drifts[drifts.len() - recent_len..].to_vec();

    let scope = scope_score(&recent, &baseline, cfg.scope_q_lo, cfg.scope_q_hi);
    let psi = population_stability_index(
        &recent,
        &baseline,
        cfg.psi_bins,
        cfg.psi_min_bins,
        cfg.psi_floor,
    );

    let margins = table.margins();
    let (eta, rationale) = eta_to_breach(
        &margins,
        cfg.expiry_k,
        cfg.expiry_lookback,
        cfg.min_points_for_trend,
        cfg.horizon,
    );
    let as_of = cfg.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let expiry = eta.and_then(|days| as_of.checked_add_days(Days::new(days as u64)));

    let diagnostics = WindowDiagnostics {
        baseline_window_used: baseline.len(),
        recent_window_used: recent.len(),
        baseline_quantiles: snapshot(&baseline),
        recent_quantiles: snapshot(&recent),
    };

    let custom = if registry.is_empty() {
        None
    } else {
        Some(registry.evaluate(table))
    };

    Ok(DiagnosticsReport {
        economics,
        epistemic: EpistemicSummary {
            scope_score_0to1: scope,
            psi,
            eta_days_to_persistent_breach: eta,
            eta_rationale: rationale,
            expiry_estimate_date: expiry,
        },
        diagnostics,
        by_group: group_breakdown(table, &cfg),
        policy_breakdown: policy_breakdown(table, &cfg),
        custom,
    })
}

fn snapshot(series: &[f64]) -> QuantileSnapshot {
    QuantileSnapshot {
        q05: quantile(series, 0.05),
        q50: quantile(series, 0.50),
        q95: quantile(series, 0.95),
    }
}
