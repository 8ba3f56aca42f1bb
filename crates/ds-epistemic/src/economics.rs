//! Loss and forecast-quality aggregates.

use std::collections::BTreeMap;

use ds_common::table::{DriftRecord, DriftTable};
use ds_config::EpistemicConfig;
use ds_math::mean;

use crate::report::{EconSlice, EconomicsSummary, GroupBreakdown, PolicyBreakdown};

/// Guard against division by a zero actual.
const EPS: f64 = 1e-9;

/// Relative percentage error of one row, guarded against zero actuals.
pub fn pct_err(record: &DriftRecord) -> f64 {
    let v = record.drift / (record.actual.abs() + EPS);
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn loss_per_unit(record: &DriftRecord) -> f64 {
    let v = record.loss / (record.actual.abs() + EPS);
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Whole-table economics aggregates.
pub fn economics_summary(records: &[DriftRecord], cfg: &EpistemicConfig) -> EconomicsSummary {
    let n = records.len();
    let mut on_target = 0usize;
    let mut over = 0usize;
    let mut under = 0usize;
    let mut severe = 0usize;
    for r in records {
        let err = pct_err(r);
        let hit = err <= cfg.on_target_pct;
        if hit {
            on_target += 1;
        } else if r.forecast > r.actual {
            over += 1;
        } else if r.forecast < r.actual {
            under += 1;
        }
        if err >= cfg.severe_pct {
            severe += 1;
        }
    }
    let per_unit: Vec<f64> = records.iter().map(loss_per_unit).collect();
    EconomicsSummary {
        total_loss: records.iter().map(|r| r.loss).sum(),
        loss_per_unit_mean: mean(&per_unit),
        overforecast_count: over,
        underforecast_count: under,
        on_target_count: on_target,
        severe_miss_count: severe,
        severe_miss_rate: if n == 0 { 0.0 } else { severe as f64 / n as f64 },
    }
}

/// Per-segment breakdown, keyed by segment value in sorted order.
///
/// Returns None unless a group column was requested and names the table's
/// segment column; a mismatched name skips the breakdown rather than
/// failing the report.
pub fn group_breakdown(
    table: &DriftTable,
    cfg: &EpistemicConfig,
) -> Option<BTreeMap<String, GroupBreakdown>> {
    let wanted = cfg.group_col.as_deref()?;
    if table.segment_name.as_deref() != Some(wanted) {
        return None;
    }
    let mut groups: BTreeMap<String, Vec<&DriftRecord>> = BTreeMap::new();
    for r in &table.records {
        let key = r.segment.clone().unwrap_or_default();
        groups.entry(key).or_default().push(r);
    }
    let breakdown = groups
        .into_iter()
        .map(|(key, rows)| {
            let n = rows.len();
            let on_target = rows.iter().filter(|r| pct_err(r) <= cfg.on_target_pct).count();
            let severe = rows.iter().filter(|r| pct_err(r) >= cfg.severe_pct).count();
            let stats = GroupBreakdown {
                n,
                ruptures: rows.iter().filter(|r| r.rupture).count(),
                loss: rows.iter().map(|r| r.loss).sum(),
                on_target_rate: if n == 0 { 0.0 } else { on_target as f64 / n as f64 },
                severe_rate: if n == 0 { 0.0 } else { severe as f64 / n as f64 },
            };
            (key, stats)
        })
        .collect();
    Some(breakdown)
}

/// Economics split by the boolean policy flag.
///
/// Same matching rule as [`group_breakdown`]: the requested column must
/// name the table's policy column or the split is skipped.
pub fn policy_breakdown(table: &DriftTable, cfg: &EpistemicConfig) -> Option<PolicyBreakdown> {
    let wanted = cfg.policy_col.as_deref()?;
    if table.policy_name.as_deref() != Some(wanted) {
        return None;
    }
    let (active, rest): (Vec<&DriftRecord>, Vec<&DriftRecord>) = table
        .records
        .iter()
        .partition(|r| r.policy == Some(true));
    Some(PolicyBreakdown {
        policy_true: econ_slice(&active),
        policy_false: econ_slice(&rest),
    })
}

fn econ_slice(rows: &[&DriftRecord]) -> EconSlice {
    if rows.is_empty() {
        return EconSlice::default();
    }
    let per_unit: Vec<f64> = rows.iter().map(|r| loss_per_unit(r)).collect();
    let drifts: Vec<f64> = rows.iter().map(|r| r.drift).collect();
    EconSlice {
        n: rows.len(),
        ruptures: rows.iter().filter(|r| r.rupture).count(),
        total_loss: rows.iter().map(|r| r.loss).sum(),
        loss_per_unit_mean: mean(&per_unit),
        mean_drift: mean(&drifts),
    }
}
