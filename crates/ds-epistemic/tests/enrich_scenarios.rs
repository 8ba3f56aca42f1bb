//! End-to-end diagnostics scenarios over hand-built output tables.

use std::io::Write;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use ds_common::table::{DriftRecord, DriftTable};
use ds_common::Error;
use ds_config::{BaselineMode, EpistemicConfig};
use ds_epistemic::{enrich, enrich_with, DiagnosticRegistry, EtaRationale};
use serde_json::json;

const THRESHOLD: f64 = 50.0;
const UNIT_COST: f64 = 2.0;

fn record(day: i64, drift: f64) -> DriftRecord {
    let rupture = drift > THRESHOLD;
    DriftRecord {
        timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day),
        forecast: 100.0 + drift,
        actual: 100.0,
        unit_cost: UNIT_COST,
        segment: None,
        policy: None,
        drift,
        memory: 0.0,
        threshold: THRESHOLD,
        rupture,
        rupture_prob: 0.5,
        loss: if rupture { drift * UNIT_COST } else { 0.0 },
    }
}

fn table_of(drifts: &[f64]) -> DriftTable {
    DriftTable {
        records: drifts
            .iter()
            .enumerate()
            .map(|(i, &d)| record(i as i64, d))
            .collect(),
        segment_name: None,
        policy_name: None,
    }
}

#[test]
fn test_stable_series_full_report() {
    // 60 days of bounded drift well under the threshold.
    let drifts: Vec<f64> = (0..60).map(|i| 10.0 + (i % 5) as f64).collect();
    let table = table_of(&drifts);
    let report = enrich(&table, &EpistemicConfig::default()).unwrap();

    assert_eq!(report.diagnostics.baseline_window_used, 30);
    assert_eq!(report.diagnostics.recent_window_used, 30);
    // Baseline and recent share one distribution.
    assert_eq!(report.epistemic.scope_score_0to1, 1.0);
    assert!(report.epistemic.psi.abs() < 1e-9);
    // Margins sit 36+ under zero with a nearly flat trend.
    assert_eq!(report.epistemic.eta_days_to_persistent_breach, None);
    assert_eq!(
        report.epistemic.eta_rationale,
        EtaRationale::NoBreachWithinHorizon
    );
    assert!(report.epistemic.expiry_estimate_date.is_none());
    assert_eq!(report.economics.total_loss, 0.0);
    assert_eq!(report.economics.severe_miss_count, 0);
    assert!(report.by_group.is_none());
    assert!(report.policy_breakdown.is_none());
    assert!(report.custom.is_none());
}

#[test]
fn test_empty_table_is_rejected() {
    let table = DriftTable::default();
    match enrich(&table, &EpistemicConfig::default()) {
        Err(Error::EmptyInput) => {}
        other => panic!("expected EmptyInput, got {other:?}"),
    }
}

#[test]
fn test_recent_window_override() {
    let drifts: Vec<f64> = (0..40).map(|_| 5.0).collect();
    let table = table_of(&drifts);
    let cfg = EpistemicConfig {
        baseline_window: 10,
        recent_window: Some(7),
        ..EpistemicConfig::default()
    };
    let report = enrich(&table, &cfg).unwrap();
    assert_eq!(report.diagnostics.baseline_window_used, 10);
    assert_eq!(report.diagnostics.recent_window_used, 7);
}

#[test]
fn test_breaching_tail_sets_expiry_to_as_of() {
    // Nine calm days, then three days over the threshold.
    let mut drifts = vec![10.0; 9];
    drifts.extend([100.0, 105.0, 110.0]);
    let table = table_of(&drifts);
    let as_of = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
    let cfg = EpistemicConfig {
        as_of: Some(as_of),
        ..EpistemicConfig::default()
    };
    let report = enrich(&table, &cfg).unwrap();
    assert_eq!(report.epistemic.eta_days_to_persistent_breach, Some(0));
    assert_eq!(report.epistemic.eta_rationale, EtaRationale::AlreadyBreaching);
    assert_eq!(report.epistemic.expiry_estimate_date, Some(as_of));
    // The three breach rows carry loss.
    assert_eq!(report.economics.total_loss, (100.0 + 105.0 + 110.0) * UNIT_COST);
}

#[test]
fn test_group_and_policy_breakdowns() {
    let mut records = Vec::new();
    for i in 0..10 {
        let mut r = record(i, 10.0);
        r.segment = Some("a".to_string());
        r.policy = Some(i % 2 == 0);
        records.push(r);
    }
    for i in 0..10 {
        let mut r = record(10 + i, 80.0);
        r.segment = Some("b".to_string());
        r.policy = Some(false);
        records.push(r);
    }
    let table = DriftTable {
        records,
        segment_name: Some("Store".to_string()),
        policy_name: Some("Promo".to_string()),
    };
    let cfg = EpistemicConfig {
        group_col: Some("Store".to_string()),
        policy_col: Some("Promo".to_string()),
        ..EpistemicConfig::default()
    };
    let report = enrich(&table, &cfg).unwrap();

    let groups = report.by_group.expect("group breakdown present");
    assert_eq!(groups.len(), 2);
    assert_eq!(groups["a"].n, 10);
    assert_eq!(groups["a"].ruptures, 0);
    assert_eq!(groups["b"].n, 10);
    assert_eq!(groups["b"].ruptures, 10);
    assert!(groups["b"].loss > 0.0);
    assert_eq!(groups["b"].severe_rate, 1.0);

    let policy = report.policy_breakdown.expect("policy breakdown present");
    assert_eq!(policy.policy_true.n, 5);
    assert_eq!(policy.policy_false.n, 15);
    assert_eq!(policy.policy_true.total_loss, 0.0);
}

#[test]
fn test_custom_diagnostics_through_registry() {
    let table = table_of(&[10.0; 20]);
    let mut registry = DiagnosticRegistry::new();
    registry.register("rupture_rate", |t: &DriftTable| {
        Ok(json!(t.rupture_count() as f64 / t.len() as f64))
    });
    registry.register("broken", |_: &DriftTable| Err("no data".to_string()));

    let report = enrich_with(&table, &EpistemicConfig::default(), &registry).unwrap();
    let custom = report.custom.expect("custom block present");
    assert_eq!(custom["rupture_rate"], json!(0.0));
    assert_eq!(custom["broken"], json!({ "error": "no data" }));
}

#[test]
fn test_file_baseline_drives_windows_and_scope() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "drift").unwrap();
    for i in 0..100 {
        writeln!(file, "{}", i as f64).unwrap();
    }

    let table = table_of(&[50.0; 20]);
    let cfg = EpistemicConfig {
        baseline_mode: BaselineMode::File,
        baseline_file: Some(file.path().to_path_buf()),
        ..EpistemicConfig::default()
    };
    let report = enrich(&table, &cfg).unwrap();
    assert_eq!(report.diagnostics.baseline_window_used, 100);
    // Recent defaults to baseline length, clamped to the table.
    assert_eq!(report.diagnostics.recent_window_used, 20);
    // Every recent drift sits inside the baseline band.
    assert_eq!(report.epistemic.scope_score_0to1, 1.0);
}
