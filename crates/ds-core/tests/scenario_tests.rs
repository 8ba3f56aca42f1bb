//! Engine scenarios driven through the CSV surface, end to end.

use ds_common::table::{DriftTable, RawFrame};
use ds_common::Error;
use ds_config::{EngineConfig, EpistemicConfig};
use ds_core::engine::Engine;
use ds_core::models::ModelRegistry;
use ds_core::synth::generate_demo;

fn quiet_config() -> EngineConfig {
    EngineConfig {
        base_threshold: 50.0,
        sensitivity: 0.1,
        memory_gain: 0.1,
        noise_sigma: 0.0,
        ..EngineConfig::default()
    }
}

fn engine(config: EngineConfig) -> Engine {
    Engine::new(config, ModelRegistry::default()).expect("config is valid")
}

fn series_csv(actuals: &[f64]) -> String {
    let mut text = String::from("Date,Forecast,Actual,Unit_Cost\n");
    for (i, actual) in actuals.iter().enumerate() {
        text.push_str(&format!("2024-01-{:02},1000,{actual},40\n", i + 1));
    }
    text
}

#[test]
fn test_flat_series_never_ruptures() {
    let frame = RawFrame::parse_csv(&series_csv(&[1000.0; 10])).unwrap();
    let (table, report) = engine(quiet_config()).analyze(&frame).unwrap();

    assert_eq!(table.rupture_count(), 0);
    assert_eq!(report.summary.total_loss, 0.0);
    assert!(report.events.is_empty());
}

#[test]
fn test_two_spike_scenario_totals() {
    let frame =
        RawFrame::parse_csv(&series_csv(&[1000.0, 1200.0, 1000.0, 1300.0, 1000.0])).unwrap();
    let (table, report) = engine(quiet_config()).analyze(&frame).unwrap();

    let ruptured: Vec<usize> = table
        .records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.rupture)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(ruptured, vec![1, 3]);
    assert_eq!(report.summary.total_loss, 20_000.0);
    assert_eq!(report.events.len(), 2);
    assert_eq!(report.events[0].loss, 8_000.0);
}

#[test]
fn test_missing_actual_column_blocks_run() {
    let frame = RawFrame::parse_csv("Date,Forecast,Unit_Cost\n2024-01-01,1000,40\n").unwrap();
    match engine(quiet_config()).analyze(&frame) {
        Err(Error::MissingColumns { columns }) => {
            assert_eq!(columns, vec!["Actual".to_string()]);
        }
        other => panic!("expected MissingColumns, got {other:?}"),
    }
}

#[test]
fn test_rising_drift_matches_reference_fold() {
    let cfg = quiet_config();
    let drifts: Vec<f64> = (1..=15).map(|i| 10.0 * i as f64).collect();

    // Reference recursion with noise disabled.
    let mut memory = 0.0;
    let mut expected = Vec::new();
    for &drift in &drifts {
        let threshold = cfg.base_threshold + cfg.sensitivity * memory;
        let rupture = drift > threshold;
        memory = if rupture {
            0.0
        } else {
            memory + cfg.memory_gain * drift
        };
        expected.push(rupture);
    }

    let actuals: Vec<f64> = drifts.iter().map(|d| 1000.0 + d).collect();
    let frame = RawFrame::parse_csv(&series_csv(&actuals)).unwrap();
    let (table, _) = engine(cfg).analyze(&frame).unwrap();

    let got: Vec<bool> = table.records.iter().map(|r| r.rupture).collect();
    assert_eq!(got, expected);
}

#[test]
fn test_noisy_run_is_idempotent_at_csv_level() {
    let actuals: Vec<f64> = (0..30).map(|i| 1000.0 + (i as f64 * 37.0) % 260.0).collect();
    let frame = RawFrame::parse_csv(&series_csv(&actuals)).unwrap();
    let e = engine(EngineConfig::default());

    let (first, _) = e.analyze(&frame).unwrap();
    let (second, _) = e.analyze(&frame).unwrap();
    assert_eq!(first.to_csv(), second.to_csv());
}

#[test]
fn test_report_json_shape() {
    let frame =
        RawFrame::parse_csv(&series_csv(&[1000.0, 1200.0, 1000.0, 1300.0, 1000.0])).unwrap();
    let (_, report) = engine(quiet_config()).analyze(&frame).unwrap();

    let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(value["summary"]["n"], 5);
    assert_eq!(value["summary"]["ruptures"], 2);
    assert_eq!(value["summary"]["engine"], "stochastic");
    assert_eq!(value["summary"]["config"]["base_threshold"], 50.0);
    assert_eq!(value["events"].as_array().map(Vec::len), Some(2));
    // Optional blocks stay out of a single-stream report.
    assert!(value.get("by_segment").is_none());
    assert!(value.get("graph_telemetry").is_none());
    assert!(value.get("flags").is_none());
}

#[test]
fn test_analyze_then_enrich_round_trip() {
    let input = generate_demo(40, 7, None);
    let (table, _) = engine(EngineConfig::default()).analyze(&input).unwrap();

    let parsed = DriftTable::from_csv(&table.to_csv(), None, None).unwrap();
    assert_eq!(parsed.len(), 40);

    let report = ds_epistemic::enrich(&parsed, &EpistemicConfig::default()).unwrap();
    assert!((0.0..=1.0).contains(&report.epistemic.scope_score_0to1));
    assert!(report.epistemic.psi >= 0.0);
    assert_eq!(report.diagnostics.baseline_window_used, 30);
}

#[test]
fn test_segmented_csv_run_keeps_segment_column() {
    let segments = vec!["a".to_string(), "b".to_string()];
    let input = generate_demo(12, 7, Some(&segments));

    let mut config = EngineConfig::default();
    config.columns.segment = Some("Segment".to_string());
    let (table, report) = engine(config).analyze(&input).unwrap();

    let csv = table.to_csv();
    assert!(csv.starts_with("Date,Forecast,Actual,Unit_Cost,Segment,"));

    let parsed = DriftTable::from_csv(&csv, Some("Segment"), None).unwrap();
    assert_eq!(parsed.len(), 24);

    let by_segment = report.by_segment.unwrap();
    assert_eq!(
        by_segment.keys().cloned().collect::<Vec<_>>(),
        vec!["a".to_string(), "b".to_string()]
    );
    assert_eq!(by_segment["a"].n + by_segment["b"].n, 24);
}
