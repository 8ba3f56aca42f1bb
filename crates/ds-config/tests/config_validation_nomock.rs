//! No-mock configuration tests using real JSON files on disk.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use ds_config::{
    BaselineMode, ColumnMap, CouplingConfig, EngineConfig, EngineOverrides, EpistemicConfig,
    StrategyKind, ValidationError,
};
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write config file");
    path
}

fn load_engine(path: &Path) -> EngineConfig {
    let contents = fs::read_to_string(path).expect("read engine config");
    serde_json::from_str(&contents).expect("parse engine config")
}

fn load_epistemic(path: &Path) -> EpistemicConfig {
    let contents = fs::read_to_string(path).expect("read diagnostics config");
    serde_json::from_str(&contents).expect("parse diagnostics config")
}

#[test]
fn test_engine_config_file_round_trips() {
    let temp = tempfile::tempdir().expect("tempdir");
    let cfg = EngineConfig {
        strategy: StrategyKind::Custom,
        base_threshold: 90.0,
        sensitivity: 0.05,
        memory_gain: 0.3,
        noise_sigma: 0.0,
        seed: 7,
        ewma_alpha: 0.35,
        ewma_k: 2.0,
        prob_slope: 4.0,
        prob_midpoint: 10.0,
        custom_model: Some("rolling_quantile".to_string()),
        custom_params: serde_json::json!({"window": 21, "q": 0.9}),
        columns: ColumnMap {
            date: "Day".to_string(),
            forecast: "Plan".to_string(),
            actual: "Fact".to_string(),
            unit_cost: "Cost".to_string(),
            segment: Some("Store".to_string()),
            policy: None,
        },
        coupling: CouplingConfig {
            enabled: true,
            link_weight: 0.3,
            link_decay: 0.8,
            cooldown_steps: 2,
            damping: 0.4,
            max_depth: 2,
        },
    };

    let path = temp.path().join("engine.json");
    let pretty = serde_json::to_string_pretty(&cfg).expect("serialize engine config");
    fs::write(&path, pretty).expect("write engine config");

    let loaded = load_engine(&path);
    assert_eq!(loaded, cfg);
    assert_eq!(loaded.strategy_label(), "custom:rolling_quantile");
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_sparse_config_file_fills_defaults() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = write_config(
        &temp,
        "sparse.json",
        r#"{"strategy": "ewma", "base_threshold": 80.0}"#,
    );

    let cfg = load_engine(&path);
    assert_eq!(cfg.strategy, StrategyKind::Ewma);
    assert_eq!(cfg.base_threshold, 80.0);
    assert_eq!(cfg.memory_gain, 0.25);
    assert_eq!(cfg.seed, 123);
    assert_eq!(cfg.columns.date, "Date");
    assert!(cfg.columns.segment.is_none());
    assert!(!cfg.coupling.enabled);
}

#[test]
fn test_flag_overrides_win_over_file_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = write_config(
        &temp,
        "sparse.json",
        r#"{"strategy": "ewma", "base_threshold": 80.0}"#,
    );

    let overrides = EngineOverrides {
        base_threshold: Some(60.0),
        seed: Some(9),
        ..EngineOverrides::default()
    };
    let cfg = overrides.apply(load_engine(&path));

    assert_eq!(cfg.base_threshold, 60.0);
    assert_eq!(cfg.strategy, StrategyKind::Ewma);
    assert_eq!(cfg.seed, 9);
    assert_eq!(cfg.memory_gain, 0.25);
}

#[test]
fn test_out_of_range_config_file_normalizes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = write_config(
        &temp,
        "hostile.json",
        r#"{
            "base_threshold": -10.0,
            "noise_sigma": -2.0,
            "ewma_alpha": 5.0,
            "coupling": {"link_weight": 9.0, "cooldown_steps": 0, "max_depth": 0}
        }"#,
    );

    let cfg = load_engine(&path).normalized();
    assert_eq!(cfg.base_threshold, 0.0);
    assert_eq!(cfg.noise_sigma, 0.0);
    assert!(cfg.ewma_alpha > 0.0 && cfg.ewma_alpha < 1.0);
    assert_eq!(cfg.coupling.link_weight, 1.0);
    assert_eq!(cfg.coupling.cooldown_steps, 1);
    assert_eq!(cfg.coupling.max_depth, 1);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_epistemic_config_file_round_trips() {
    let temp = tempfile::tempdir().expect("tempdir");
    let cfg = EpistemicConfig {
        baseline_mode: BaselineMode::File,
        baseline_file: Some(PathBuf::from("reference.csv")),
        baseline_window: 45,
        recent_window: Some(14),
        group_col: Some("Store".to_string()),
        as_of: NaiveDate::from_ymd_opt(2026, 2, 1),
        ..EpistemicConfig::default()
    };

    let path = temp.path().join("epistemic.json");
    let pretty = serde_json::to_string_pretty(&cfg).expect("serialize diagnostics config");
    fs::write(&path, pretty).expect("write diagnostics config");

    let loaded = load_epistemic(&path);
    assert_eq!(loaded, cfg);
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_epistemic_file_mode_without_path_is_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = write_config(&temp, "file_mode.json", r#"{"baseline_mode": "file"}"#);

    let cfg = load_epistemic(&path);
    match cfg.validate() {
        Err(err) => {
            assert_eq!(err.code(), 64);
            assert!(matches!(err, ValidationError::MissingField(ref f) if f == "baseline_file"));
        }
        Ok(()) => panic!("file mode without a path must be rejected"),
    }
}
