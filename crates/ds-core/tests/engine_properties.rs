//! Property-based tests for engine invariants.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use ds_common::table::SeriesRow;
use ds_config::{EngineConfig, StrategyKind};
use ds_core::engine::Engine;
use ds_core::models::ModelRegistry;

fn rows_strategy() -> impl Strategy<Value = Vec<SeriesRow>> {
    prop::collection::vec((0.0f64..2000.0, 0.0f64..2000.0, 0.0f64..100.0), 1..60).prop_map(
        |cells| {
            cells
                .into_iter()
                .enumerate()
                .map(|(i, (forecast, actual, unit_cost))| SeriesRow {
                    timestamp: Utc
                        .timestamp_opt(1_700_000_000 + i as i64 * 86_400, 0)
                        .unwrap(),
                    forecast,
                    actual,
                    unit_cost,
                    segment: None,
                    policy: None,
                })
                .collect()
        },
    )
}

fn engine(strategy: StrategyKind, noise_sigma: f64) -> Engine {
    let config = EngineConfig {
        strategy,
        base_threshold: 80.0,
        noise_sigma,
        ..EngineConfig::default()
    };
    Engine::new(config, ModelRegistry::default()).expect("config is valid")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn loss_accrues_only_on_rupture(rows in rows_strategy()) {
        let (table, report) = engine(StrategyKind::Stochastic, 5.0)
            .analyze_rows(rows)
            .expect("analysis succeeds");
        let mut total = 0.0;
        for rec in &table.records {
            if rec.rupture {
                prop_assert!((rec.loss - rec.drift * rec.unit_cost).abs() < 1e-9);
            } else {
                prop_assert_eq!(rec.loss, 0.0);
            }
            total += rec.loss;
        }
        prop_assert!((report.summary.total_loss - total).abs() < 1e-6);
    }

    #[test]
    fn memory_resets_on_rupture(rows in rows_strategy()) {
        let (table, _) = engine(StrategyKind::Stochastic, 5.0)
            .analyze_rows(rows)
            .expect("analysis succeeds");
        let gain = EngineConfig::default().memory_gain;
        for pair in table.records.windows(2) {
            if pair[0].rupture {
                prop_assert_eq!(pair[0].memory, 0.0);
                // The step after a rupture starts from zero memory.
                prop_assert!(pair[1].memory <= gain * pair[1].drift + 1e-9);
            }
        }
        if let Some(last) = table.records.last() {
            if last.rupture {
                prop_assert_eq!(last.memory, 0.0);
            }
        }
    }

    #[test]
    fn rupture_probability_stays_in_unit_interval(rows in rows_strategy()) {
        let (table, _) = engine(StrategyKind::Stochastic, 5.0)
            .analyze_rows(rows)
            .expect("analysis succeeds");
        for rec in &table.records {
            prop_assert!((0.0..=1.0).contains(&rec.rupture_prob));
        }
    }

    #[test]
    fn analysis_is_deterministic(rows in rows_strategy()) {
        let e = engine(StrategyKind::Stochastic, 5.0);
        let (first, _) = e.analyze_rows(rows.clone()).expect("analysis succeeds");
        let (second, _) = e.analyze_rows(rows).expect("analysis succeeds");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn derived_columns_stay_in_range(rows in rows_strategy()) {
        let (table, _) = engine(StrategyKind::Ewma, 0.0)
            .analyze_rows(rows)
            .expect("analysis succeeds");
        for rec in &table.records {
            prop_assert!(rec.drift >= 0.0);
            prop_assert!(rec.threshold >= 0.0);
            prop_assert!(rec.memory >= 0.0);
            prop_assert!(rec.loss >= 0.0);
        }
    }

    #[test]
    fn rupture_iff_drift_exceeds_threshold(rows in rows_strategy()) {
        let (table, _) = engine(StrategyKind::Stochastic, 5.0)
            .analyze_rows(rows)
            .expect("analysis succeeds");
        for rec in &table.records {
            prop_assert_eq!(rec.rupture, rec.drift > rec.threshold);
        }
    }
}
