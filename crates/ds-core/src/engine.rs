//! The analysis engine: per-stream drift/threshold recursion,
//! segmentation, cross-stream coupling, and report assembly.
//!
//! One `Engine` is built per run from a validated config plus the model
//! and backend registries. Capability resolution happens once up front:
//! a requested strategy or coupling mode that cannot run degrades to the
//! stochastic/independent variant and leaves a flag in the report, never
//! an error.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use ds_common::error::{Error, Result};
use ds_common::table::{DriftRecord, DriftTable, RawFrame, SeriesRow};
use ds_config::{EngineConfig, StrategyKind, ValidationResult};
use ds_math::logistic;

use crate::backend::{BackendRegistry, CapabilitySnapshot, CouplingFactory};
use crate::models::ModelRegistry;
use crate::prep::rows_from_frame;
use crate::report::{
    rupture_events, segment_summaries, EngineFlag, GraphTelemetry, Report, SegmentSummary, Summary,
};
use crate::strategy::ThresholdPlan;

/// The drift analysis engine.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    models: ModelRegistry,
    backends: BackendRegistry,
}

impl Engine {
    /// Build an engine with no optional backends.
    ///
    /// The config is validated (non-finite knobs rejected) and then
    /// normalized into its effective clamped form.
    pub fn new(config: EngineConfig, models: ModelRegistry) -> ValidationResult<Self> {
        Engine::with_backends(config, models, BackendRegistry::none())
    }

    /// Build an engine with explicit optional backends.
    pub fn with_backends(
        config: EngineConfig,
        models: ModelRegistry,
        backends: BackendRegistry,
    ) -> ValidationResult<Self> {
        config.validate()?;
        Ok(Engine {
            config: config.normalized(),
            models,
            backends,
        })
    }

    /// The effective (normalized) configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Which optional backends are registered.
    pub fn capabilities(&self) -> CapabilitySnapshot {
        self.backends.probe()
    }

    /// Parse, validate, and analyze a raw frame.
    pub fn analyze(&self, frame: &RawFrame) -> Result<(DriftTable, Report)> {
        let rows = rows_from_frame(frame, &self.config.columns)?;
        self.analyze_rows(rows)
    }

    /// Analyze typed rows.
    ///
    /// Rows are processed in the order given; `analyze` feeds them in
    /// ascending timestamp order, which segmented and coupled modes rely
    /// on.
    pub fn analyze_rows(&self, rows: Vec<SeriesRow>) -> Result<(DriftTable, Report)> {
        if rows.is_empty() {
            return Err(Error::EmptyInput);
        }
        let span = tracing::info_span!("analyze", rows = rows.len());
        let _guard = span.enter();

        let mut flags = Vec::new();

        // Resolve the adaptive capability once; downstream code sees an
        // effective strategy that can always run.
        let mut effective = self.config.clone();
        if effective.strategy == StrategyKind::Adaptive && self.backends.policy().is_none() {
            warn!("adaptive policy requested but not registered; using stochastic");
            flags.push(EngineFlag::AdaptivePolicyUnavailable);
            effective.strategy = StrategyKind::Stochastic;
        }

        let segmented = self.config.columns.segment.is_some();
        let (table, report) = if segmented {
            if self.config.coupling.enabled {
                match self.backends.coupling() {
                    Some(factory) => {
                        let factory = Arc::clone(factory);
                        self.analyze_coupled(rows, &factory, flags)?
                    }
                    None => {
                        warn!("coupling backend not registered; running segments independently");
                        flags.push(EngineFlag::CouplingUnavailable);
                        self.analyze_segmented(rows, &effective, flags)?
                    }
                }
            } else {
                self.analyze_segmented(rows, &effective, flags)?
            }
        } else {
            self.analyze_single(rows, &effective, flags)?
        };

        info!(
            engine = %report.summary.engine,
            ruptures = report.summary.ruptures,
            total_loss = report.summary.total_loss,
            "analysis complete"
        );
        Ok((table, report))
    }

    // ------------------------------------------------------------------
    // Single stream
    // ------------------------------------------------------------------

    fn analyze_single(
        &self,
        rows: Vec<SeriesRow>,
        effective: &EngineConfig,
        mut flags: Vec<EngineFlag>,
    ) -> Result<(DriftTable, Report)> {
        let drifts = drift_series(&rows);
        let mut plan = self.plan_for(effective, &drifts, None, &mut flags);
        let engine = plan.label();
        let records = self.run_stream(&rows, &drifts, &mut plan);

        let table = DriftTable {
            records,
            segment_name: None,
            policy_name: self.config.columns.policy.clone(),
        };
        let report = self.assemble(&table, engine, None, None, flags);
        Ok((table, report))
    }

    // ------------------------------------------------------------------
    // Independent segments
    // ------------------------------------------------------------------

    fn analyze_segmented(
        &self,
        rows: Vec<SeriesRow>,
        effective: &EngineConfig,
        mut flags: Vec<EngineFlag>,
    ) -> Result<(DriftTable, Report)> {
        let groups = partition_by_segment(rows);
        debug!(segments = groups.len(), "segmented run");

        let mut records = Vec::new();
        for (segment, group_rows) in &groups {
            let drifts = drift_series(group_rows);
            let mut plan = self.plan_for(effective, &drifts, Some(segment.as_str()), &mut flags);
            records.extend(self.run_stream(group_rows, &drifts, &mut plan));
        }

        let table = DriftTable {
            records,
            segment_name: self.config.columns.segment.clone(),
            policy_name: self.config.columns.policy.clone(),
        };
        let by_segment = segment_summaries(&table);
        let report = self.assemble(
            &table,
            effective.strategy_label(),
            Some(by_segment),
            None,
            flags,
        );
        Ok((table, report))
    }

    // ------------------------------------------------------------------
    // Coupled segments
    // ------------------------------------------------------------------

    /// Drive all segments through a coupling graph in time order.
    ///
    /// Segments are chained in ascending key order; each rupture presses
    /// the next segment in the chain. Only the first row per
    /// (timestamp, segment) pair is driven, and only segments present at
    /// a timestamp are stepped, so a sparse panel stays well defined.
    fn analyze_coupled(
        &self,
        rows: Vec<SeriesRow>,
        factory: &Arc<dyn CouplingFactory>,
        flags: Vec<EngineFlag>,
    ) -> Result<(DriftTable, Report)> {
        let coupling = self.config.coupling;
        let segments: Vec<String> = rows
            .iter()
            .map(|r| r.segment.clone().unwrap_or_default())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut graph = factory.build(&self.config);
        for segment in &segments {
            graph.add(segment);
        }
        for pair in segments.windows(2) {
            graph.link(
                &pair[0],
                &pair[1],
                coupling.link_weight,
                coupling.link_decay,
                coupling.cooldown_steps,
            );
        }
        debug!(
            backend = factory.name(),
            nodes = segments.len(),
            "coupled run"
        );

        let mut records = Vec::new();
        for (timestamp, frame) in time_frames(rows) {
            for (segment, row) in frame {
                let drift = (row.forecast - row.actual).abs();
                let state = graph.step(&segment, drift);
                let loss = if state.ruptured {
                    drift * row.unit_cost
                } else {
                    0.0
                };
                let margin = drift - state.threshold;
                let rupture_prob =
                    logistic(self.config.prob_slope * (margin - self.config.prob_midpoint));
                if state.ruptured {
                    debug!(
                        segment = %segment,
                        drift = drift,
                        threshold = state.threshold,
                        "rupture"
                    );
                }
                records.push(DriftRecord {
                    timestamp,
                    forecast: row.forecast,
                    actual: row.actual,
                    unit_cost: row.unit_cost,
                    segment: row.segment.clone(),
                    policy: row.policy,
                    drift,
                    memory: state.memory,
                    threshold: state.threshold,
                    rupture: state.ruptured,
                    rupture_prob,
                    loss,
                });
            }
        }

        let table = DriftTable {
            records,
            segment_name: self.config.columns.segment.clone(),
            policy_name: self.config.columns.policy.clone(),
        };
        let by_segment = segment_summaries(&table);
        let telemetry = GraphTelemetry::from_graph(graph.as_ref());
        let report = self.assemble(
            &table,
            "coupled".to_string(),
            Some(by_segment),
            Some(telemetry),
            flags,
        );
        Ok((table, report))
    }

    // ------------------------------------------------------------------
    // Shared pieces
    // ------------------------------------------------------------------

    /// Build the threshold plan for one stream.
    ///
    /// A custom model that cannot produce a usable series falls back to
    /// the stochastic plan and records a flag naming the stream.
    fn plan_for(
        &self,
        effective: &EngineConfig,
        drifts: &[f64],
        segment: Option<&str>,
        flags: &mut Vec<EngineFlag>,
    ) -> ThresholdPlan {
        match effective.strategy {
            StrategyKind::Stochastic => ThresholdPlan::stochastic(effective),
            StrategyKind::Ewma => ThresholdPlan::ewma(effective),
            StrategyKind::Adaptive => match self.backends.policy() {
                Some(policy) => ThresholdPlan::external(Arc::clone(policy)),
                // Resolved by analyze_rows; kept total for direct callers.
                None => ThresholdPlan::stochastic(effective),
            },
            StrategyKind::Custom => {
                let model = effective.custom_model.clone();
                let outcome = match &model {
                    Some(name) => self
                        .models
                        .evaluate(name, drifts, &effective.custom_params)
                        .map_err(|e| e.to_string()),
                    None => Err("custom strategy selected without a model name".to_string()),
                };
                match outcome {
                    Ok(series) => ThresholdPlan::precomputed(effective.strategy_label(), series),
                    Err(reason) => {
                        warn!(
                            model = model.as_deref().unwrap_or(""),
                            segment = segment.unwrap_or(""),
                            reason = %reason,
                            "custom model failed; using stochastic"
                        );
                        flags.push(EngineFlag::StrategyFallback {
                            model,
                            reason,
                            segment: segment.map(str::to_string),
                        });
                        ThresholdPlan::stochastic(effective)
                    }
                }
            }
        }
    }

    /// The drift/threshold recursion over one stream.
    ///
    /// Memory carries between steps and resets to zero the step a rupture
    /// fires; the recorded memory is the post-step value. Each stream
    /// gets a generator freshly seeded from the configured seed.
    fn run_stream(
        &self,
        rows: &[SeriesRow],
        drifts: &[f64],
        plan: &mut ThresholdPlan,
    ) -> Vec<DriftRecord> {
        let cfg = &self.config;
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut memory = 0.0_f64;
        let mut records = Vec::with_capacity(rows.len());

        for (i, row) in rows.iter().enumerate() {
            let drift = drifts[i];
            let threshold = plan.threshold_at(i, drifts, memory, &mut rng);
            let rupture = drift > threshold;
            let loss = if rupture { drift * row.unit_cost } else { 0.0 };
            memory = if rupture {
                0.0
            } else {
                memory + cfg.memory_gain * drift
            };
            let margin = drift - threshold;
            let rupture_prob = logistic(cfg.prob_slope * (margin - cfg.prob_midpoint));
            if rupture {
                debug!(row = i, drift = drift, threshold = threshold, "rupture");
            }

            records.push(DriftRecord {
                timestamp: row.timestamp,
                forecast: row.forecast,
                actual: row.actual,
                unit_cost: row.unit_cost,
                segment: row.segment.clone(),
                policy: row.policy,
                drift,
                memory,
                threshold,
                rupture,
                rupture_prob,
                loss,
            });
        }
        records
    }

    fn assemble(
        &self,
        table: &DriftTable,
        engine: String,
        by_segment: Option<BTreeMap<String, SegmentSummary>>,
        graph_telemetry: Option<GraphTelemetry>,
        flags: Vec<EngineFlag>,
    ) -> Report {
        Report {
            summary: Summary::from_table(table, engine, &self.config),
            events: rupture_events(table),
            by_segment,
            graph_telemetry,
            flags,
        }
    }
}

fn drift_series(rows: &[SeriesRow]) -> Vec<f64> {
    rows.iter().map(|r| (r.forecast - r.actual).abs()).collect()
}

/// Partition rows by segment value, ascending. Rows without a segment
/// land under the empty key. Row order within each group is preserved.
fn partition_by_segment(rows: Vec<SeriesRow>) -> BTreeMap<String, Vec<SeriesRow>> {
    let mut groups: BTreeMap<String, Vec<SeriesRow>> = BTreeMap::new();
    for row in rows {
        let key = row.segment.clone().unwrap_or_default();
        groups.entry(key).or_default().push(row);
    }
    groups
}

/// Group consecutive same-timestamp rows into per-timestamp frames,
/// keeping the first row per segment within each frame.
fn time_frames(rows: Vec<SeriesRow>) -> Vec<(DateTime<Utc>, BTreeMap<String, SeriesRow>)> {
    let mut frames: Vec<(DateTime<Utc>, BTreeMap<String, SeriesRow>)> = Vec::new();
    for row in rows {
        let key = row.segment.clone().unwrap_or_default();
        match frames.last_mut() {
            Some((ts, frame)) if *ts == row.timestamp => {
                frame.entry(key).or_insert(row);
            }
            _ => {
                let timestamp = row.timestamp;
                let mut frame = BTreeMap::new();
                frame.insert(key, row);
                frames.push((timestamp, frame));
            }
        }
    }
    frames
}
