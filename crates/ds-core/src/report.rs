//! Engine report: summary statistics, rupture events, segment rollups,
//! degradation flags, and coupling telemetry.
//!
//! The report is the machine contract for `--format json` consumers:
//! snake_case field names, nulls as null, map keys in deterministic
//! (BTreeMap) order. `render_summary` is the short human rendering.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ds_common::table::{format_timestamp, DriftTable};
use ds_config::EngineConfig;
use ds_math::{mean, median};

use crate::backend::{CascadeEvent, CouplingGraph};

/// Cascade events kept verbatim in the report; the rest is counted only.
const CASCADE_EVENT_CAP: usize = 64;

/// Headline numbers for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    // ------------------------------------------------------------------
    // Row counts
    // ------------------------------------------------------------------
    pub n: usize,
    pub ruptures: usize,

    // ------------------------------------------------------------------
    // Magnitudes
    // ------------------------------------------------------------------
    pub total_loss: f64,
    pub mean_drift: f64,
    pub median_drift: f64,
    pub max_drift: f64,

    // ------------------------------------------------------------------
    // Provenance
    // ------------------------------------------------------------------
    /// Engine label: `stochastic`, `ewma`, `custom:<name>`, `adaptive`,
    /// or `coupled`.
    pub engine: String,
    /// Effective (normalized) configuration the run used.
    pub config: EngineConfig,
}

impl Summary {
    pub fn from_table(table: &DriftTable, engine: String, config: &EngineConfig) -> Self {
        let drifts = table.drifts();
        let max_drift = drifts.iter().copied().fold(0.0_f64, f64::max);
        Summary {
            n: table.len(),
            ruptures: table.rupture_count(),
            total_loss: table.total_loss(),
            mean_drift: mean(&drifts),
            median_drift: median(&drifts),
            max_drift,
            engine,
            config: config.clone(),
        }
    }
}

/// One rupture row, exported into the report's event list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuptureEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
    pub drift: f64,
    pub threshold: f64,
    pub rupture_prob: f64,
    pub loss: f64,
}

/// Per-segment rollup for segmented runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SegmentSummary {
    pub n: usize,
    pub ruptures: usize,
    pub loss: f64,
}

/// A recovered degradation recorded in the report instead of an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineFlag {
    /// A custom model could not produce a usable threshold series; the
    /// run fell back to the stochastic strategy.
    StrategyFallback {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        segment: Option<String>,
    },
    /// The adaptive strategy was requested but no policy is registered.
    AdaptivePolicyUnavailable,
    /// Coupled mode was requested but no coupling backend is registered;
    /// segments were processed independently.
    CouplingUnavailable,
}

impl EngineFlag {
    /// One-line human description for the summary rendering.
    pub fn describe(&self) -> String {
        match self {
            EngineFlag::StrategyFallback {
                model,
                reason,
                segment,
            } => {
                let model = model.as_deref().unwrap_or("(unnamed)");
                match segment {
                    Some(seg) => format!(
                        "custom model `{model}` fell back to stochastic on segment `{seg}`: {reason}"
                    ),
                    None => format!("custom model `{model}` fell back to stochastic: {reason}"),
                }
            }
            EngineFlag::AdaptivePolicyUnavailable => {
                "adaptive policy requested but not registered; used stochastic".to_string()
            }
            EngineFlag::CouplingUnavailable => {
                "coupling backend not registered; segments processed independently".to_string()
            }
        }
    }
}

/// What the coupling graph did during a coupled run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphTelemetry {
    pub nodes: Vec<String>,
    pub links: Vec<(String, String)>,
    /// Total cascade events, including any beyond the recorded list.
    pub cascade_total: usize,
    pub cascades: Vec<CascadeEvent>,
}

impl GraphTelemetry {
    pub fn from_graph(graph: &dyn CouplingGraph) -> Self {
        let all = graph.cascades();
        GraphTelemetry {
            nodes: graph.nodes(),
            links: graph.links(),
            cascade_total: all.len(),
            cascades: all.iter().take(CASCADE_EVENT_CAP).cloned().collect(),
        }
    }
}

/// Full analysis report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub summary: Summary,
    pub events: Vec<RuptureEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_segment: Option<BTreeMap<String, SegmentSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_telemetry: Option<GraphTelemetry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<EngineFlag>,
}

impl Report {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Short human rendering for `--format summary`.
    pub fn render_summary(&self) -> String {
        let s = &self.summary;
        let mut lines = Vec::new();
        lines.push(format!(
            "Drift analysis: {} rows, {} ruptures, total loss {:.2}",
            s.n, s.ruptures, s.total_loss
        ));
        lines.push(format!("  engine: {}", s.engine));
        lines.push(format!(
            "  drift mean/median/max: {:.2} / {:.2} / {:.2}",
            s.mean_drift, s.median_drift, s.max_drift
        ));
        if let Some(by_segment) = &self.by_segment {
            lines.push(format!("  segments: {}", by_segment.len()));
            for (segment, roll) in by_segment {
                lines.push(format!(
                    "    {segment}: {} rows, {} ruptures, loss {:.2}",
                    roll.n, roll.ruptures, roll.loss
                ));
            }
        }
        if let Some(graph) = &self.graph_telemetry {
            lines.push(format!(
                "  coupling: {} nodes, {} links, {} cascade events",
                graph.nodes.len(),
                graph.links.len(),
                graph.cascade_total
            ));
        }
        if !self.flags.is_empty() {
            lines.push("  flags:".to_string());
            for flag in &self.flags {
                lines.push(format!("    - {}", flag.describe()));
            }
        }
        if !self.events.is_empty() {
            lines.push(format!("  first rupture: {}", format_timestamp(self.events[0].timestamp)));
        }
        lines.join("\n")
    }
}

/// Rupture rows projected into the event list, preserving table order.
pub fn rupture_events(table: &DriftTable) -> Vec<RuptureEvent> {
    table
        .records
        .iter()
        .filter(|r| r.rupture)
        .map(|r| RuptureEvent {
            timestamp: r.timestamp,
            segment: r.segment.clone(),
            drift: r.drift,
            threshold: r.threshold,
            rupture_prob: r.rupture_prob,
            loss: r.loss,
        })
        .collect()
}

/// Per-segment rollups keyed by segment value. Rows without a segment
/// land under the empty key.
pub fn segment_summaries(table: &DriftTable) -> BTreeMap<String, SegmentSummary> {
    let mut out: BTreeMap<String, SegmentSummary> = BTreeMap::new();
    for record in &table.records {
        let key = record.segment.clone().unwrap_or_default();
        let entry = out.entry(key).or_default();
        entry.n += 1;
        if record.rupture {
            entry.ruptures += 1;
        }
        entry.loss += record.loss;
    }
    out
}
