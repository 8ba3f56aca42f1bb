//! Capability interfaces for the optional adaptive-policy subsystem.
//!
//! An external backend can contribute two things: a [`ThresholdPolicy`]
//! that produces thresholds in place of the built-in strategies, and a
//! [`CouplingFactory`] that builds rupture-pressure graphs for coupled
//! segmentation. Absence of either is a normal runtime condition, not an
//! error: the engine probes the registry up front, selects a variant, and
//! records a degradation flag in the report when a requested capability
//! is missing. No call site discovers a missing backend by panicking.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use ds_config::EngineConfig;

/// External threshold source behind the `adaptive` engine label.
pub trait ThresholdPolicy: Send + Sync {
    /// Short name for capability snapshots and log lines.
    fn name(&self) -> &str;

    /// Threshold for the current step.
    ///
    /// `history` is the drift series up to and including the current
    /// point; `memory` is the accumulated drift memory entering the step.
    fn produce(&self, history: &[f64], memory: f64) -> f64;
}

/// Observed state of one graph node after a step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CouplingNodeState {
    pub threshold: f64,
    pub ruptured: bool,
    /// Drift memory after the step (0 on rupture).
    pub memory: f64,
    /// Pressure fraction applied to this node's threshold, in [0, 1].
    pub pressure: f64,
}

/// One recorded pressure transmission between linked nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeEvent {
    pub source: String,
    pub target: String,
    /// Per-node step index at which the pressure landed on the target.
    pub step: usize,
    pub pressure: f64,
}

/// Rupture-pressure propagation between linked streams.
///
/// A graph instance is stateful and single-use: one analysis run builds
/// one graph, adds its nodes and links, then drives each node through its
/// observations in time order.
pub trait CouplingGraph {
    /// Register a node. Adding an existing node is a no-op.
    fn add(&mut self, node: &str);

    /// Link `a -> b`: when `a` ruptures, `b`'s threshold is suppressed by
    /// `weight` (decayed by `decay` per step) for `cooldown` steps.
    fn link(&mut self, a: &str, b: &str, weight: f64, decay: f64, cooldown: u32);

    /// Advance `node` by one drift observation and return its state.
    fn step(&mut self, node: &str, drift: f64) -> CouplingNodeState;

    /// Node names in insertion order.
    fn nodes(&self) -> Vec<String>;

    /// Links as (source, target) pairs in insertion order.
    fn links(&self) -> Vec<(String, String)>;

    /// Cascade events recorded so far.
    fn cascades(&self) -> &[CascadeEvent];
}

/// Builds a fresh [`CouplingGraph`] per analysis run.
pub trait CouplingFactory: Send + Sync {
    fn name(&self) -> &str;
    fn build(&self, config: &EngineConfig) -> Box<dyn CouplingGraph>;
}

/// Optional backends registered by the caller.
///
/// The default registry is empty; `adaptive` and coupled runs against it
/// degrade with a flag. Callers opt in explicitly, e.g.
/// `BackendRegistry::none().with_pressure_graph()`.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    policy: Option<Arc<dyn ThresholdPolicy>>,
    coupling: Option<Arc<dyn CouplingFactory>>,
}

/// Which optional backends are present, by name. Serialized into log
/// lines when the engine starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilitySnapshot {
    pub adaptive_policy: Option<String>,
    pub coupling: Option<String>,
}

impl BackendRegistry {
    /// A registry with no backends at all.
    pub fn none() -> Self {
        BackendRegistry::default()
    }

    /// Register an external threshold policy.
    pub fn with_policy(mut self, policy: Arc<dyn ThresholdPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Register a coupling-graph factory.
    pub fn with_coupling(mut self, factory: Arc<dyn CouplingFactory>) -> Self {
        self.coupling = Some(factory);
        self
    }

    /// Register the in-crate pressure graph as the coupling backend.
    pub fn with_pressure_graph(self) -> Self {
        self.with_coupling(Arc::new(crate::coupling::PressureGraphFactory))
    }

    pub fn policy(&self) -> Option<&Arc<dyn ThresholdPolicy>> {
        self.policy.as_ref()
    }

    pub fn coupling(&self) -> Option<&Arc<dyn CouplingFactory>> {
        self.coupling.as_ref()
    }

    /// Snapshot of what is registered, taken once at engine construction.
    pub fn probe(&self) -> CapabilitySnapshot {
        CapabilitySnapshot {
            adaptive_policy: self.policy.as_ref().map(|p| p.name().to_string()),
            coupling: self.coupling.as_ref().map(|f| f.name().to_string()),
        }
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let probe = self.probe();
        f.debug_struct("BackendRegistry")
            .field("adaptive_policy", &probe.adaptive_policy)
            .field("coupling", &probe.coupling)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPolicy(f64);

    impl ThresholdPolicy for FixedPolicy {
        fn name(&self) -> &str {
            "fixed"
        }

        fn produce(&self, _history: &[f64], _memory: f64) -> f64 {
            self.0
        }
    }

    #[test]
    fn test_empty_registry_probe() {
        let probe = BackendRegistry::none().probe();
        assert_eq!(probe.adaptive_policy, None);
        assert_eq!(probe.coupling, None);
    }

    #[test]
    fn test_policy_registration() {
        let registry = BackendRegistry::none().with_policy(Arc::new(FixedPolicy(75.0)));
        let probe = registry.probe();
        assert_eq!(probe.adaptive_policy.as_deref(), Some("fixed"));
        let policy = registry.policy().unwrap();
        assert_eq!(policy.produce(&[1.0], 0.0), 75.0);
    }

    #[test]
    fn test_pressure_graph_registration() {
        let probe = BackendRegistry::none().with_pressure_graph().probe();
        assert_eq!(probe.coupling.as_deref(), Some("pressure_graph"));
    }
}
