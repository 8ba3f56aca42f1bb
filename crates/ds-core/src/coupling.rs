//! In-crate coupling backend: rupture pressure over a directed link graph.
//!
//! Each node runs the stochastic threshold recursion with its own
//! generator seeded exactly like an independent segment, so a node that
//! never receives pressure reproduces the independent-mode numbers
//! bit for bit. A rupture pushes a pressure contribution across the
//! node's outgoing links; the contribution suppresses the target's
//! threshold multiplicatively for `cooldown` of the target's steps,
//! decaying by `decay` after each application. Hops past the first are
//! attenuated by `damping`, up to `max_depth`, and a single rupture never
//! presses the same node twice.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ds_config::EngineConfig;
use ds_math::standard_normal;

use crate::backend::{CascadeEvent, CouplingFactory, CouplingGraph, CouplingNodeState};

/// One live pressure contribution on a node.
#[derive(Debug, Clone)]
struct Pressure {
    amount: f64,
    decay: f64,
    steps_left: u32,
}

#[derive(Debug)]
struct Node {
    memory: f64,
    steps: usize,
    rng: StdRng,
    pending: Vec<Pressure>,
}

#[derive(Debug, Clone)]
struct Link {
    from: String,
    to: String,
    weight: f64,
    decay: f64,
    cooldown: u32,
}

/// Builds a fresh [`PressureGraph`] per run; registered through
/// `BackendRegistry::with_pressure_graph`.
#[derive(Debug, Clone, Copy)]
pub struct PressureGraphFactory;

impl CouplingFactory for PressureGraphFactory {
    fn name(&self) -> &str {
        "pressure_graph"
    }

    fn build(&self, config: &EngineConfig) -> Box<dyn CouplingGraph> {
        Box::new(PressureGraph::new(config))
    }
}

/// Reference coupling graph (see module docs for the pressure model).
#[derive(Debug)]
pub struct PressureGraph {
    base: f64,
    sensitivity: f64,
    memory_gain: f64,
    sigma: f64,
    seed: u64,
    damping: f64,
    max_depth: u32,
    order: Vec<String>,
    nodes: BTreeMap<String, Node>,
    links: Vec<Link>,
    cascades: Vec<CascadeEvent>,
}

impl PressureGraph {
    pub fn new(config: &EngineConfig) -> Self {
        let cfg = config.clone().normalized();
        PressureGraph {
            base: cfg.base_threshold,
            sensitivity: cfg.sensitivity,
            memory_gain: cfg.memory_gain,
            sigma: cfg.noise_sigma,
            seed: cfg.seed,
            damping: cfg.coupling.damping,
            max_depth: cfg.coupling.max_depth,
            order: Vec::new(),
            nodes: BTreeMap::new(),
            links: Vec::new(),
            cascades: Vec::new(),
        }
    }

    /// Push pressure from a rupture at `origin` across outgoing links,
    /// breadth-first with per-hop damping.
    fn propagate(&mut self, origin: &str) {
        let mut frontier = vec![origin.to_string()];
        let mut visited: BTreeSet<String> = BTreeSet::new();
        visited.insert(origin.to_string());
        let mut attenuation = 1.0;

        for _ in 0..self.max_depth {
            let mut next = Vec::new();
            for from in &frontier {
                let outgoing: Vec<Link> = self
                    .links
                    .iter()
                    .filter(|l| &l.from == from)
                    .cloned()
                    .collect();
                for link in outgoing {
                    if visited.contains(&link.to) {
                        continue;
                    }
                    visited.insert(link.to.clone());
                    let amount = (link.weight * attenuation).clamp(0.0, 1.0);
                    if amount <= 0.0 {
                        continue;
                    }
                    if let Some(target) = self.nodes.get_mut(&link.to) {
                        // The target's step counter is the index of its
                        // next observation, where this pressure lands.
                        let step = target.steps;
                        target.pending.push(Pressure {
                            amount,
                            decay: link.decay,
                            steps_left: link.cooldown.max(1),
                        });
                        self.cascades.push(CascadeEvent {
                            source: origin.to_string(),
                            target: link.to.clone(),
                            step,
                            pressure: amount,
                        });
                        next.push(link.to);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
            attenuation *= self.damping;
        }
    }
}

impl CouplingGraph for PressureGraph {
    fn add(&mut self, node: &str) {
        if !self.nodes.contains_key(node) {
            self.order.push(node.to_string());
            self.nodes.insert(
                node.to_string(),
                Node {
                    memory: 0.0,
                    steps: 0,
                    rng: StdRng::seed_from_u64(self.seed),
                    pending: Vec::new(),
                },
            );
        }
    }

    fn link(&mut self, a: &str, b: &str, weight: f64, decay: f64, cooldown: u32) {
        self.add(a);
        self.add(b);
        self.links.push(Link {
            from: a.to_string(),
            to: b.to_string(),
            weight: weight.clamp(0.0, 1.0),
            decay: decay.clamp(0.0, 1.0),
            cooldown: cooldown.max(1),
        });
    }

    fn step(&mut self, name: &str, drift: f64) -> CouplingNodeState {
        self.add(name);
        let Some(node) = self.nodes.get_mut(name) else {
            return CouplingNodeState {
                threshold: 0.0,
                ruptured: false,
                memory: 0.0,
                pressure: 0.0,
            };
        };

        let pressure = node
            .pending
            .iter()
            .map(|p| p.amount)
            .sum::<f64>()
            .min(1.0);
        let noise = if self.sigma > 0.0 {
            let u1 = node.rng.random::<f64>();
            let u2 = node.rng.random::<f64>();
            self.sigma * standard_normal(u1, u2)
        } else {
            0.0
        };
        let raw = self.base + self.sensitivity * node.memory + noise;
        let threshold = (raw * (1.0 - pressure)).max(0.0);
        let ruptured = drift > threshold;
        node.memory = if ruptured {
            0.0
        } else {
            node.memory + self.memory_gain * drift
        };

        for p in node.pending.iter_mut() {
            p.amount *= p.decay;
            p.steps_left -= 1;
        }
        node.pending.retain(|p| p.steps_left > 0 && p.amount > 0.0);
        node.steps += 1;

        let state = CouplingNodeState {
            threshold,
            ruptured,
            memory: node.memory,
            pressure,
        };
        if ruptured {
            self.propagate(name);
        }
        state
    }

    fn nodes(&self) -> Vec<String> {
        self.order.clone()
    }

    fn links(&self) -> Vec<(String, String)> {
        self.links
            .iter()
            .map(|l| (l.from.clone(), l.to.clone()))
            .collect()
    }

    fn cascades(&self) -> &[CascadeEvent] {
        &self.cascades
    }
}
