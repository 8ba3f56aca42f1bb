//! Drift Sentinel Core Library
//!
//! This library provides the drift analysis engine:
//! - Input validation from raw CSV frames to typed rows
//! - Threshold strategies (stochastic, EWMA, custom models, adaptive)
//! - The per-stream drift/memory recursion with rupture detection
//! - Segmentation and cross-stream coupling via the pressure graph
//! - Report assembly, synthetic demo data, logging, exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod backend;
pub mod coupling;
pub mod engine;
pub mod exit_codes;
pub mod logging;
pub mod models;
pub mod prep;
pub mod report;
pub mod strategy;
pub mod synth;

pub use backend::{BackendRegistry, CapabilitySnapshot, CouplingGraph, ThresholdPolicy};
pub use engine::Engine;
pub use models::ModelRegistry;
pub use report::Report;
