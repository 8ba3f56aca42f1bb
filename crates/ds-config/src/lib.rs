//! Drift Sentinel configuration types and validation.
//!
//! This crate provides:
//! - Typed structs for engine and diagnostics configuration
//! - Serde defaults so sparse JSON documents deserialize into usable configs
//! - Clamping (`normalized`) and semantic validation (`validate`)
//! - A typed overrides overlay for CLI and embedding callers

pub mod engine;
pub mod epistemic;
pub mod overrides;
pub mod validate;

pub use engine::{ColumnMap, CouplingConfig, EngineConfig, StrategyKind};
pub use epistemic::{BaselineMode, EpistemicConfig};
pub use overrides::EngineOverrides;
pub use validate::{ValidationError, ValidationResult};

/// Schema version for configuration documents.
pub const CONFIG_SCHEMA_VERSION: &str = "1";
