//! Shared types for Drift Sentinel.
//!
//! This crate provides the pieces every other crate needs: the unified
//! error taxonomy, the typed table model with its CSV codec, and the CLI
//! output-format enum.

pub mod error;
pub mod output;
pub mod table;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError};
pub use output::OutputFormat;
pub use table::{DriftRecord, DriftTable, RawFrame, SeriesRow};

/// Schema version embedded in serialized reports.
pub const SCHEMA_VERSION: &str = "1";
